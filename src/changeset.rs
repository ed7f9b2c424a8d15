// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Changeset model (C3): one SOA-to-SOA delta, and ordered sequences of them.

use crate::rr::Record;
use crate::rr::RecordSet;

/// Which side of a changeset an RRSet belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangePart {
    /// The RRSet is being removed.
    Remove,
    /// The RRSet is being added.
    Add,
}

/// A single SOA-to-SOA delta: what to remove, what to add, bracketed by the
/// `from`/`to` SOA records.
#[derive(Clone, Debug, Default)]
pub struct Changeset {
    soa_from: Option<Record>,
    soa_to: Option<Record>,
    serial_from: u32,
    serial_to: u32,
    remove: Vec<RecordSet>,
    add: Vec<RecordSet>,
}

impl Changeset {
    /// Creates an empty changeset.
    pub fn new() -> Self {
        Self::default()
    }

    /// The starting SOA record, if set.
    pub fn soa_from(&self) -> Option<&Record> {
        self.soa_from.as_ref()
    }

    /// The ending SOA record, if set.
    pub fn soa_to(&self) -> Option<&Record> {
        self.soa_to.as_ref()
    }

    /// Sets the starting SOA and derives `serial_from` from it.
    pub fn set_soa_from(&mut self, soa: Record) {
        self.serial_from = soa.soa_serial().unwrap_or(0);
        self.soa_from = Some(soa);
    }

    /// Sets the ending SOA and derives `serial_to` from it.
    pub fn set_soa_to(&mut self, soa: Record) {
        self.serial_to = soa.soa_serial().unwrap_or(0);
        self.soa_to = Some(soa);
    }

    /// The serial this changeset transitions from.
    pub fn serial_from(&self) -> u32 {
        self.serial_from
    }

    /// The serial this changeset transitions to.
    pub fn serial_to(&self) -> u32 {
        self.serial_to
    }

    /// The ordered list of RRSets to remove.
    pub fn remove(&self) -> &[RecordSet] {
        &self.remove
    }

    /// The ordered list of RRSets to add.
    pub fn add(&self) -> &[RecordSet] {
        &self.add
    }

    /// Appends an RRSet to the given side of the changeset. Per spec §4.2,
    /// appending an RRSet with zero records is a no-op.
    pub fn append(&mut self, part: ChangePart, rrset: RecordSet) {
        if rrset.is_empty() {
            return;
        }
        match part {
            ChangePart::Remove => self.remove.push(rrset),
            ChangePart::Add => self.add.push(rrset),
        }
    }

    /// True if the changeset carries no RRSets on either side.
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// An ordered sequence of changesets, plus the `first_soa` slot the IXFR-in
/// consumer uses to recognize end-of-stream (spec §3).
#[derive(Clone, Debug, Default)]
pub struct ChangesetSequence {
    first_soa: Option<Record>,
    changesets: Vec<Changeset>,
}

impl ChangesetSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first SOA observed in the stream this sequence was built from.
    pub fn first_soa(&self) -> Option<&Record> {
        self.first_soa.as_ref()
    }

    /// Sets the `first_soa` slot.
    pub fn set_first_soa(&mut self, soa: Record) {
        self.first_soa = Some(soa);
    }

    /// Appends a new, empty changeset and returns a mutable reference to it.
    pub fn push_changeset(&mut self) -> &mut Changeset {
        self.changesets.push(Changeset::new());
        self.changesets.last_mut().expect("just pushed")
    }

    /// Mutable reference to the most recently appended changeset, if any.
    pub fn last_changeset_mut(&mut self) -> Option<&mut Changeset> {
        self.changesets.last_mut()
    }

    /// The changesets in wire/apply order.
    pub fn changesets(&self) -> &[Changeset] {
        &self.changesets
    }

    /// True if the sequence has no changesets.
    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }

    /// The number of changesets currently accumulated.
    pub fn len(&self) -> usize {
        self.changesets.len()
    }
}
