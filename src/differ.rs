// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Zone differ (C4): computes a [`Changeset`] between two zone snapshots.

use tracing::debug;

use crate::changeset::{ChangePart, Changeset};
use crate::error::{XfrError, XfrResult};
use crate::rr::{RecordSet, SOA};
use crate::serial::Serial;
use crate::tree::{ZoneNode, ZoneTree};
use crate::zone::ZoneContents;

/// Compares two RRSets of the same owner+type, returning the records in
/// `rrset` that are absent from `other`, or present with a different TTL
/// (spec §4.3 "RR-level cross-comparison").
///
/// Mirrors `knot_zone_diff_rdata_return_changes`: a record only "changes" if
/// its rdata cannot be found at all in the other set, or is found but the
/// TTL differs. A bare TTL bump on an RR that is otherwise unchanged is
/// still reported, once on each side (once as a removal of the old TTL,
/// once as an addition of the new one), by virtue of being called twice.
fn rrset_changes(rrset: &RecordSet, other: &RecordSet) -> RecordSet {
    let mut changes = RecordSet::new(rrset.owner().clone(), rrset.record_type());
    for record in rrset.records() {
        match other.find_by_rdata(record.rdata()) {
            Some(found) if found.ttl() == record.ttl() => {}
            _ => changes.push_raw(record.clone()),
        }
    }
    changes
}

/// Diffs a single RRSet pair (same owner, same type) present in both nodes,
/// appending to `changeset`'s remove/add sides.
fn diff_rrset(old: &RecordSet, new: &RecordSet, changeset: &mut Changeset) {
    let removed = rrset_changes(old, new);
    let added = rrset_changes(new, old);
    changeset.append(ChangePart::Remove, removed);
    changeset.append(ChangePart::Add, added);
}

/// Diffs a node present in both trees (by owner name). The SOA RRSet is
/// skipped here: the changeset's `soa_from`/`soa_to` carry the SOA delta
/// separately (mirrors `knot_zone_diff_node`'s explicit SOA exclusion).
fn diff_node_both(old: &ZoneNode, new: &ZoneNode, changeset: &mut Changeset) {
    for old_rrset in old.rrsets() {
        if old_rrset.record_type() == SOA {
            continue;
        }
        let new_rrset = new
            .rrset(old_rrset.record_type())
            .cloned()
            .unwrap_or_else(|| RecordSet::new(old_rrset.owner().clone(), old_rrset.record_type()));
        diff_rrset(old_rrset, &new_rrset, changeset);
    }
    for new_rrset in new.rrsets() {
        if new_rrset.record_type() == SOA || old.rrset(new_rrset.record_type()).is_some() {
            // Already handled above (type present in both, or is SOA).
            continue;
        }
        let empty = RecordSet::new(new_rrset.owner().clone(), new_rrset.record_type());
        diff_rrset(&empty, new_rrset, changeset);
    }
}

/// Diffs a node that exists only in the old tree: every non-SOA RRSet is a
/// pure removal.
fn diff_node_removed(old: &ZoneNode, changeset: &mut Changeset) {
    for rrset in old.rrsets() {
        if rrset.record_type() == SOA {
            continue;
        }
        changeset.append(ChangePart::Remove, rrset.clone());
    }
}

/// Diffs a node that exists only in the new tree: every non-SOA RRSet is a
/// pure addition.
fn diff_node_added(new: &ZoneNode, changeset: &mut Changeset) {
    for rrset in new.rrsets() {
        if rrset.record_type() == SOA {
            continue;
        }
        changeset.append(ChangePart::Add, rrset.clone());
    }
}

/// Walks both trees in owner order, classifying each distinct owner name as
/// present-in-both, removed-entirely, or added-entirely, and diffing it
/// accordingly. Mirrors `knot_zone_diff_load_trees`'s two-pass structure,
/// simplified: since both trees are fully materialized in memory here (no
/// streaming), a single pass over the union of owners suffices.
fn diff_trees(old: &ZoneTree, new: &ZoneTree, changeset: &mut Changeset) {
    old.apply(|old_node| {
        match new.get(old_node.owner()) {
            Some(new_node) => diff_node_both(old_node, new_node, changeset),
            None => diff_node_removed(old_node, changeset),
        }
    });
    new.apply(|new_node| {
        if old.get(new_node.owner()).is_none() {
            diff_node_added(new_node, changeset);
        }
    });
}

/// Computes the changeset that transforms `old` into `new` (spec §4.3).
///
/// Preconditions (mirrors `knot_zone_diff_load_soas`):
/// - both zones must have a readable apex SOA;
/// - if the serials are equal, returns [`XfrError::UpToDate`] (`NO_DIFF`);
/// - if `new`'s serial precedes `old`'s in RFC 1982 order, returns
///   [`XfrError::Semantic`] (`SERIAL_REGRESSION`/`ERANGE`).
pub fn create_diff(old: &ZoneContents, new: &ZoneContents) -> XfrResult<Changeset> {
    let soa_from = old.apex_soa_record()?;
    let soa_to = new.apex_soa_record()?;

    let serial_from = Serial::new(old.serial()?);
    let serial_to = Serial::new(new.serial()?);

    if serial_from == serial_to {
        return Err(XfrError::UpToDate);
    }
    if serial_to.compare(serial_from) == std::cmp::Ordering::Less {
        return Err(XfrError::Semantic(format!(
            "new serial {} precedes old serial {}",
            serial_to.get(),
            serial_from.get()
        )));
    }

    let mut changeset = Changeset::new();
    changeset.set_soa_from(soa_from);
    changeset.set_soa_to(soa_to);

    diff_trees(old.main(), new.main(), &mut changeset);
    diff_trees(old.nsec3(), new.nsec3(), &mut changeset);

    debug!(
        serial_from = serial_from.get(),
        serial_to = serial_to.get(),
        removed = changeset.remove().len(),
        added = changeset.add().len(),
        "computed zone diff"
    );

    Ok(changeset)
}
