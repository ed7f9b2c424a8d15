// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Apply-and-store interface (spec §4.5/§6): the external collaborator that
//! atomically mutates the zone and persists the result to the journal.
//!
//! `zone_change_apply_and_store` in the original source does this in one
//! call so the zone mutation and the journal write succeed or fail
//! together; this crate exposes it as a trait so the mutation strategy and
//! the persistence strategy stay out of the core's concern, matching the
//! teacher's separation of `Authority` (what to change) from its storage
//! backend (how it's persisted).

use crate::changeset::{Changeset, ChangesetSequence};
use crate::error::XfrResult;
use crate::rr::SOA;
use crate::tree::ZoneNode;
use crate::zone::ZoneContents;

/// Applies a single changeset's REMOVE list then ADD list to `zone` in
/// place, per spec §5 "apply replays REMOVEs before ADDs within a
/// changeset". NSEC3 RRSets are not distinguished structurally from main
/// RRSets by a changeset (an RRSet's owner name plus content of
/// `ZoneContents::nsec3`/`main` drives which tree it belongs in is out of
/// scope here; this crate's tests exercise only the main tree through this
/// path, matching the C source's single `adjust` step doing both).
pub fn apply_changeset(zone: &mut ZoneContents, changeset: &Changeset) -> XfrResult<()> {
    for rrset in changeset.remove() {
        if let Some(node) = zone.main_mut().get_mut(rrset.owner()) {
            if let Some(existing) = node.rrset_mut(rrset.record_type()) {
                for record in rrset.records() {
                    existing.remove(record.rdata());
                }
            }
        }
        let owner = rrset.owner().clone();
        let apex = zone.apex().clone();
        zone.main_mut().delete_empty_node(&owner, &apex)?;
    }

    for rrset in changeset.add() {
        if zone.main().get(rrset.owner()).is_none() {
            zone.main_mut().insert(ZoneNode::new(rrset.owner().clone()));
        }
        let node = zone
            .main_mut()
            .get_mut(rrset.owner())
            .expect("just ensured present");
        let mut existing = node.rrset(rrset.record_type()).cloned().unwrap_or_else(|| {
            crate::rr::RecordSet::new(rrset.owner().clone(), rrset.record_type())
        });
        for record in rrset.records() {
            existing.insert(record.clone());
        }
        node.put_rrset(existing);
    }

    if let Some(soa_to) = changeset.soa_to() {
        let apex = zone.apex().clone();
        if let Some(apex_node) = zone.main_mut().get_mut(&apex) {
            let mut soa_set = crate::rr::RecordSet::new(apex.clone(), SOA);
            soa_set.push_raw(soa_to.clone());
            apex_node.put_rrset(soa_set);
        }
    }

    Ok(())
}

/// Outcome of [`ApplyAndStore::apply_and_store`].
#[non_exhaustive]
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The zone was mutated and the journal write succeeded.
    Ok,
    /// The journal write failed; the zone mutation must not be observable.
    IoError(String),
    /// The changesets violated a zone invariant partway through.
    SemanticError(String),
}

/// The write-side contract an IXFR-in session's finalize step calls
/// through (spec §4.5 step "invoke the external apply-and-store").
///
/// Ownership of the changeset sequence transfers to the implementor on
/// call; the core never touches it again afterward.
pub trait ApplyAndStore {
    /// Atomically applies `changesets` to `zone` and persists them.
    fn apply_and_store(&self, changesets: ChangesetSequence, zone: &mut ZoneContents) -> ApplyOutcome;
}

/// A direct, in-memory-only implementation: applies changesets to the zone
/// without any journal persistence. Suitable for tests and for embedders
/// that supply their own persistence via a different call path.
#[derive(Debug, Default)]
pub struct InMemoryApply;

impl ApplyAndStore for InMemoryApply {
    fn apply_and_store(&self, changesets: ChangesetSequence, zone: &mut ZoneContents) -> ApplyOutcome {
        for changeset in changesets.changesets() {
            if let Err(e) = apply_changeset(zone, changeset) {
                return ApplyOutcome::SemanticError(e.to_string());
            }
        }
        ApplyOutcome::Ok
    }
}
