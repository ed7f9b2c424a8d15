// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Journal interface (C7): an opaque source of persisted changesets.
//!
//! The on-disk format, retention policy, and writer-side API are out of
//! scope (spec §4.6) — this module carries only the read-side contract the
//! IXFR-out responder calls against. Mirrors the teacher's pattern of
//! specifying storage backends as a trait (`crates/server/src/store`) rather
//! than a concrete type, so the core stays storage-agnostic.

use crate::changeset::ChangesetSequence;

/// Outcome of a [`Journal::load_changesets`] call.
#[non_exhaustive]
#[derive(Debug)]
pub enum JournalLookup {
    /// The sequence contains an ordered list of changesets whose stitched
    /// serial range covers `(serial_from, serial_to]`.
    Ok(ChangesetSequence),
    /// The journal exists but does not hold the requested range (too old,
    /// or has gaps) — the caller should fall back to AXFR.
    NoSuchRange,
    /// No journal exists for this zone at all.
    NotPresent,
    /// The journal store failed to read (disk error, corruption, etc).
    IoError(String),
}

/// The read-side contract for a persisted-changeset store (C7).
///
/// A concrete implementation (on-disk log, database, ...) lives outside
/// this crate; the IXFR-out responder is generic over this trait so it
/// never depends on a storage backend directly.
pub trait Journal {
    /// Loads the changeset sequence covering `(serial_from, serial_to]`.
    fn load_changesets(&self, serial_from: u32, serial_to: u32) -> JournalLookup;
}
