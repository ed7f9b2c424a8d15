// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Unified error taxonomy for the zone-transfer core.
//!
//! The original C implementation mixes two error spaces: a `PROC_*`
//! protocol-processing enum and a separate `knot_error_t` return-code space.
//! This module unifies both along the taxonomy in the specification,
//! leaving RCODE mapping to the caller (the wire-format codec is external).

use std::fmt;

/// A DNS response code, for callers to map an [`XfrError`] onto at the
/// message boundary. The wire encoding of these codes is out of scope here.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rcode {
    /// No error.
    NoError,
    /// Request was malformed.
    FormErr,
    /// Server failure.
    ServFail,
    /// Not authoritative for the zone.
    NotAuth,
    /// Request refused by policy.
    Refused,
}

/// Error taxonomy for the zone-transfer core (spec §7).
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum XfrError {
    /// Protocol grammar violated (e.g. missing/extra SOA, wrong QTYPE).
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Authorization or policy rejected the request.
    #[error("denied: {0}")]
    Denied(String),

    /// The requester is already at or ahead of the local serial.
    #[error("requester is up to date")]
    UpToDate,

    /// The journal does not hold the requested serial range.
    #[error("no journal history for requested range")]
    NoHistory,

    /// Allocation or resource exhaustion.
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// The journal or apply-and-store collaborator failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A zone invariant was violated while applying a changeset.
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Programmer error: invalid argument passed to an API.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

impl XfrError {
    /// Maps this error onto the RCODE a worker should use in its response,
    /// per spec §7's "Locality" column. Fatal error kinds that abort the
    /// session without a defined single RCODE (`Resource`, `Io`,
    /// `Semantic`) map to `ServFail`, the generic catch-all.
    pub fn rcode(&self) -> Rcode {
        match self {
            Self::Malformed(_) => Rcode::FormErr,
            Self::Denied(_) => Rcode::NotAuth,
            Self::UpToDate => Rcode::NoError,
            Self::NoHistory => Rcode::NoError, // triggers AXFR fallback, not an error reply
            Self::Resource(_) | Self::Io(_) | Self::Semantic(_) => Rcode::ServFail,
            Self::InvalidArg(_) => Rcode::ServFail,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type XfrResult<T> = Result<T, XfrError>;

/// Result of a single IXFR-out fill step (spec §6 `PROC_DONE`/`PROC_FULL`).
///
/// `PROC_NOOP` and `PROC_FAIL` are not modeled here: a no-progress call is a
/// programmer error and is represented by [`XfrError::InvalidArg`]; a fatal
/// failure is `Err(XfrError)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XfrStep {
    /// No more messages to emit; the session is finished.
    Done,
    /// The current message is full; call again with a fresh message.
    Full,
}

impl fmt::Display for XfrStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Outcome of finalizing an IXFR-in session (spec §4.5/§6).
#[derive(Debug)]
pub enum IxfrInOutcome {
    /// The changesets were applied to the zone and persisted.
    Applied,
    /// The stream could not be completed as IXFR; the caller should retry
    /// the transfer as AXFR.
    FallbackToAxfr,
}
