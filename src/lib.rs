// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The incremental zone transfer (IXFR) engine and zone differencing core
//! for an authoritative DNS server.
//!
//! This crate implements the hardest parts of a zone-transfer subsystem:
//!
//! - the zone tree ([`tree`]), an owner-name-indexed container supporting
//!   the predecessor-or-equal lookup DNSSEC denial-of-existence needs;
//! - the zone differ ([`differ`]), which computes a canonical [`Changeset`]
//!   between two consistent zone snapshots;
//! - the IXFR-out responder ([`ixfr_out`]), a resumable, multipacket
//!   producer that streams changesets over DNS wire-format messages;
//! - the IXFR-in consumer ([`ixfr_in`]), a streaming parser that
//!   reconstructs changesets from arriving answer records and applies them
//!   atomically, with fallback to AXFR.
//!
//! Everything outside this core — the full AXFR producer/consumer, query
//! dispatch, TSIG verification, journal persistence, and the wire-format
//! codec for individual resource records — is modeled only as the trait
//! boundary this crate calls through ([`journal::Journal`],
//! [`apply::ApplyAndStore`], [`ixfr_out::OutgoingMessage`]); a host process
//! supplies the concrete implementations.
//!
//! [`Changeset`]: changeset::Changeset

#![warn(
    clippy::default_trait_access,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::unimplemented,
    missing_docs,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod apply;
pub mod changeset;
pub mod config;
pub mod differ;
pub mod error;
pub mod ixfr_in;
pub mod ixfr_out;
pub mod journal;
pub mod name;
pub mod rr;
pub mod serial;
pub mod tree;
pub mod zone;

pub use changeset::{Changeset, ChangesetSequence};
pub use config::XfrConfig;
pub use error::{IxfrInOutcome, XfrError, XfrResult, XfrStep};
pub use ixfr_in::IxfrInSession;
pub use ixfr_out::{IxfrOutSession, IxfrOutStart};
pub use name::Name;
pub use serial::Serial;
pub use zone::ZoneContents;

/// Returns the crate version as specified in `Cargo.toml`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
