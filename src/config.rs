// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration knobs recognized by the core (spec §6).

use serde::Deserialize;

/// The original C implementation's `JOURNAL_NCOUNT` bound on how many
/// changesets an IXFR-in session will accumulate before giving up and
/// falling back to AXFR.
fn journal_node_limit_default() -> u32 {
    1000
}

/// Configuration for the zone-transfer core, embeddable in a host's larger
/// configuration tree (spec §6).
#[derive(Clone, Debug, Deserialize)]
pub struct XfrConfig {
    /// Forces the IXFR-out responder onto the single-SOA "up-to-date" reply
    /// path unconditionally, regardless of serial comparison (spec §4.4).
    #[serde(default)]
    pub disable_ixfr: bool,

    /// Maximum number of changesets an IXFR-in session will accumulate
    /// before forcing an AXFR fallback (spec §4.5/§6).
    #[serde(default = "journal_node_limit_default")]
    pub journal_node_limit: u32,
}

impl Default for XfrConfig {
    fn default() -> Self {
        Self {
            disable_ixfr: false,
            journal_node_limit: journal_node_limit_default(),
        }
    }
}
