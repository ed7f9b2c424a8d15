// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Zone contents: the pair of trees (main + NSEC3) plus apex and serial.

use crate::error::{XfrError, XfrResult};
use crate::name::Name;
use crate::rr::SOA;
use crate::tree::ZoneTree;

/// A single consistent snapshot of a zone: its main owner-name tree, its
/// parallel NSEC3 tree, and the apex name used to find the SOA serial.
#[derive(Clone, Debug, Default)]
pub struct ZoneContents {
    apex: Name,
    main: ZoneTree,
    nsec3: ZoneTree,
}

impl ZoneContents {
    /// Creates an empty zone with the given apex name. The apex node is not
    /// created automatically; callers populate it via [`ZoneContents::main_mut`].
    pub fn new(apex: Name) -> Self {
        Self {
            apex,
            main: ZoneTree::new(),
            nsec3: ZoneTree::new(),
        }
    }

    /// The zone's apex (origin) name.
    pub fn apex(&self) -> &Name {
        &self.apex
    }

    /// The main (non-NSEC3) zone tree.
    pub fn main(&self) -> &ZoneTree {
        &self.main
    }

    /// Mutable access to the main zone tree.
    pub fn main_mut(&mut self) -> &mut ZoneTree {
        &mut self.main
    }

    /// The NSEC3 zone tree.
    pub fn nsec3(&self) -> &ZoneTree {
        &self.nsec3
    }

    /// Mutable access to the NSEC3 zone tree.
    pub fn nsec3_mut(&mut self) -> &mut ZoneTree {
        &mut self.nsec3
    }

    /// Reads the zone's serial number from the apex SOA RRSet.
    ///
    /// Returns [`XfrError::InvalidArg`] if the apex node or its SOA record
    /// is missing (spec §4.3 precondition: "both zones have an apex with at
    /// least one SOA record").
    pub fn serial(&self) -> XfrResult<u32> {
        let apex_node = self
            .main
            .get(&self.apex)
            .ok_or_else(|| XfrError::InvalidArg("zone has no apex node".into()))?;
        let soa_set = apex_node
            .rrset(SOA)
            .ok_or_else(|| XfrError::InvalidArg("apex node has no SOA RRSet".into()))?;
        let soa = soa_set
            .records()
            .next()
            .ok_or_else(|| XfrError::InvalidArg("apex SOA RRSet is empty".into()))?;
        soa.soa_serial()
            .ok_or_else(|| XfrError::InvalidArg("apex SOA record has malformed rdata".into()))
    }

    /// Returns a clone of the apex SOA record itself (not just its serial),
    /// as needed by the differ to bracket a changeset (spec §4.3).
    pub fn apex_soa_record(&self) -> XfrResult<crate::rr::Record> {
        let apex_node = self
            .main
            .get(&self.apex)
            .ok_or_else(|| XfrError::InvalidArg("zone has no apex node".into()))?;
        let soa_set = apex_node
            .rrset(SOA)
            .ok_or_else(|| XfrError::InvalidArg("apex node has no SOA RRSet".into()))?;
        soa_set
            .records()
            .next()
            .cloned()
            .ok_or_else(|| XfrError::InvalidArg("apex SOA RRSet is empty".into()))
    }
}
