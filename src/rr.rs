// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Resource records and resource record sets (RRSets).

use bytes::Bytes;
use tracing::{info, warn};

use crate::name::Name;

/// The 16-bit DNS record type. SOA is called out explicitly because the
/// differ and the IXFR state machines special-case it; all other types are
/// opaque value-semantic data as far as this crate is concerned.
pub type RecordType = u16;

/// The SOA record type number (RFC 1035 §3.3.13).
pub const SOA: RecordType = 6;
/// The NS record type number (RFC 1035 §3.3.11).
pub const NS: RecordType = 2;
/// The CNAME record type number (RFC 1035 §3.3.1).
pub const CNAME: RecordType = 5;

/// The 16-bit DNS class. Only `IN` is meaningful to this crate; others are
/// carried through unexamined.
pub type DnsClass = u16;

/// The Internet class (RFC 1035 §3.2.4).
pub const IN: DnsClass = 1;

/// A single resource record: owner, type, class, TTL, and opaque rdata.
///
/// `RData` is an opaque byte string per the spec's record-type dispatch
/// design note: the differ and the IXFR engines only ever need rdata
/// equality and cheap cloning, never type-specific interpretation (parsing
/// rdata into typed fields is the external wire-format codec's job).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    owner: Name,
    record_type: RecordType,
    dns_class: DnsClass,
    ttl: u32,
    rdata: Bytes,
}

impl Record {
    /// Creates a new record.
    pub fn new(owner: Name, record_type: RecordType, ttl: u32, rdata: impl Into<Bytes>) -> Self {
        Self {
            owner,
            record_type,
            dns_class: IN,
            ttl,
            rdata: rdata.into(),
        }
    }

    /// The record's owner name.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// The record's type.
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// The record's class.
    pub fn dns_class(&self) -> DnsClass {
        self.dns_class
    }

    /// Sets the record's class.
    pub fn set_dns_class(mut self, dns_class: DnsClass) -> Self {
        self.dns_class = dns_class;
        self
    }

    /// The record's TTL, in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Sets the record's TTL.
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// The record's opaque rdata.
    pub fn rdata(&self) -> &Bytes {
        &self.rdata
    }

    /// Parses the serial out of this record's rdata, assuming it is an SOA
    /// record laid out as the first four bytes of rdata being the 32-bit
    /// big-endian serial (a simplification of the full SOA rdata grammar,
    /// which is not this crate's concern — the wire codec owns that).
    ///
    /// Returns `None` if this is not an SOA record or the rdata is too
    /// short.
    pub fn soa_serial(&self) -> Option<u32> {
        if self.record_type != SOA || self.rdata.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes(self.rdata[0..4].try_into().unwrap()))
    }

    /// Compares record data only (ignores TTL), per spec §3 "content
    /// equality".
    pub fn content_eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.record_type == other.record_type
            && self.dns_class == other.dns_class
            && self.rdata == other.rdata
    }
}

/// A set of resource records sharing owner, type, and class, differing only
/// in rdata and TTL.
///
/// Invariant: no two records in the set have identical rdata (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet {
    owner: Name,
    record_type: RecordType,
    dns_class: DnsClass,
    ttl: u32,
    records: Vec<Record>,
}

impl RecordSet {
    /// Creates an empty RRSet for the given owner/type.
    pub fn new(owner: Name, record_type: RecordType) -> Self {
        Self {
            owner,
            record_type,
            dns_class: IN,
            ttl: 0,
            records: Vec::new(),
        }
    }

    /// The RRSet's owner name.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// The RRSet's record type.
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// The RRSet's TTL (the TTL of the most recently inserted record).
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns true if the set has no records. Per spec §3, empty RRSets
    /// are legal in transit but must be skipped when written to the wire.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The number of records in the set.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Iterates the records in the set.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Looks up a record in this set with rdata identical to `rdata`.
    pub fn find_by_rdata(&self, rdata: &Bytes) -> Option<&Record> {
        self.records.iter().find(|r| &r.rdata == rdata)
    }

    /// Appends a record without applying the RFC 2136 §1.1.5
    /// replace-on-insert rules [`RecordSet::insert`] enforces.
    ///
    /// Used to assemble ad-hoc "delta" RRSets (changeset REMOVE/ADD lists)
    /// that are never themselves live zone state, so the single-SOA /
    /// single-CNAME replacement semantics don't apply.
    pub fn push_raw(&mut self, record: Record) {
        self.ttl = record.ttl;
        self.records.push(record);
    }

    /// Inserts a record into the set, honoring RFC 2136 §1.1.5 replacement
    /// rules for SOA/CNAME (a single RR per owner+type, replaced rather
    /// than appended), mirroring the teacher's `RecordSet::insert`.
    ///
    /// Returns `true` if the set's contents changed.
    pub fn insert(&mut self, record: Record) -> bool {
        debug_assert_eq!(record.owner, self.owner);
        debug_assert_eq!(record.record_type, self.record_type);

        match self.record_type {
            SOA => {
                debug_assert!(self.records.len() <= 1);
                if let Some(existing) = self.records.first() {
                    match (existing.soa_serial(), record.soa_serial()) {
                        (Some(old), Some(new)) if new <= old => {
                            info!(old, new, "update ignored, serial out of date");
                            return false;
                        }
                        _ => {}
                    }
                }
                self.records.clear();
            }
            CNAME => {
                debug_assert!(self.records.len() <= 1);
                self.records.clear();
            }
            _ => {}
        }

        if let Some(pos) = self.records.iter().position(|r| r.rdata == record.rdata) {
            if self.records[pos] == record {
                return false;
            }
            self.records[pos] = record.clone();
            self.ttl = record.ttl;
            true
        } else {
            self.ttl = record.ttl;
            self.records.push(record);
            true
        }
    }

    /// Removes a record with matching rdata from the set, refusing to
    /// delete the last NS record or any SOA record (the zone's single
    /// authority record is never removed by a transfer-driven delta).
    ///
    /// Returns `true` if a record was removed.
    pub fn remove(&mut self, rdata: &Bytes) -> bool {
        match self.record_type {
            NS if self.records.len() <= 1 => {
                info!("ignoring delete of last NS record");
                return false;
            }
            SOA => {
                warn!("ignored delete of SOA");
                return false;
            }
            _ => {}
        }

        let before = self.records.len();
        self.records.retain(|r| &r.rdata != rdata);
        self.records.len() < before
    }
}
