// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end scenarios and invariants from the specification (§8),
//! exercised through the crate's public API rather than module internals.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use zone_xfr::apply::{self, InMemoryApply};
use zone_xfr::changeset::{ChangePart, ChangesetSequence};
use zone_xfr::differ::create_diff;
use zone_xfr::error::XfrError;
use zone_xfr::ixfr_in::IxfrInSession;
use zone_xfr::ixfr_out::{self, IxfrOutStart, IxfrRequest, OutgoingMessage, ZoneHandle};
use zone_xfr::journal::{Journal, JournalLookup};
use zone_xfr::rr::{Record, RecordSet, SOA};
use zone_xfr::tree::ZoneNode;
use zone_xfr::{IxfrInOutcome, Name, XfrConfig, XfrStep, ZoneContents};

/// Installs a `tracing-subscriber` fmt layer once per test binary, so the
/// session-lifecycle `info!`/`debug!` lines (spec §7 "operational log
/// lines") are visible under `cargo test -- --nocapture`.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

fn soa(owner: &str, serial: u32) -> Record {
    Record::new(Name::parse(owner), SOA, 3600, Bytes::copy_from_slice(&serial.to_be_bytes()))
}

fn a_record(owner: &str, octet: u8, ttl: u32) -> Record {
    Record::new(Name::parse(owner), 1, ttl, Bytes::copy_from_slice(&[10, 0, 0, octet]))
}

fn zone_with_apex_soa(apex: &str, serial: u32) -> ZoneContents {
    let apex_name = Name::parse(apex);
    let mut zone = ZoneContents::new(apex_name.clone());
    let mut apex_node = ZoneNode::new(apex_name.clone());
    let mut soa_set = RecordSet::new(apex_name.clone(), SOA);
    soa_set.insert(soa(apex, serial));
    apex_node.put_rrset(soa_set);
    zone.main_mut().insert(apex_node);
    zone
}

fn put_record(zone: &mut ZoneContents, record: Record) {
    let owner = record.owner().clone();
    if zone.main().get(&owner).is_none() {
        zone.main_mut().insert(ZoneNode::new(owner.clone()));
    }
    let node = zone.main_mut().get_mut(&owner).unwrap();
    let mut rrset = node
        .rrset(record.record_type())
        .cloned()
        .unwrap_or_else(|| RecordSet::new(owner.clone(), record.record_type()));
    rrset.insert(record);
    node.put_rrset(rrset);
}

/// A content snapshot of a zone's main tree, independent of in-memory
/// insertion order, used to assert two zones are RRSet-equal (spec
/// invariant 1 uses "RRSet-set equality per node").
fn snapshot(zone: &ZoneContents) -> BTreeMap<String, BTreeMap<u16, Vec<(Vec<u8>, u32)>>> {
    let mut out = BTreeMap::new();
    zone.main().apply(|node| {
        let mut by_type = BTreeMap::new();
        for rrset in node.rrsets() {
            if rrset.is_empty() {
                continue;
            }
            let mut records: Vec<(Vec<u8>, u32)> = rrset
                .records()
                .map(|r| (r.rdata().to_vec(), r.ttl()))
                .collect();
            records.sort();
            by_type.insert(rrset.record_type(), records);
        }
        out.insert(node.owner().to_string(), by_type);
    });
    out
}

struct FakeJournal {
    sequences: RefCell<Vec<(u32, u32, ChangesetSequence)>>,
}

impl Journal for FakeJournal {
    fn load_changesets(&self, serial_from: u32, serial_to: u32) -> JournalLookup {
        for (from, to, seq) in self.sequences.borrow().iter() {
            if *from == serial_from && *to == serial_to {
                return JournalLookup::Ok(seq.clone());
            }
        }
        JournalLookup::NoSuchRange
    }
}

struct RecordingMessage {
    capacity: usize,
    records: Vec<Record>,
}

impl RecordingMessage {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::new(),
        }
    }
}

impl OutgoingMessage for RecordingMessage {
    fn put_record(&mut self, record: &Record) -> bool {
        if self.records.len() >= self.capacity {
            return false;
        }
        self.records.push(record.clone());
        true
    }
}

fn stream_whole_session(
    mut session: ixfr_out::IxfrOutSession,
    capacity: usize,
) -> Vec<Record> {
    let mut all = Vec::new();
    loop {
        let mut message = RecordingMessage::new(capacity);
        let step = session.fill(&mut message, 0).unwrap();
        all.extend(message.records);
        if step == XfrStep::Done {
            break;
        }
    }
    all
}

// --- Scenario A: empty diff -------------------------------------------

#[test]
fn scenario_a_empty_diff_is_up_to_date() {
    let z1 = zone_with_apex_soa("example.com.", 100);
    let z2 = zone_with_apex_soa("example.com.", 100);
    let err = create_diff(&z1, &z2).unwrap_err();
    assert!(matches!(err, XfrError::UpToDate));
}

// --- Scenario B: single-RR delta ---------------------------------------

#[test]
fn scenario_b_single_rr_delta() {
    let mut z1 = zone_with_apex_soa("example.com.", 100);
    put_record(&mut z1, a_record("example.com.", 1, 3600));
    let mut z2 = zone_with_apex_soa("example.com.", 101);
    put_record(&mut z2, a_record("example.com.", 2, 3600));

    let changeset = create_diff(&z1, &z2).unwrap();
    assert_eq!(changeset.serial_from(), 100);
    assert_eq!(changeset.serial_to(), 101);
    assert_eq!(changeset.remove().len(), 1);
    assert_eq!(changeset.add().len(), 1);
    assert_eq!(
        changeset.remove()[0].records().next().unwrap().rdata(),
        &Bytes::copy_from_slice(&[10, 0, 0, 1])
    );
    assert_eq!(
        changeset.add()[0].records().next().unwrap().rdata(),
        &Bytes::copy_from_slice(&[10, 0, 0, 2])
    );
}

// --- Scenario C: TTL-only change ----------------------------------------

#[test]
fn scenario_c_ttl_only_change() {
    let mut z1 = zone_with_apex_soa("example.com.", 100);
    put_record(&mut z1, a_record("example.com.", 1, 3600));
    let mut z2 = zone_with_apex_soa("example.com.", 101);
    put_record(&mut z2, a_record("example.com.", 1, 7200));

    let changeset = create_diff(&z1, &z2).unwrap();
    assert_eq!(changeset.remove().len(), 1);
    assert_eq!(changeset.add().len(), 1);
    assert_eq!(changeset.remove()[0].records().next().unwrap().ttl(), 3600);
    assert_eq!(changeset.add()[0].records().next().unwrap().ttl(), 7200);
}

// --- Scenario D: IXFR-out resumption ------------------------------------

#[test]
fn scenario_d_resumption_matches_single_message_output() {
    let mut seq = ChangesetSequence::new();
    let cs1 = seq.push_changeset();
    cs1.set_soa_from(soa("example.com.", 100));
    cs1.set_soa_to(soa("example.com.", 101));
    let mut remove1 = RecordSet::new(Name::parse("www.example.com."), 1);
    remove1.push_raw(a_record("www.example.com.", 1, 3600));
    cs1.append(ChangePart::Remove, remove1);
    let mut add1 = RecordSet::new(Name::parse("www.example.com."), 1);
    add1.push_raw(a_record("www.example.com.", 2, 3600));
    cs1.append(ChangePart::Add, add1);

    let cs2 = seq.push_changeset();
    cs2.set_soa_from(soa("example.com.", 101));
    cs2.set_soa_to(soa("example.com.", 102));
    let mut add2 = RecordSet::new(Name::parse("other.example.com."), 1);
    add2.push_raw(a_record("other.example.com.", 3, 3600));
    cs2.append(ChangePart::Add, add2);

    let zone: ZoneHandle = Arc::new(RwLock::new(zone_with_apex_soa("example.com.", 102)));
    let journal = FakeJournal {
        sequences: RefCell::new(vec![(100, 102, seq)]),
    };
    let request = IxfrRequest {
        has_zone: true,
        qtype_is_ixfr: true,
        qname: Name::parse("example.com."),
        authority_soas: vec![soa("example.com.", 100)],
        authorized: true,
    };
    let config = XfrConfig::default();

    let reference = match ixfr_out::start(&request, Some(zone.clone()), &journal, &config).unwrap()
    {
        IxfrOutStart::Session(s) => stream_whole_session(s, usize::MAX),
        _ => panic!("expected a session"),
    };

    let resumed = match ixfr_out::start(&request, Some(zone), &journal, &config).unwrap() {
        IxfrOutStart::Session(mut s) => {
            let mut all = Vec::new();
            for capacity in [2usize, 2, usize::MAX] {
                let mut message = RecordingMessage::new(capacity);
                let step = s.fill(&mut message, 0).unwrap();
                all.extend(message.records);
                if step == XfrStep::Done {
                    break;
                }
            }
            all
        }
        _ => panic!("expected a session"),
    };

    assert_eq!(reference, resumed);
}

// --- Scenario E: IXFR-in fallback filtering ------------------------------

#[test]
fn scenario_e_out_of_zone_record_is_skipped() {
    let records = vec![
        soa("example.com.", 101),
        soa("example.com.", 100),
        a_record("www.evil.com.", 9, 3600),
        soa("example.com.", 101),
    ];

    let mut session = IxfrInSession::start(Name::parse("example.com."), &XfrConfig::default());
    let done = session.process_message(&records).unwrap();
    assert!(done);

    let mut zone = zone_with_apex_soa("example.com.", 100);
    let applier = InMemoryApply;
    let outcome = session.finalize(&mut zone, &applier).unwrap();
    assert!(matches!(outcome, IxfrInOutcome::Applied));
    assert!(zone.main().get(&Name::parse("www.evil.com.")).is_none());
}

// --- Scenario F: predecessor wrap-around ---------------------------------

#[test]
fn scenario_f_predecessor_wraps_to_rightmost() {
    let mut zone = ZoneContents::new(Name::parse("."));
    zone.main_mut().insert(ZoneNode::new(Name::parse("b.")));
    zone.main_mut().insert(ZoneNode::new(Name::parse("c.")));
    zone.main_mut().insert(ZoneNode::new(Name::parse("d.")));

    let result = zone.main().predecessor_or_equal(&Name::parse("a.")).unwrap();
    assert!(result.found.is_none());
    assert_eq!(result.previous.owner(), &Name::parse("d."));
}

// --- Invariant 1: diff(Z1, Z2) applied to Z1 reconstructs Z2 -------------

#[test]
fn invariant_diff_then_apply_reconstructs_target_zone() {
    let mut z1 = zone_with_apex_soa("example.com.", 100);
    put_record(&mut z1, a_record("www.example.com.", 1, 3600));
    put_record(&mut z1, a_record("www.example.com.", 2, 3600));
    put_record(&mut z1, a_record("stale.example.com.", 5, 3600));

    let mut z2 = zone_with_apex_soa("example.com.", 101);
    put_record(&mut z2, a_record("www.example.com.", 1, 3600)); // unchanged
    put_record(&mut z2, a_record("www.example.com.", 9, 7200)); // replaces .2 with new ttl/data
    put_record(&mut z2, a_record("new.example.com.", 7, 3600)); // brand new node
    // "stale.example.com." is gone entirely in z2.

    let changeset = create_diff(&z1, &z2).unwrap();

    let mut reconstructed = z1.clone();
    apply::apply_changeset(&mut reconstructed, &changeset).unwrap();

    assert_eq!(reconstructed.serial().unwrap(), 101);
    assert_eq!(snapshot(&reconstructed), snapshot(&z2));
}

// --- Invariant 2 & 5: full wire round trip through ixfr_out/ixfr_in ------

#[test]
fn invariant_full_wire_round_trip_reconstructs_target_zone() {
    init_tracing();
    let mut z1 = zone_with_apex_soa("example.com.", 100);
    put_record(&mut z1, a_record("www.example.com.", 1, 3600));
    put_record(&mut z1, a_record("old.example.com.", 4, 3600));

    let mut z2 = zone_with_apex_soa("example.com.", 101);
    put_record(&mut z2, a_record("www.example.com.", 1, 3600));
    put_record(&mut z2, a_record("www.example.com.", 2, 3600));
    put_record(&mut z2, a_record("fresh.example.com.", 8, 3600));

    let changeset = create_diff(&z1, &z2).unwrap();
    let mut sequence = ChangesetSequence::new();
    sequence.set_first_soa(z2.apex_soa_record().unwrap());
    *sequence.push_changeset() = changeset;

    let zone: ZoneHandle = Arc::new(RwLock::new(z1.clone()));
    let journal = FakeJournal {
        sequences: RefCell::new(vec![(100, 101, sequence)]),
    };
    let request = IxfrRequest {
        has_zone: true,
        qtype_is_ixfr: true,
        qname: Name::parse("example.com."),
        authority_soas: vec![soa("example.com.", 100)],
        authorized: true,
    };
    let config = XfrConfig::default();

    let wire = match ixfr_out::start(&request, Some(zone), &journal, &config).unwrap() {
        IxfrOutStart::Session(s) => stream_whole_session(s, 3), // small messages, forces resumption
        _ => panic!("expected a session"),
    };

    let mut consumer = IxfrInSession::start(Name::parse("example.com."), &config);
    assert!(consumer.process_message(&wire).unwrap());

    let mut applied = z1.clone();
    let outcome = consumer.finalize(&mut applied, &InMemoryApply).unwrap();
    assert!(matches!(outcome, IxfrInOutcome::Applied));

    assert_eq!(snapshot(&applied), snapshot(&z2));
}

// --- Invariant 6: journal-node-limit forces fallback without mutation ----

#[test]
fn invariant_journal_limit_exceeded_falls_back_without_mutating_zone() {
    let config = XfrConfig {
        journal_node_limit: 1,
        ..XfrConfig::default()
    };
    let mut session = IxfrInSession::start(Name::parse("example.com."), &config);

    let records = vec![
        soa("example.com.", 103),
        soa("example.com.", 100),
        soa("example.com.", 101),
        soa("example.com.", 101),
        soa("example.com.", 102),
        soa("example.com.", 102),
        soa("example.com.", 103),
        soa("example.com.", 103),
    ];

    let done = session.process_message(&records).unwrap();
    assert!(done);

    let mut zone = zone_with_apex_soa("example.com.", 100);
    let outcome = session.finalize(&mut zone, &InMemoryApply).unwrap();
    assert!(matches!(outcome, IxfrInOutcome::FallbackToAxfr));
    assert_eq!(zone.serial().unwrap(), 100);
}

// --- Invariant 7: missing final SOA leaves the zone unchanged ------------

#[test]
fn invariant_missing_final_soa_falls_back_without_mutating_zone() {
    let records = vec![
        soa("example.com.", 101),
        soa("example.com.", 100),
        a_record("www.example.com.", 1, 3600),
    ];

    let mut session = IxfrInSession::start(Name::parse("example.com."), &XfrConfig::default());
    let done = session.process_message(&records).unwrap();
    assert!(!done);

    let mut zone = zone_with_apex_soa("example.com.", 100);
    let outcome = session.finalize(&mut zone, &InMemoryApply).unwrap();
    assert!(matches!(outcome, IxfrInOutcome::FallbackToAxfr));
    assert_eq!(zone.serial().unwrap(), 100);
}

// --- Disabled-IXFR config knob -------------------------------------------

#[test]
fn disable_ixfr_config_forces_single_soa_reply() {
    let zone: ZoneHandle = Arc::new(RwLock::new(zone_with_apex_soa("example.com.", 200)));
    let journal = FakeJournal {
        sequences: RefCell::new(Vec::new()),
    };
    let request = IxfrRequest {
        has_zone: true,
        qtype_is_ixfr: true,
        qname: Name::parse("example.com."),
        authority_soas: vec![soa("example.com.", 100)],
        authorized: true,
    };
    let config = XfrConfig {
        disable_ixfr: true,
        ..XfrConfig::default()
    };

    let outcome = ixfr_out::start(&request, Some(zone), &journal, &config).unwrap();
    assert!(matches!(outcome, IxfrOutStart::UpToDate(_)));
}
