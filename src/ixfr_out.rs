// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! IXFR-out responder (C5): a resumable, multipacket producer that streams
//! a sequence of changesets over DNS wire-format messages.
//!
//! Mirrors `ixfr.c`'s `ixfrout_proc`/`ixfr_process_changeset`/
//! `ixfr_load_chsets`/`ixfr_query`, restructured per Design Notes
//! "Coroutine-like resumption" as an explicit cursor object rather than a
//! state machine driven by `goto`-style fallthrough.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{ArcRwLockReadGuard, RawRwLock, RwLock};
use tracing::info;

use crate::changeset::Changeset;
use crate::config::XfrConfig;
use crate::error::{XfrError, XfrResult, XfrStep};
use crate::journal::{Journal, JournalLookup};
use crate::name::Name;
use crate::rr::{Record, RecordSet};
use crate::serial::Serial;
use crate::zone::ZoneContents;

/// Shared, lock-coordinated handle to a zone's contents (spec §5 "Zone
/// snapshot discipline"). A concrete host process owns one of these per
/// zone and hands out clones to sessions.
pub type ZoneHandle = Arc<RwLock<ZoneContents>>;

/// Destination for outgoing IXFR records, implemented by the external wire
/// codec (spec §1 "wire-format codec for individual resource records" is
/// out of scope; this trait is the seam the responder calls through).
pub trait OutgoingMessage {
    /// Attempts to append `record` to the message. Returns `false` if there
    /// is no room left (the message is full and must be flushed by the
    /// caller before resuming).
    fn put_record(&mut self, record: &Record) -> bool;

    /// Reserves `max_size` bytes up front for a trailing TSIG record
    /// (spec §4.4 "reserving space for a trailing TSIG signature"). Called
    /// once per message before any `put_record` call.
    fn reserve_tsig(&mut self, max_size: usize) {
        let _ = max_size;
    }
}

/// The minimal request context the responder needs from an already-parsed
/// IXFR query (spec §4.4 "Request validation"). Parsing the wire query
/// into this shape is the caller's job (query dispatch is out of scope).
#[derive(Clone, Debug)]
pub struct IxfrRequest {
    /// Whether the query was routed to a zone at all.
    pub has_zone: bool,
    /// Whether QTYPE is IXFR.
    pub qtype_is_ixfr: bool,
    /// QNAME of the query.
    pub qname: Name,
    /// The SOA records present in the authority section (spec requires
    /// exactly one).
    pub authority_soas: Vec<Record>,
    /// Whether the requester is authorized to transfer this zone, per the
    /// zone's transfer policy.
    pub authorized: bool,
}

/// Outcome of [`start`]: either a live streaming session, an immediate
/// single-SOA "up-to-date" reply, or a signal to retry as AXFR.
pub enum IxfrOutStart {
    /// A session is underway; call [`IxfrOutSession::fill`] to produce
    /// messages.
    Session(IxfrOutSession),
    /// The requester is already at or ahead of the local serial (or
    /// `disable_ixfr` forced this path): reply with this single SOA and
    /// end the session.
    UpToDate(Record),
    /// The journal has no history for the requested range; retry as AXFR.
    FallbackToAxfr,
}

fn validate_request(request: &IxfrRequest) -> XfrResult<&Record> {
    if !request.has_zone {
        return Err(XfrError::Denied("query has no associated zone".into()));
    }
    if !request.qtype_is_ixfr {
        return Err(XfrError::Malformed("QTYPE is not IXFR".into()));
    }
    if request.authority_soas.len() != 1 {
        return Err(XfrError::Malformed(format!(
            "expected exactly one SOA in the authority section, got {}",
            request.authority_soas.len()
        )));
    }
    let their_soa = &request.authority_soas[0];
    if their_soa.owner() != &request.qname {
        return Err(XfrError::Malformed(
            "authority SOA owner does not match QNAME".into(),
        ));
    }
    if !request.authorized {
        return Err(XfrError::Denied("transfer not authorized".into()));
    }
    Ok(their_soa)
}

/// Starts an IXFR-out exchange (spec §4.4).
///
/// `zone` being `None` models "no loaded zone" (SERVFAIL); a present handle
/// is read-locked for the duration of a resulting [`IxfrOutSession`].
pub fn start(
    request: &IxfrRequest,
    zone: Option<ZoneHandle>,
    journal: &dyn Journal,
    config: &XfrConfig,
) -> XfrResult<IxfrOutStart> {
    let their_soa = validate_request(request)?;

    let zone = zone.ok_or_else(|| XfrError::Resource("zone is not loaded".into()))?;
    let guard = zone.read_arc();

    let current_soa = guard.apex_soa_record()?;

    if config.disable_ixfr {
        info!("IXFR disabled by configuration, answering with SOA only");
        return Ok(IxfrOutStart::UpToDate(current_soa));
    }

    let serial_local = Serial::new(guard.serial()?);
    let serial_req = Serial::new(
        their_soa
            .soa_serial()
            .ok_or_else(|| XfrError::Malformed("authority SOA has no parseable serial".into()))?,
    );

    if serial_local.compare(serial_req) != std::cmp::Ordering::Greater {
        info!(
            local = serial_local.get(),
            requested = serial_req.get(),
            "zone is up to date"
        );
        return Ok(IxfrOutStart::UpToDate(current_soa));
    }

    match journal.load_changesets(serial_req.get(), serial_local.get()) {
        JournalLookup::Ok(sequence) => {
            let changesets: Vec<Changeset> = sequence.changesets().to_vec();
            let soa_from = changesets
                .first()
                .and_then(|c| c.soa_from())
                .cloned()
                .ok_or_else(|| XfrError::Io("journal returned an empty changeset sequence".into()))?;
            let soa_to = changesets
                .last()
                .and_then(|c| c.soa_to())
                .cloned()
                .ok_or_else(|| XfrError::Io("journal returned an empty changeset sequence".into()))?;

            info!(
                from = soa_from.soa_serial(),
                to = soa_to.soa_serial(),
                changesets = changesets.len(),
                "started IXFR-out"
            );

            Ok(IxfrOutStart::Session(IxfrOutSession {
                state: Some(SessionState {
                    _zone_guard: guard,
                    changesets,
                    cursor: Cursor::default(),
                    soa_from,
                    soa_to,
                    started_at: Instant::now(),
                    messages_sent: 0,
                    bytes_sent: 0,
                }),
            }))
        }
        JournalLookup::NoSuchRange | JournalLookup::NotPresent => {
            info!("incomplete journal history, falling back to AXFR");
            Ok(IxfrOutStart::FallbackToAxfr)
        }
        JournalLookup::IoError(message) => Err(XfrError::Io(message)),
    }
}

/// Phases of the overall session, in emission order (spec §4.4/§6 wire
/// format). `Lead` and `Trail` bracket the whole changeset queue with the
/// overall target SOA (RFC 1995's leading/repeated "SOA_new"), which is
/// what lets [`crate::ixfr_in`]'s `SOA_FROM` state recognize end-of-transfer
/// by content equality against the stream's first record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Lead,
    SoaRemove,
    Remove,
    SoaAdd,
    Add,
    Trail,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Lead
    }
}

/// The resumable position within the changeset queue: which changeset,
/// which phase, and (within `Remove`/`Add`) which RRSet and which record
/// inside it. This is the entire state needed to resume byte-identical
/// output across calls (Design Notes "Coroutine-like resumption").
#[derive(Default)]
struct Cursor {
    changeset_index: usize,
    phase: Phase,
    rrset_index: usize,
    record_index: usize,
}

impl Cursor {
    fn reset_list_position(&mut self) {
        self.rrset_index = 0;
        self.record_index = 0;
    }
}

enum ListOutcome {
    Full,
    Done,
}

struct SessionState {
    _zone_guard: ArcRwLockReadGuard<RawRwLock, ZoneContents>,
    changesets: Vec<Changeset>,
    cursor: Cursor,
    soa_from: Record,
    soa_to: Record,
    started_at: Instant,
    messages_sent: u32,
    bytes_sent: u64,
}

/// Approximates a record's wire size for the session's byte counters
/// (spec §9 "Per-session timestamps and packet/byte counters"). This is not
/// an exact wire-format size computation (that's the external codec's
/// job) — just enough for the operational log line.
fn approx_wire_size(record: &Record) -> usize {
    let owner_len: usize = record
        .owner()
        .labels()
        .iter()
        .map(|label| label.len() + 1)
        .sum::<usize>()
        + 1; // root terminator
    owner_len + 2 /* type */ + 2 /* class */ + 4 /* ttl */ + 2 /* rdlength */ + record.rdata().len()
}

fn fill_list(
    cursor: &mut Cursor,
    list: &[RecordSet],
    message: &mut dyn OutgoingMessage,
    bytes_sent: &mut u64,
) -> ListOutcome {
    while cursor.rrset_index < list.len() {
        let rrset = &list[cursor.rrset_index];
        if rrset.is_empty() {
            // Spec §4.4: empty RRSets within REMOVE/ADD lists are silently
            // skipped; they never reach the wire.
            cursor.rrset_index += 1;
            cursor.record_index = 0;
            continue;
        }
        let records: Vec<&Record> = rrset.records().collect();
        while cursor.record_index < records.len() {
            let record = records[cursor.record_index];
            if !message.put_record(record) {
                return ListOutcome::Full;
            }
            *bytes_sent += approx_wire_size(record) as u64;
            cursor.record_index += 1;
        }
        cursor.rrset_index += 1;
        cursor.record_index = 0;
    }
    ListOutcome::Done
}

/// A single IXFR-out session: all the state needed to resume streaming a
/// changeset sequence across message boundaries (spec §4.4/§5).
pub struct IxfrOutSession {
    state: Option<SessionState>,
}

impl IxfrOutSession {
    /// Fills `message` with as many records as fit, in the order SOA_REMOVE
    /// -> REMOVE -> SOA_ADD -> ADD per changeset, advancing to the next
    /// changeset on completion.
    ///
    /// Returns [`XfrStep::Full`] if `message` filled up mid-stream (call
    /// again with a fresh message to resume exactly where this call left
    /// off); returns [`XfrStep::Done`] once every changeset has been
    /// emitted, after which the session should be [`cleanup`](Self::cleanup)ed.
    ///
    /// Calling this after [`cleanup`](Self::cleanup) is a programmer error.
    pub fn fill(
        &mut self,
        message: &mut dyn OutgoingMessage,
        tsig_max_size: usize,
    ) -> XfrResult<XfrStep> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| XfrError::InvalidArg("fill() called after session cleanup".into()))?;

        message.reserve_tsig(tsig_max_size);
        state.messages_sent += 1;

        loop {
            if state.cursor.phase == Phase::Lead {
                if !message.put_record(&state.soa_to) {
                    return Ok(XfrStep::Full);
                }
                state.bytes_sent += approx_wire_size(&state.soa_to) as u64;
                state.cursor.phase = Phase::SoaRemove;
                continue;
            }
            if state.cursor.phase == Phase::Trail {
                if !message.put_record(&state.soa_to) {
                    return Ok(XfrStep::Full);
                }
                state.bytes_sent += approx_wire_size(&state.soa_to) as u64;
                let elapsed = state.started_at.elapsed();
                info!(
                    from = state.soa_from.soa_serial(),
                    to = state.soa_to.soa_serial(),
                    seconds = elapsed.as_secs_f64(),
                    messages = state.messages_sent,
                    kilobytes = state.bytes_sent as f64 / 1024.0,
                    "finished IXFR-out"
                );
                return Ok(XfrStep::Done);
            }
            if state.cursor.changeset_index >= state.changesets.len() {
                state.cursor.phase = Phase::Trail;
                continue;
            }

            let changeset = &state.changesets[state.cursor.changeset_index];
            match state.cursor.phase {
                Phase::Lead | Phase::Trail => unreachable!("handled above"),
                Phase::SoaRemove => {
                    let soa = changeset
                        .soa_from()
                        .ok_or_else(|| XfrError::Semantic("changeset missing soa_from".into()))?;
                    if !message.put_record(soa) {
                        return Ok(XfrStep::Full);
                    }
                    state.bytes_sent += approx_wire_size(soa) as u64;
                    state.cursor.phase = Phase::Remove;
                }
                Phase::Remove => {
                    match fill_list(
                        &mut state.cursor,
                        changeset.remove(),
                        message,
                        &mut state.bytes_sent,
                    ) {
                        ListOutcome::Full => return Ok(XfrStep::Full),
                        ListOutcome::Done => {
                            state.cursor.reset_list_position();
                            state.cursor.phase = Phase::SoaAdd;
                        }
                    }
                }
                Phase::SoaAdd => {
                    let soa = changeset
                        .soa_to()
                        .ok_or_else(|| XfrError::Semantic("changeset missing soa_to".into()))?;
                    if !message.put_record(soa) {
                        return Ok(XfrStep::Full);
                    }
                    state.bytes_sent += approx_wire_size(soa) as u64;
                    state.cursor.phase = Phase::Add;
                }
                Phase::Add => {
                    match fill_list(
                        &mut state.cursor,
                        changeset.add(),
                        message,
                        &mut state.bytes_sent,
                    ) {
                        ListOutcome::Full => return Ok(XfrStep::Full),
                        ListOutcome::Done => {
                            info!(
                                serial_from = changeset.serial_from(),
                                serial_to = changeset.serial_to(),
                                "streamed changeset"
                            );
                            state.cursor.reset_list_position();
                            state.cursor.phase = Phase::SoaRemove;
                            state.cursor.changeset_index += 1;
                        }
                    }
                }
            }
        }
    }

    /// Releases the session's reader lock and drops its changeset queue.
    /// Idempotent: safe to call multiple times, and safe to call on every
    /// exit path (success, failure, or host cancellation) per spec §5.
    pub fn cleanup(&mut self) {
        self.state = None;
    }
}

impl Drop for IxfrOutSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}
