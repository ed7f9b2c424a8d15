// Copyright 2015-2024 The contributors to zone-xfr
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! IXFR-in consumer (C6): a streaming state machine that reconstructs
//! changesets from arriving answer records and finalizes by atomic apply,
//! or signals AXFR fallback.
//!
//! States and transitions mirror `ixfr.c`'s `ixfrin_step`/
//! `xfrin_process_ixfr_packet`/`ixfrin_finalize` (enum `ixfrin_states`),
//! restructured so the "re-dispatch without consuming" trick (spec §4.5
//! `DEL`/`ADD` states on encountering a boundary SOA) is an explicit loop
//! rather than an index that's conditionally not incremented.

use tracing::{info, warn};

use crate::apply::ApplyAndStore;
use crate::changeset::{ChangePart, ChangesetSequence};
use crate::config::XfrConfig;
use crate::error::{IxfrInOutcome, XfrError, XfrResult};
use crate::name::Name;
use crate::rr::{Record, SOA};
use crate::zone::ZoneContents;

/// IXFR-in processing states (spec §4.5 table; names match the wire
/// grammar of RFC 1995).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Start,
    SoaFrom,
    Del,
    SoaTo,
    Add,
    Done,
}

/// Result of feeding one RR to the state machine (spec §4.5's per-step
/// outcome, before the "more answer records in this message" loop wraps
/// it).
enum StepResult {
    /// Processing may continue; more RRs are expected.
    More,
    /// The transfer is complete (final SOA boundary reached).
    Done,
}

/// A single IXFR-in session: accumulates a [`ChangesetSequence`] across
/// however many answer messages it takes, then finalizes by applying it to
/// the zone (or signaling AXFR fallback).
///
/// The "memory arena for RRSet copies" of spec §4.5 maps directly onto this
/// struct's owned `ChangesetSequence` under ordinary Rust ownership (Design
/// Notes "Consistent single-allocator arena discipline" / SPEC_FULL ADDED
/// item 5) — there is no separate arena type.
pub struct IxfrInSession {
    state: State,
    sequence: ChangesetSequence,
    zone_name: Name,
    journal_node_limit: u32,
}

impl IxfrInSession {
    /// Starts a new IXFR-in session for the zone named `zone_name`.
    pub fn start(zone_name: Name, config: &XfrConfig) -> Self {
        info!(zone = %zone_name, "starting IXFR-in");
        Self {
            state: State::Start,
            sequence: ChangesetSequence::new(),
            zone_name,
            journal_node_limit: config.journal_node_limit,
        }
    }

    /// True once the state machine has reached its terminal `DONE` state
    /// (the final SOA boundary was recognized).
    fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Returns true if `rr`'s owner is out of this session's zone (spec
    /// §4.5 "Per-RR filtering": neither equal to nor a proper subdomain of
    /// the zone name). Such RRs are silently skipped.
    fn out_of_zone(&self, rr: &Record) -> bool {
        !rr.owner().is_subdomain_of_or_equal(&self.zone_name)
    }

    /// Feeds one RR to the state machine, mutating `state`/`sequence` per
    /// the spec §4.5 transition table. Returns whether the RR was consumed
    /// (the caller should advance to the next RR) and the step outcome.
    fn step(&mut self, rr: &Record) -> XfrResult<(bool, StepResult)> {
        match self.state {
            State::Start => {
                if rr.record_type() != SOA {
                    return Err(XfrError::Malformed(
                        "expected SOA as first record of IXFR-in stream".into(),
                    ));
                }
                self.sequence.set_first_soa(rr.clone());
                self.state = State::SoaFrom;
                Ok((true, StepResult::More))
            }
            State::SoaFrom => {
                if rr.record_type() != SOA {
                    return Err(XfrError::Malformed(
                        "expected SOA at start of changeset".into(),
                    ));
                }
                // Open Question (spec §9): this comparison is full-content
                // equality (TTL included), preserved exactly as the
                // original source does it even though it means peers that
                // vary the boundary SOA's TTL would not be recognized as
                // "done" here.
                let first_soa = self
                    .sequence
                    .first_soa()
                    .expect("first_soa set in State::Start")
                    .clone();
                if *rr == first_soa {
                    self.state = State::Done;
                    return Ok((true, StepResult::Done));
                }

                let changeset = self.sequence.push_changeset();
                changeset.set_soa_from(rr.clone());
                self.state = State::Del;
                Ok((true, StepResult::More))
            }
            State::Del => {
                if rr.record_type() == SOA {
                    // Boundary reached; re-dispatch without consuming.
                    self.state = State::SoaTo;
                    Ok((false, StepResult::More))
                } else {
                    let changeset = self
                        .sequence
                        .last_changeset_mut()
                        .expect("changeset pushed in State::SoaFrom");
                    let mut rrset = crate::rr::RecordSet::new(rr.owner().clone(), rr.record_type());
                    rrset.push_raw(rr.clone());
                    changeset.append(ChangePart::Remove, rrset);
                    Ok((true, StepResult::More))
                }
            }
            State::SoaTo => {
                if rr.record_type() != SOA {
                    return Err(XfrError::Malformed(
                        "expected SOA at end of changeset".into(),
                    ));
                }
                let changeset = self
                    .sequence
                    .last_changeset_mut()
                    .expect("changeset pushed in State::SoaFrom");
                changeset.set_soa_to(rr.clone());
                self.state = State::Add;
                Ok((true, StepResult::More))
            }
            State::Add => {
                if rr.record_type() == SOA {
                    // Boundary reached; re-dispatch without consuming.
                    self.state = State::SoaFrom;
                    Ok((false, StepResult::More))
                } else {
                    let changeset = self
                        .sequence
                        .last_changeset_mut()
                        .expect("changeset pushed in State::SoaFrom");
                    let mut rrset = crate::rr::RecordSet::new(rr.owner().clone(), rr.record_type());
                    rrset.push_raw(rr.clone());
                    changeset.append(ChangePart::Add, rrset);
                    Ok((true, StepResult::More))
                }
            }
            State::Done => Err(XfrError::InvalidArg(
                "step() called after the transfer already reached DONE".into(),
            )),
        }
    }

    /// Processes one answer message's worth of records (spec §4.5
    /// "xfrin_process_ixfr_packet").
    ///
    /// Returns `Ok(true)` if the transfer reached its terminal state during
    /// this message (the caller should call [`finalize`](Self::finalize)
    /// next); `Ok(false)` if more messages are expected.
    pub fn process_message(&mut self, records: &[Record]) -> XfrResult<bool> {
        let mut i = 0;
        while i < records.len() {
            if self.sequence.len() as u32 > self.journal_node_limit {
                warn!(
                    limit = self.journal_node_limit,
                    "IXFR-in journal node limit exceeded, forcing AXFR fallback"
                );
                // Force completion of this message's loop; finalize() will
                // see `state != Done` (unless it happens to already be
                // Done) and signal fallback regardless.
                return Ok(true);
            }

            let rr = &records[i];
            if self.out_of_zone(rr) {
                i += 1;
                continue;
            }

            let (consumed, step) = self.step(rr)?;
            if consumed {
                i += 1;
            }
            if let StepResult::Done = step {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Finalizes the session (spec §4.5 "Finalization").
    ///
    /// If the sequence is empty, or the state machine never reached `DONE`
    /// (including the journal-node-limit forced exit), cleans up and
    /// returns [`IxfrInOutcome::FallbackToAxfr`] without touching the zone.
    /// Otherwise invokes `applier` to atomically apply and persist the
    /// accumulated changesets, consuming `self`.
    pub fn finalize(
        self,
        zone: &mut ZoneContents,
        applier: &dyn ApplyAndStore,
    ) -> XfrResult<IxfrInOutcome> {
        if self.sequence.is_empty() || !self.is_done() {
            info!("IXFR-in incomplete, falling back to AXFR");
            return Ok(IxfrInOutcome::FallbackToAxfr);
        }

        match applier.apply_and_store(self.sequence, zone) {
            crate::apply::ApplyOutcome::Ok => {
                info!("IXFR-in finished");
                Ok(IxfrInOutcome::Applied)
            }
            crate::apply::ApplyOutcome::IoError(message) => Err(XfrError::Io(message)),
            crate::apply::ApplyOutcome::SemanticError(message) => Err(XfrError::Semantic(message)),
        }
    }
}
