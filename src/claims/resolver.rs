use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

use super::{
    errors::ClaimError,
    models::{
        ClaimOutcome, ClaimRecord, ClaimState, ClaimStats, ClaimSweep, Contender, ReleaseResult,
        SubmitOutcome, WithdrawOutcome,
    },
};
use crate::config::ClaimConfig;
use crate::event::{Event, EventBus, EventPayload, EventSource};
use crate::message::{CoordinationMessage, MessageType};
use crate::types::{AgentId, Millis, TargetKey};

enum Phase {
    /// Arbitration window open; contenders are kept best first
    Pending {
        contenders: Vec<Contender>,
        closes_at: Millis,
    },
    Confirmed {
        holder: Contender,
        expires_at: Millis,
    },
}

struct Slot {
    /// Changes on every phase transition so outdated deadlines can be skipped
    epoch: u64,
    phase: Phase,
}

/// Deadline entry: (when, slot epoch, target)
type Deadline = Reverse<(Millis, u64, TargetKey)>;

/// Arbitration state machine for claims
///
/// Each target key moves through `Unclaimed -> Pending -> Confirmed` and back to
/// `Unclaimed` on release or expiry. While pending, every contender is kept so
/// a higher-priority bid can take the lead before anyone commits to acting, and
/// a withdrawal hands the lead to the next-best bid. At most one contender is
/// ever confirmed per target.
pub struct ClaimResolver {
    config: ClaimConfig,
    slots: HashMap<TargetKey, Slot>,
    /// Window closings and lease ends, earliest first
    deadlines: BinaryHeap<Deadline>,
    next_epoch: u64,
    stats: ClaimStats,
}

impl ClaimResolver {
    pub fn new(config: ClaimConfig) -> Self {
        info!(
            arbitration_window_ms = config.arbitration_window_ms,
            max_lease_ms = config.max_lease_ms,
            max_active_claims = config.max_active_claims,
            "Creating claim resolver"
        );

        Self {
            config,
            slots: HashMap::new(),
            deadlines: BinaryHeap::new(),
            next_epoch: 1,
            stats: ClaimStats::default(),
        }
    }

    /// Enter a claim message into arbitration for its target key
    ///
    /// Opens an arbitration window if the target is unclaimed, or joins the
    /// open one. A target that is already confirmed rejects the claim with the
    /// current holder. A confirmed claim whose lease already ran out is expired
    /// on the spot before the new claim is considered.
    pub fn submit_claim(
        &mut self,
        message: &CoordinationMessage,
        now: Millis,
        bus: &EventBus,
    ) -> Result<SubmitOutcome, ClaimError> {
        self.stats.submitted += 1;
        let contender = match contender_from(message) {
            Ok(contender) => contender,
            Err(e) => {
                self.stats.invalid += 1;
                debug!(sender = %message.sender, error = %e, "Rejected invalid claim");
                return Err(e);
            }
        };
        let target = &message.target;

        if self.lease_ran_out(target, now) {
            self.expire(target, now, bus);
        }

        let Some(slot) = self.slots.get_mut(target) else {
            return self.open(target, contender, now);
        };

        match &mut slot.phase {
            Phase::Confirmed { holder, .. } if holder.claimant == contender.claimant => {
                Ok(SubmitOutcome::Held)
            }
            Phase::Confirmed { holder, .. } => {
                self.stats.already_claimed += 1;
                debug!(
                    target_key = %target,
                    claimant = %contender.claimant,
                    holder = %holder.claimant,
                    "Target already claimed"
                );
                Err(ClaimError::AlreadyClaimed {
                    target: target.clone(),
                    holder: holder.claimant,
                })
            }
            Phase::Pending { contenders, .. } => {
                let previous_leader = contenders.first().map(|c| c.claimant);

                // A re-submission replaces the agent's earlier bid
                contenders.retain(|c| c.claimant != contender.claimant);
                let position = contenders.partition_point(|c| c.beats(&contender));
                contenders.insert(position, contender);

                let leader = contenders
                    .first()
                    .map_or(contender.claimant, |c| c.claimant);
                if previous_leader.is_some_and(|previous| previous != leader) {
                    self.stats.preemptions += 1;
                    debug!(
                        target_key = %target,
                        leader = %leader,
                        priority = contender.priority,
                        "Pending claim preempted"
                    );
                }

                if leader == contender.claimant {
                    Ok(SubmitOutcome::Leading)
                } else {
                    Ok(SubmitOutcome::Contending { leader })
                }
            }
        }
    }

    fn open(
        &mut self,
        target: &TargetKey,
        contender: Contender,
        now: Millis,
    ) -> Result<SubmitOutcome, ClaimError> {
        if self.slots.len() >= self.config.max_active_claims {
            warn!(
                target_key = %target,
                limit = self.config.max_active_claims,
                "Claim table full, refusing new target"
            );
            return Err(ClaimError::CapacityExceeded {
                limit: self.config.max_active_claims,
            });
        }

        let epoch = self.bump_epoch();
        let closes_at = now.saturating_add(self.config.arbitration_window_ms);
        self.slots.insert(
            target.clone(),
            Slot {
                epoch,
                phase: Phase::Pending {
                    contenders: vec![contender],
                    closes_at,
                },
            },
        );
        self.deadlines
            .push(Reverse((closes_at, epoch, target.clone())));

        debug!(
            target_key = %target,
            claimant = %contender.claimant,
            priority = contender.priority,
            closes_at = closes_at,
            "Arbitration opened"
        );
        Ok(SubmitOutcome::Leading)
    }

    /// Take back a pending bid before arbitration closes
    ///
    /// A confirmed claim cannot be withdrawn; it ends only by an outcome report
    /// or by lease expiry.
    pub fn withdraw_claim(
        &mut self,
        target: &TargetKey,
        claimant: AgentId,
    ) -> Result<WithdrawOutcome, ClaimError> {
        let Some(slot) = self.slots.get_mut(target) else {
            return Ok(WithdrawOutcome::NotContending);
        };

        let (outcome, emptied) = match &mut slot.phase {
            Phase::Confirmed { holder, .. } if holder.claimant == claimant => {
                return Err(ClaimError::NotWithdrawable {
                    target: target.clone(),
                });
            }
            Phase::Confirmed { .. } => return Ok(WithdrawOutcome::NotContending),
            Phase::Pending { contenders, .. } => {
                let before = contenders.len();
                contenders.retain(|c| c.claimant != claimant);
                if contenders.len() == before {
                    return Ok(WithdrawOutcome::NotContending);
                }
                let leader = contenders.first().map(|c| c.claimant);
                (WithdrawOutcome::Withdrawn { leader }, leader.is_none())
            }
        };

        self.stats.withdrawn += 1;
        if emptied {
            self.slots.remove(target);
        }
        debug!(
            target_key = %target,
            claimant = %claimant,
            outcome = ?outcome,
            "Pending claim withdrawn"
        );
        Ok(outcome)
    }

    /// Record the holder's outcome and free the target
    ///
    /// Only the confirmed holder can release a claim. Anything else, including
    /// a repeat report, is a no-op.
    pub fn report_outcome(
        &mut self,
        target: &TargetKey,
        claimant: AgentId,
        outcome: ClaimOutcome,
        now: Millis,
        bus: &EventBus,
    ) -> ReleaseResult {
        if self.holder(target) != Some(claimant) {
            debug!(
                target_key = %target,
                claimant = %claimant,
                outcome = ?outcome,
                "Outcome report for claim not held, ignoring"
            );
            return ReleaseResult::NoOp;
        }
        let Some(Slot {
            phase: Phase::Confirmed { holder, expires_at },
            ..
        }) = self.slots.remove(target)
        else {
            return ReleaseResult::NoOp;
        };

        let success = outcome.is_success();
        self.stats.released += 1;
        info!(
            target_key = %target,
            claimant = %claimant,
            success = success,
            "Claim released"
        );
        bus.publish(Event::new(
            EventPayload::ClaimReleased {
                target: target.clone(),
                claimant,
                success,
            },
            EventSource::ClaimResolver,
            now,
        ));
        if !success {
            self.stats.failed += 1;
            bus.publish(Event::new(
                EventPayload::ClaimFailed {
                    target: target.clone(),
                    claimant,
                },
                EventSource::ClaimResolver,
                now,
            ));
        }

        ReleaseResult::Released(confirmed_record(
            target,
            &holder,
            expires_at,
            ClaimState::Released,
        ))
    }

    /// Close due arbitration windows and expire ran-out leases
    pub fn update(&mut self, now: Millis, bus: &EventBus) -> ClaimSweep {
        let mut sweep = ClaimSweep::default();

        while self
            .deadlines
            .peek()
            .is_some_and(|Reverse((deadline, _, _))| *deadline <= now)
        {
            let Some(Reverse((_, epoch, target))) = self.deadlines.pop() else {
                break;
            };
            let pending = match self.slots.get(&target) {
                Some(slot) if slot.epoch == epoch => matches!(slot.phase, Phase::Pending { .. }),
                // Superseded by a later transition
                _ => continue,
            };

            if pending {
                self.confirm(&target, now, bus, &mut sweep);
            } else if let Some(record) = self.expire(&target, now, bus) {
                sweep.expired.push(record);
            }
        }

        if !sweep.is_empty() {
            debug!(
                now = now,
                confirmed = sweep.confirmed.len(),
                expired = sweep.expired.len(),
                rejected = sweep.rejected,
                "Claim sweep"
            );
        }
        sweep
    }

    fn confirm(&mut self, target: &TargetKey, now: Millis, bus: &EventBus, sweep: &mut ClaimSweep) {
        let epoch = self.bump_epoch();
        let max_lease = self.config.max_lease_ms;
        let Some(slot) = self.slots.get_mut(target) else {
            return;
        };
        let Phase::Pending { contenders, .. } = &mut slot.phase else {
            return;
        };
        let mut contenders = std::mem::take(contenders).into_iter();
        let Some(winner) = contenders.next() else {
            self.slots.remove(target);
            return;
        };

        let expires_at = winner
            .claimed_at
            .saturating_add(winner.lease_ms.min(max_lease))
            .max(now.saturating_add(1));
        slot.epoch = epoch;
        slot.phase = Phase::Confirmed {
            holder: winner,
            expires_at,
        };
        self.deadlines
            .push(Reverse((expires_at, epoch, target.clone())));

        let losers: Vec<Contender> = contenders.collect();
        self.stats.confirmed += 1;
        self.stats.rejected_contenders += losers.len() as u64;

        info!(
            target_key = %target,
            claimant = %winner.claimant,
            priority = winner.priority,
            expires_at = expires_at,
            losers = losers.len(),
            "Claim confirmed"
        );
        bus.publish(Event::new(
            EventPayload::ClaimConfirmed {
                target: target.clone(),
                claimant: winner.claimant,
                expires_at,
            },
            EventSource::ClaimResolver,
            now,
        ));
        for loser in &losers {
            bus.publish(Event::new(
                EventPayload::ClaimRejected {
                    target: target.clone(),
                    claimant: loser.claimant,
                    holder: winner.claimant,
                },
                EventSource::ClaimResolver,
                now,
            ));
        }

        sweep.rejected += losers.len();
        sweep.confirmed.push(confirmed_record(
            target,
            &winner,
            expires_at,
            ClaimState::Confirmed,
        ));
    }

    fn lease_ran_out(&self, target: &TargetKey, now: Millis) -> bool {
        matches!(
            self.slots.get(target),
            Some(Slot { phase: Phase::Confirmed { expires_at, .. }, .. }) if *expires_at <= now
        )
    }

    fn expire(&mut self, target: &TargetKey, now: Millis, bus: &EventBus) -> Option<ClaimRecord> {
        if !matches!(
            self.slots.get(target),
            Some(Slot {
                phase: Phase::Confirmed { .. },
                ..
            })
        ) {
            return None;
        }
        let Slot {
            phase: Phase::Confirmed { holder, expires_at },
            ..
        } = self.slots.remove(target)?
        else {
            return None;
        };

        self.stats.expired += 1;
        warn!(
            target_key = %target,
            claimant = %holder.claimant,
            expires_at = expires_at,
            now = now,
            "Claim lease expired without outcome report"
        );
        bus.publish(Event::new(
            EventPayload::ClaimExpired {
                target: target.clone(),
                claimant: holder.claimant,
            },
            EventSource::ClaimResolver,
            now,
        ));

        Some(confirmed_record(target, &holder, expires_at, ClaimState::Expired))
    }

    fn bump_epoch(&mut self) -> u64 {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        epoch
    }

    pub fn get_claim_state(&self, target: &TargetKey) -> ClaimState {
        match self.slots.get(target).map(|slot| &slot.phase) {
            None => ClaimState::Unclaimed,
            Some(Phase::Pending { .. }) => ClaimState::Pending,
            Some(Phase::Confirmed { .. }) => ClaimState::Confirmed,
        }
    }

    /// Confirmed holder of a target, if any
    pub fn holder(&self, target: &TargetKey) -> Option<AgentId> {
        match self.slots.get(target).map(|slot| &slot.phase) {
            Some(Phase::Confirmed { holder, .. }) => Some(holder.claimant),
            _ => None,
        }
    }

    pub fn claim(&self, target: &TargetKey) -> Option<ClaimRecord> {
        self.slots.get(target).and_then(|slot| snapshot(target, slot))
    }

    /// Every pending and confirmed record, ordered by target key
    pub fn active_claims(&self) -> Vec<ClaimRecord> {
        let mut records: Vec<ClaimRecord> = self
            .slots
            .iter()
            .filter_map(|(target, slot)| snapshot(target, slot))
            .collect();
        records.sort_by(|a, b| a.target.cmp(&b.target));
        records
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> ClaimStats {
        let mut stats = self.stats.clone();
        for slot in self.slots.values() {
            match slot.phase {
                Phase::Pending { .. } => stats.pending_records += 1,
                Phase::Confirmed { .. } => stats.confirmed_records += 1,
            }
        }
        stats
    }
}

impl Default for ClaimResolver {
    fn default() -> Self {
        Self::new(ClaimConfig::default())
    }
}

fn contender_from(message: &CoordinationMessage) -> Result<Contender, ClaimError> {
    if message.message_type != MessageType::Claim {
        return Err(ClaimError::invalid(format!(
            "expected a claim message, got {:?}",
            message.message_type
        )));
    }
    let lease_ms = message
        .lease_ms()
        .ok_or_else(|| ClaimError::invalid("claim message carries no lease"))?;
    if lease_ms == 0 {
        return Err(ClaimError::invalid("lease must be greater than zero"));
    }

    Ok(Contender {
        claimant: message.sender,
        priority: message.priority,
        claimed_at: message.created_at,
        lease_ms,
    })
}

fn confirmed_record(
    target: &TargetKey,
    holder: &Contender,
    expires_at: Millis,
    state: ClaimState,
) -> ClaimRecord {
    ClaimRecord {
        target: target.clone(),
        claimant: holder.claimant,
        priority: holder.priority,
        claimed_at: holder.claimed_at,
        expires_at,
        state,
        contenders: 1,
    }
}

fn snapshot(target: &TargetKey, slot: &Slot) -> Option<ClaimRecord> {
    match &slot.phase {
        Phase::Pending {
            contenders,
            closes_at,
        } => contenders.first().map(|leader| ClaimRecord {
            target: target.clone(),
            claimant: leader.claimant,
            priority: leader.priority,
            claimed_at: leader.claimed_at,
            expires_at: *closes_at,
            state: ClaimState::Pending,
            contenders: contenders.len(),
        }),
        Phase::Confirmed { holder, expires_at } => Some(confirmed_record(
            target,
            holder,
            *expires_at,
            ClaimState::Confirmed,
        )),
    }
}
