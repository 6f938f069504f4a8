use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

use crate::types::{AgentId, Millis, TargetKey};

/// Lifecycle of a target key
///
/// `Unclaimed` means no record exists. `Released` and `Expired` only appear on
/// records handed back by the resolver after they left the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Unclaimed,
    Pending,
    Confirmed,
    Released,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Success,
    Failure,
}

impl ClaimOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClaimOutcome::Success)
    }
}

/// One agent's bid for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Contender {
    pub claimant: AgentId,
    pub priority: u32,
    pub claimed_at: Millis,
    pub lease_ms: Millis,
}

impl Contender {
    /// Arbitration order: higher priority, then earlier claim, then lower claimant id
    pub fn arbitration_order(&self, other: &Self) -> Ordering {
        (Reverse(self.priority), self.claimed_at, self.claimant).cmp(&(
            Reverse(other.priority),
            other.claimed_at,
            other.claimant,
        ))
    }

    /// True if this bid would win arbitration against `other`
    pub fn beats(&self, other: &Self) -> bool {
        self.arbitration_order(other) == Ordering::Less
    }
}

/// Snapshot of a claim record
///
/// While pending, `claimant` is the current leader and `expires_at` is when the
/// arbitration window closes. Once confirmed, `expires_at` is the lease end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimRecord {
    pub target: TargetKey,
    pub claimant: AgentId,
    pub priority: u32,
    pub claimed_at: Millis,
    pub expires_at: Millis,
    pub state: ClaimState,
    /// Contenders still in the running, leader included
    pub contenders: usize,
}

/// Synchronous answer to a claim submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The submitter currently leads arbitration
    Leading,
    /// Arbitration is open and someone else leads for now
    Contending { leader: AgentId },
    /// The submitter already holds the confirmed claim
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WithdrawOutcome {
    /// The bid was removed; `leader` is who leads now, if anyone
    Withdrawn { leader: Option<AgentId> },
    /// The agent had no pending bid on the target
    NotContending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseResult {
    /// The confirmed claim was destroyed; the record is returned in `Released` state
    Released(ClaimRecord),
    /// Nothing held by this claimant; repeated reports land here
    NoOp,
}

/// What one resolver sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClaimSweep {
    pub confirmed: Vec<ClaimRecord>,
    pub expired: Vec<ClaimRecord>,
    /// Losing contenders notified with `ClaimRejected`
    pub rejected: usize,
}

impl ClaimSweep {
    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.expired.is_empty()
    }
}

/// Counters exposed through the diagnostics dump
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClaimStats {
    pub submitted: u64,
    /// Submissions turned away because the target was already confirmed
    pub already_claimed: u64,
    pub invalid: u64,
    /// Times a new bid took the lead from another contender
    pub preemptions: u64,
    pub confirmed: u64,
    pub rejected_contenders: u64,
    pub withdrawn: u64,
    pub released: u64,
    pub failed: u64,
    pub expired: u64,
    pub pending_records: usize,
    pub confirmed_records: usize,
}
