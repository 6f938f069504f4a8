use thiserror::Error;

use crate::types::{AgentId, TargetKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// Expected control flow for a losing claimant; pick a fallback
    #[error("{target} is already claimed by {holder}")]
    AlreadyClaimed { target: TargetKey, holder: AgentId },

    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error("Confirmed claim on {target} ends only by outcome report or expiry")]
    NotWithdrawable { target: TargetKey },

    #[error("Claim table is full ({limit} records)")]
    CapacityExceeded { limit: usize },
}

impl ClaimError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ClaimError::InvalidClaim(reason.into())
    }

    /// The current holder, if this is an `AlreadyClaimed` rejection
    pub fn holder(&self) -> Option<AgentId> {
        match self {
            ClaimError::AlreadyClaimed { holder, .. } => Some(*holder),
            _ => None,
        }
    }
}
