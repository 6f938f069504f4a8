use serde::{Deserialize, Serialize};

use crate::types::{AgentId, Millis, ResourceId};

/// Availability of one resource for one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource: ResourceId,
    pub available: bool,
    pub ready_at: Millis,
    /// Bumped on every accepted mutation; cached reads compare against it
    pub generation: u64,
}

/// Raw ability-state notification from the ingestion layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStateChange {
    pub agent: AgentId,
    pub resource: ResourceId,
    pub available: bool,
    pub ready_at: Millis,
    /// Sequence number the source attached to this notification
    pub generation: u64,
}

impl RawStateChange {
    pub fn consumed(agent: AgentId, resource: ResourceId, ready_at: Millis, generation: u64) -> Self {
        Self {
            agent,
            resource,
            available: false,
            ready_at,
            generation,
        }
    }

    pub fn available(agent: AgentId, resource: ResourceId, generation: u64) -> Self {
        Self {
            agent,
            resource,
            available: true,
            ready_at: 0,
            generation,
        }
    }
}

/// What happened to a raw notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The state was updated; `availability_changed` tells whether an event was published
    Applied { availability_changed: bool },
    /// Out-of-order notification, discarded
    Stale,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CooldownStats {
    pub applied: u64,
    pub stale_discarded: u64,
    pub promoted_by_sweep: u64,
    pub tracked_resources: usize,
}
