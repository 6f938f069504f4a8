use serde::Serialize;
use std::fmt;
use strum_macros::{EnumDiscriminants, EnumIter};

use crate::context::ContentKind;
use crate::types::{AgentId, EntityId, GroupId, Millis, ResourceId, TargetKey};

/// Domain an event kind belongs to; each domain has its own bounded queue
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Combat,
    Cooldown,
    Group,
    Coordination,
    Context,
}

/// Who published an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// An agent acting on its own behalf
    Agent(AgentId),
    /// The world-state ingestion layer
    Ingestion,
    CooldownTracker,
    GroupRegistry,
    ContextResolver,
    ClaimResolver,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Agent(agent) => write!(f, "{}", agent),
            EventSource::Ingestion => write!(f, "ingestion"),
            EventSource::CooldownTracker => write!(f, "cooldown_tracker"),
            EventSource::GroupRegistry => write!(f, "group_registry"),
            EventSource::ContextResolver => write!(f, "context_resolver"),
            EventSource::ClaimResolver => write!(f, "claim_resolver"),
        }
    }
}

/// Payload of an event; the variant determines the event kind
///
/// Events represent facts that already happened. The closed set of variants
/// doubles as the registration key for handlers (see [`EventKind`]).
#[derive(Debug, Clone, PartialEq, Serialize, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash, PartialOrd, Ord, EnumIter, Serialize))]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    // Combat domain
    /// An enemy began a dangerous action that may be interrupted
    HostileActionStarted {
        caster: EntityId,
        action_id: u32,
        ends_at: Millis,
    },
    /// The hostile action completed or was stopped
    HostileActionEnded { caster: EntityId, action_id: u32 },
    /// An ally carries an effect that should be cleansed
    AllyNeedsCleanse { ally: AgentId, effect_id: u32 },
    /// An ally is about to take heavy damage
    AllyNeedsProtection { ally: AgentId, incoming: u32 },

    // Cooldown domain
    ResourceAvailable {
        agent: AgentId,
        resource: ResourceId,
        generation: u64,
    },
    ResourceConsumed {
        agent: AgentId,
        resource: ResourceId,
        ready_at: Millis,
        generation: u64,
    },

    // Group domain
    MemberJoined { group: GroupId, agent: AgentId },
    MemberLeft { group: GroupId, agent: AgentId },

    // Coordination domain
    /// The claimant won arbitration and may act until `expires_at`
    ClaimConfirmed {
        target: TargetKey,
        claimant: AgentId,
        expires_at: Millis,
    },
    /// A pending contender lost arbitration to `holder`
    ClaimRejected {
        target: TargetKey,
        claimant: AgentId,
        holder: AgentId,
    },
    /// The holder reported an outcome and the target is free again
    ClaimReleased {
        target: TargetKey,
        claimant: AgentId,
        success: bool,
    },
    /// The holder gave up; others may try the same opportunity right away
    ClaimFailed { target: TargetKey, claimant: AgentId },
    /// The lease ran out without an outcome report
    ClaimExpired { target: TargetKey, claimant: AgentId },

    // Context domain
    ContentContextChanged {
        group: GroupId,
        kind: ContentKind,
        intensity: f32,
    },
}

impl EventKind {
    /// The domain whose queue carries events of this kind
    pub fn domain(&self) -> Domain {
        match self {
            EventKind::HostileActionStarted
            | EventKind::HostileActionEnded
            | EventKind::AllyNeedsCleanse
            | EventKind::AllyNeedsProtection => Domain::Combat,
            EventKind::ResourceAvailable | EventKind::ResourceConsumed => Domain::Cooldown,
            EventKind::MemberJoined | EventKind::MemberLeft => Domain::Group,
            EventKind::ClaimConfirmed
            | EventKind::ClaimRejected
            | EventKind::ClaimReleased
            | EventKind::ClaimFailed
            | EventKind::ClaimExpired => Domain::Coordination,
            EventKind::ContentContextChanged => Domain::Context,
        }
    }
}

/// An immutable, fire-and-forget event record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub payload: EventPayload,
    pub source: EventSource,
    pub timestamp: Millis,
}

impl Event {
    pub fn new(payload: EventPayload, source: EventSource, timestamp: Millis) -> Self {
        Self {
            payload,
            source,
            timestamp,
        }
    }

    /// The kind of this event, derived from its payload
    pub fn kind(&self) -> EventKind {
        EventKind::from(&self.payload)
    }

    pub fn domain(&self) -> Domain {
        self.kind().domain()
    }

    /// The claim target this event refers to, if it is a coordination event
    pub fn target(&self) -> Option<&TargetKey> {
        match &self.payload {
            EventPayload::ClaimConfirmed { target, .. }
            | EventPayload::ClaimRejected { target, .. }
            | EventPayload::ClaimReleased { target, .. }
            | EventPayload::ClaimFailed { target, .. }
            | EventPayload::ClaimExpired { target, .. } => Some(target),
            _ => None,
        }
    }
}
