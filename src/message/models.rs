use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;

use crate::types::{ActionCategory, AgentId, GroupId, Millis, Role, TargetKey};

/// Default time-to-live for coordination messages
pub const DEFAULT_MESSAGE_TTL_MS: Millis = 1_000;

/// Bus-assigned message identifier, increasing in publish order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Placeholder carried by a message until the bus stamps it
    pub const UNASSIGNED: MessageId = MessageId(0);
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Claim,
    Announce,
    Request,
    Directive,
}

/// Recipient set of a message, expanded at publish time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Everyone in the sender's group
    Group,
    /// Members of the sender's group tagged with the role
    Role(Role),
    /// A single recipient
    Direct(AgentId),
}

/// Rate-limiting bucket a message is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScopeKey {
    Group(GroupId),
    Role(GroupId, Role),
    Direct(AgentId),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Group(group) => write!(f, "{}", group),
            ScopeKey::Role(group, role) => write!(f, "{}/{}", group, role),
            ScopeKey::Direct(agent) => write!(f, "direct/{}", agent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Announcement {
    ActionStarted,
    ActionCompleted,
    ActionAbandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Intent to act; the lease bounds how long a confirmed claim stays valid
    Claim { lease_ms: Millis },
    Announce(Announcement),
    Request { action: ActionCategory },
    Directive {
        action: ActionCategory,
        assignee: AgentId,
    },
    Data(serde_json::Value),
    Empty,
}

/// A scoped coordination message between agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMessage {
    pub message_id: MessageId,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub scope: Scope,
    pub sender: AgentId,
    /// What the message is about; claims on the same key collide
    pub target: TargetKey,
    pub priority: u32,
    pub payload: MessagePayload,
    pub created_at: Millis,
    pub ttl: Millis,
}

impl CoordinationMessage {
    pub fn new(
        message_type: MessageType,
        sender: AgentId,
        target: TargetKey,
        payload: MessagePayload,
        created_at: Millis,
    ) -> Self {
        Self {
            message_id: MessageId::UNASSIGNED,
            message_type,
            scope: Scope::Group,
            sender,
            target,
            priority: 0,
            payload,
            created_at,
            ttl: DEFAULT_MESSAGE_TTL_MS,
        }
    }

    /// A claim on `target` holding for `lease_ms` once confirmed
    pub fn claim(
        sender: AgentId,
        target: TargetKey,
        priority: u32,
        lease_ms: Millis,
        created_at: Millis,
    ) -> Self {
        Self::new(
            MessageType::Claim,
            sender,
            target,
            MessagePayload::Claim { lease_ms },
            created_at,
        )
        .with_priority(priority)
    }

    pub fn announce(
        sender: AgentId,
        target: TargetKey,
        announcement: Announcement,
        created_at: Millis,
    ) -> Self {
        Self::new(
            MessageType::Announce,
            sender,
            target,
            MessagePayload::Announce(announcement),
            created_at,
        )
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ttl(mut self, ttl: Millis) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn expires_at(&self) -> Millis {
        self.created_at.saturating_add(self.ttl)
    }

    /// Requested lease, if this is a claim
    pub fn lease_ms(&self) -> Option<Millis> {
        match self.payload {
            MessagePayload::Claim { lease_ms } => Some(lease_ms),
            _ => None,
        }
    }

    /// Delivery order: higher priority first, then older, then lower id
    pub fn delivery_order(&self, other: &Self) -> Ordering {
        (Reverse(self.priority), self.created_at, self.message_id).cmp(&(
            Reverse(other.priority),
            other.created_at,
            other.message_id,
        ))
    }
}

/// Counters exposed through the diagnostics dump
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageBusStats {
    pub published: u64,
    pub rejected: u64,
    /// Message copies placed into inboxes
    pub deliveries: u64,
    /// Times a message was carried over to the next tick by the per-scope budget
    pub deferred: u64,
    /// Messages dropped because their TTL ran out before delivery
    pub expired: u64,
    /// Recipients that had no inbox at delivery time
    pub undeliverable: u64,
    /// Undrained messages pushed out of a full inbox
    pub inbox_overflow: u64,
}
