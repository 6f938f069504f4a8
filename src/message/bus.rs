use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    errors::MessageError,
    models::{CoordinationMessage, MessageBusStats, MessageId, MessageType, ScopeKey},
    scope::resolve_recipients,
};
use crate::config::MessageBusConfig;
use crate::group::GroupRegistry;
use crate::types::{AgentId, Millis};

/// Handle to an agent's inbox, returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InboxId(Uuid);

impl fmt::Display for InboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inbox-{}", self.0)
    }
}

struct Inbox {
    agent: AgentId,
    /// Accepted message types; empty accepts everything
    types: Vec<MessageType>,
    messages: Vec<Arc<CoordinationMessage>>,
}

impl Inbox {
    fn accepts(&self, message_type: MessageType) -> bool {
        self.types.is_empty() || self.types.contains(&message_type)
    }
}

/// A published message waiting for delivery, with recipients frozen at publish time
struct Envelope {
    message: Arc<CoordinationMessage>,
    recipients: Vec<AgentId>,
}

/// Result of one delivery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Messages taken off the queues this tick
    pub messages: usize,
    /// Copies placed into inboxes
    pub deliveries: usize,
    pub deferred: usize,
    pub expired: usize,
    pub undeliverable: usize,
    /// Oldest undrained messages pushed out of full inboxes
    pub overflowed: usize,
}

/// Scoped fan-out of coordination messages with per-scope budgets
///
/// Messages are queued per scope bucket and delivered once per tick in
/// priority-then-age order. A bucket that exceeds its budget carries the
/// surplus over to the next tick; a carried-over message that cannot survive
/// until then is dropped and counted instead.
pub struct MessageBus {
    config: MessageBusConfig,
    next_id: u64,
    queues: BTreeMap<ScopeKey, Vec<Envelope>>,
    inboxes: HashMap<InboxId, Inbox>,
    agent_inboxes: HashMap<AgentId, Vec<InboxId>>,
    stats: MessageBusStats,
}

impl MessageBus {
    pub fn new(config: MessageBusConfig) -> Self {
        info!(
            per_scope_budget = config.per_scope_budget,
            tick_interval_ms = config.tick_interval_ms,
            max_inbox_len = config.max_inbox_len,
            "Creating message bus"
        );

        Self {
            config,
            next_id: 1,
            queues: BTreeMap::new(),
            inboxes: HashMap::new(),
            agent_inboxes: HashMap::new(),
            stats: MessageBusStats::default(),
        }
    }

    /// Check a message without enqueueing it, returning its bucket and recipients
    pub fn validate(
        &self,
        message: &CoordinationMessage,
        groups: &GroupRegistry,
    ) -> Result<(ScopeKey, Vec<AgentId>), MessageError> {
        if message.ttl == 0 {
            return Err(MessageError::invalid("ttl must be greater than zero"));
        }
        resolve_recipients(groups, message.sender, message.scope)
    }

    /// Validate, stamp and enqueue a message for delivery on the next tick
    pub fn publish(
        &mut self,
        mut message: CoordinationMessage,
        groups: &GroupRegistry,
    ) -> Result<MessageId, MessageError> {
        let (key, recipients) = match self.validate(&message, groups) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.stats.rejected += 1;
                debug!(sender = %message.sender, error = %e, "Rejected coordination message");
                return Err(e);
            }
        };

        let id = MessageId(self.next_id);
        self.next_id += 1;
        message.message_id = id;

        debug!(
            message_id = %id,
            message_type = ?message.message_type,
            sender = %message.sender,
            scope = %key,
            target_key = %message.target,
            recipients = recipients.len(),
            "Message queued"
        );

        self.queues.entry(key).or_default().push(Envelope {
            message: Arc::new(message),
            recipients,
        });
        self.stats.published += 1;

        Ok(id)
    }

    /// Open an inbox for an agent; an empty type list accepts every type
    pub fn subscribe(&mut self, agent: AgentId, types: &[MessageType]) -> InboxId {
        let id = InboxId(Uuid::new_v4());
        self.inboxes.insert(
            id,
            Inbox {
                agent,
                types: types.to_vec(),
                messages: Vec::new(),
            },
        );
        self.agent_inboxes.entry(agent).or_default().push(id);
        debug!(agent = %agent, inbox = %id, types = ?types, "Inbox opened");
        id
    }

    pub fn unsubscribe(&mut self, id: InboxId) -> bool {
        let Some(inbox) = self.inboxes.remove(&id) else {
            return false;
        };

        if let Some(ids) = self.agent_inboxes.get_mut(&inbox.agent) {
            ids.retain(|existing| *existing != id);
            if ids.is_empty() {
                self.agent_inboxes.remove(&inbox.agent);
            }
        }
        debug!(agent = %inbox.agent, inbox = %id, "Inbox closed");
        true
    }

    /// Take everything delivered to an inbox so far
    ///
    /// Within one delivery batch messages come priority first, then oldest,
    /// then by message id; earlier batches come before later ones.
    pub fn drain_inbox(&mut self, id: InboxId) -> Vec<Arc<CoordinationMessage>> {
        match self.inboxes.get_mut(&id) {
            Some(inbox) => std::mem::take(&mut inbox.messages),
            None => {
                debug!(inbox = %id, "Drain requested for unknown inbox");
                Vec::new()
            }
        }
    }

    pub fn inbox_len(&self, id: InboxId) -> usize {
        self.inboxes.get(&id).map_or(0, |inbox| inbox.messages.len())
    }

    /// Run one delivery pass
    pub fn deliver(&mut self, now: Millis) -> DeliveryReport {
        let budget = self.config.per_scope_budget.max(1);
        let inbox_cap = self.config.max_inbox_len.max(1);
        let next_tick = now.saturating_add(self.config.tick_interval_ms);
        let mut report = DeliveryReport::default();
        // Inbox length before this batch, so only the new tail is re-ordered
        let mut batch_starts: HashMap<InboxId, usize> = HashMap::new();

        let Self {
            queues,
            inboxes,
            agent_inboxes,
            ..
        } = self;

        for (key, queue) in queues.iter_mut() {
            queue.retain(|envelope| {
                let alive = envelope.message.expires_at() > now;
                if !alive {
                    report.expired += 1;
                    warn!(
                        scope = %key,
                        message_id = %envelope.message.message_id,
                        sender = %envelope.message.sender,
                        created_at = envelope.message.created_at,
                        ttl = envelope.message.ttl,
                        "Message expired before delivery"
                    );
                }
                alive
            });

            queue.sort_by(|a, b| a.message.delivery_order(&b.message));
            let take = budget.min(queue.len());
            let selected: Vec<Envelope> = queue.drain(..take).collect();

            queue.retain(|envelope| {
                let survives = envelope.message.expires_at() > next_tick;
                if survives {
                    report.deferred += 1;
                } else {
                    report.expired += 1;
                    warn!(
                        scope = %key,
                        message_id = %envelope.message.message_id,
                        priority = envelope.message.priority,
                        "Scope budget exceeded and message would expire before next tick, dropping"
                    );
                }
                survives
            });

            if !queue.is_empty() {
                debug!(
                    scope = %key,
                    deferred = queue.len(),
                    budget = budget,
                    "Scope budget exceeded, deferring to next tick"
                );
            }

            for envelope in selected {
                report.messages += 1;
                for recipient in &envelope.recipients {
                    let accepted = deliver_to(
                        inboxes,
                        agent_inboxes,
                        &mut batch_starts,
                        *recipient,
                        &envelope.message,
                    );
                    match accepted {
                        Some(copies) => report.deliveries += copies,
                        None => {
                            report.undeliverable += 1;
                            debug!(
                                recipient = %recipient,
                                message_id = %envelope.message.message_id,
                                "Recipient has no inbox, message not delivered"
                            );
                        }
                    }
                }
            }
        }

        queues.retain(|_, queue| !queue.is_empty());

        for (id, start) in batch_starts {
            let Some(inbox) = inboxes.get_mut(&id) else {
                continue;
            };
            inbox.messages[start..].sort_by(|a, b| a.delivery_order(b));

            if inbox.messages.len() > inbox_cap {
                let overflow = inbox.messages.len() - inbox_cap;
                inbox.messages.drain(..overflow);
                report.overflowed += overflow;
                warn!(
                    agent = %inbox.agent,
                    inbox = %id,
                    dropped = overflow,
                    limit = inbox_cap,
                    "Inbox full, dropped oldest undrained messages"
                );
            }
        }

        self.stats.deliveries += report.deliveries as u64;
        self.stats.deferred += report.deferred as u64;
        self.stats.expired += report.expired as u64;
        self.stats.undeliverable += report.undeliverable as u64;
        self.stats.inbox_overflow += report.overflowed as u64;

        report
    }

    /// Messages still queued for delivery
    pub fn pending(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> MessageBusStats {
        self.stats.clone()
    }
}

/// Place a message in every matching inbox of the recipient
///
/// Returns the number of copies delivered, or None if the recipient has no inbox.
fn deliver_to(
    inboxes: &mut HashMap<InboxId, Inbox>,
    agent_inboxes: &HashMap<AgentId, Vec<InboxId>>,
    batch_starts: &mut HashMap<InboxId, usize>,
    recipient: AgentId,
    message: &Arc<CoordinationMessage>,
) -> Option<usize> {
    let ids = agent_inboxes.get(&recipient)?;
    let mut copies = 0;

    for id in ids {
        let Some(inbox) = inboxes.get_mut(id) else {
            continue;
        };
        if !inbox.accepts(message.message_type) {
            continue;
        }
        batch_starts.entry(*id).or_insert(inbox.messages.len());
        inbox.messages.push(Arc::clone(message));
        copies += 1;
    }

    Some(copies)
}
