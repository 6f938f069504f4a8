use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use super::{
    events::{Domain, Event, EventKind},
    handler::{EventHandler, SubscriptionId},
    history::EventHistory,
};
use crate::config::EventBusConfig;

/// Counters exposed through the diagnostics dump
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventBusStats {
    pub published: u64,
    pub delivered: u64,
    pub handler_failures: u64,
    /// Events dropped because a domain queue overflowed, per domain
    pub dropped: BTreeMap<Domain, u64>,
}

impl EventBusStats {
    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }
}

enum PendingChange {
    Subscribe(SubscriptionId, EventKind, EventHandler),
    Unsubscribe(SubscriptionId),
}

struct BusInner {
    config: EventBusConfig,
    /// Events tagged with their publish sequence so a batch replays in publish order
    queues: BTreeMap<Domain, VecDeque<(u64, Event)>>,
    next_sequence: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    dispatching: bool,
    pending_changes: Vec<PendingChange>,
    history: EventHistory,
    stats: EventBusStats,
}

impl BusInner {
    fn apply(&mut self, change: PendingChange) {
        match change {
            PendingChange::Subscribe(id, kind, handler) => {
                self.handlers.entry(kind).or_default().push((id, handler));
            }
            PendingChange::Unsubscribe(id) => {
                for subscribers in self.handlers.values_mut() {
                    subscribers.retain(|(existing, _)| *existing != id);
                }
                self.handlers.retain(|_, subscribers| !subscribers.is_empty());
            }
        }
    }
}

/// Typed publish/subscribe fan-out, batched per processing tick
///
/// The bus is a cheap handle around shared state, so handlers may hold a
/// clone and publish or (un)subscribe from inside a handler invocation.
/// Such subscription changes take effect at the end of the running batch,
/// and events published during a batch are delivered with the next one.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let history = EventHistory::new(config.history_capacity);
        let queues = Domain::iter().map(|domain| (domain, VecDeque::new())).collect();

        Self {
            inner: Arc::new(Mutex::new(BusInner {
                config,
                queues,
                next_sequence: 0,
                handlers: HashMap::new(),
                dispatching: false,
                pending_changes: Vec::new(),
                history,
                stats: EventBusStats::default(),
            })),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(EventBusConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        // Handlers never run under the lock, but recover anyway
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue an event for every subscriber of its kind
    ///
    /// Never blocks on delivery and never fails; when the domain queue is over
    /// its bound the oldest queued event is dropped and counted.
    pub fn publish(&self, event: Event) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let domain = event.domain();
        let limit = inner.config.max_batch_per_domain;
        inner.stats.published += 1;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let queue = inner.queues.entry(domain).or_default();
        queue.push_back((sequence, event));

        if queue.len() > limit {
            let overflow = queue.len() - limit;
            let dropped: Vec<(u64, Event)> = queue.drain(..overflow).collect();
            *inner.stats.dropped.entry(domain).or_default() += overflow as u64;

            for (_, event) in dropped {
                warn!(
                    domain = ?domain,
                    kind = ?event.kind(),
                    source = %event.source,
                    timestamp = event.timestamp,
                    limit = limit,
                    "Event queue overflow, dropped oldest event"
                );
            }
        }
    }

    /// Register a handler for one event kind
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut inner = self.lock();

        if inner.dispatching {
            debug!(subscription = %id, kind = ?kind, "Deferring subscribe until end of batch");
            inner
                .pending_changes
                .push(PendingChange::Subscribe(id, kind, handler));
        } else {
            inner.apply(PendingChange::Subscribe(id, kind, handler));
        }

        id
    }

    /// Remove a handler; unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.lock();

        if inner.dispatching {
            debug!(subscription = %id, "Deferring unsubscribe until end of batch");
            inner.pending_changes.push(PendingChange::Unsubscribe(id));
        } else {
            inner.apply(PendingChange::Unsubscribe(id));
        }
    }

    /// Deliver every queued event to its subscribers, returning the number of events delivered
    ///
    /// The batch is delivered in publish order across all domains. Handler
    /// failures and panics are logged with the event and do not stop the
    /// batch. A nested call from inside a handler is a no-op.
    pub fn dispatch(&self) -> usize {
        let (batch, handlers) = {
            let mut inner = self.lock();
            if inner.dispatching {
                debug!("Nested dispatch ignored");
                return 0;
            }
            inner.dispatching = true;

            let mut tagged: Vec<(u64, Event)> = Vec::new();
            for queue in inner.queues.values_mut() {
                tagged.extend(queue.drain(..));
            }
            tagged.sort_unstable_by_key(|(sequence, _)| *sequence);
            let batch: Vec<Event> = tagged.into_iter().map(|(_, event)| event).collect();
            (batch, inner.handlers.clone())
        };

        let mut failures = 0u64;
        for event in &batch {
            let Some(subscribers) = handlers.get(&event.kind()) else {
                continue;
            };

            for (subscription, handler) in subscribers {
                match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        failures += 1;
                        warn!(
                            subscription = %subscription,
                            kind = ?event.kind(),
                            source = %event.source,
                            event = ?event,
                            error = %e,
                            "Event handler failed"
                        );
                    }
                    Err(_) => {
                        failures += 1;
                        warn!(
                            subscription = %subscription,
                            kind = ?event.kind(),
                            source = %event.source,
                            event = ?event,
                            "Event handler panicked"
                        );
                    }
                }
            }
        }

        let mut inner = self.lock();
        inner.dispatching = false;
        let changes: Vec<PendingChange> = inner.pending_changes.drain(..).collect();
        for change in changes {
            inner.apply(change);
        }
        for event in &batch {
            inner.history.record(event);
        }
        inner.stats.delivered += batch.len() as u64;
        inner.stats.handler_failures += failures;

        if !batch.is_empty() {
            debug!(
                delivered = batch.len(),
                failures = failures,
                "Event batch dispatched"
            );
        }

        batch.len()
    }

    /// Number of events waiting for the next dispatch
    pub fn pending(&self) -> usize {
        self.lock().queues.values().map(VecDeque::len).sum()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().handlers.get(&kind).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> EventBusStats {
        self.lock().stats.clone()
    }

    /// The most recently delivered events, oldest first
    pub fn recent_history(&self, limit: usize) -> Vec<Event> {
        self.lock().history.recent(limit)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_config()
    }
}
