use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, trace};

use super::models::{CooldownStats, RawStateChange, ResourceState, UpdateOutcome};
use crate::event::{Event, EventBus, EventPayload, EventSource};
use crate::types::{AgentId, Millis, ResourceId};

/// Pending readiness entry: (ready_at, agent, resource, generation when scheduled)
type ReadyEntry = Reverse<(Millis, AgentId, ResourceId, u64)>;

/// Owns the Resource State table and republishes availability changes
///
/// Only this tracker mutates resource state; everything else reads it.
pub struct CooldownTracker {
    states: HashMap<AgentId, HashMap<ResourceId, ResourceState>>,
    /// Unavailable resources ordered by when they become ready; stale entries are skipped lazily
    ready_queue: BinaryHeap<ReadyEntry>,
    stats: CooldownStats,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            ready_queue: BinaryHeap::new(),
            stats: CooldownStats::default(),
        }
    }

    /// Apply a raw notification, publishing an availability event if the state flipped
    ///
    /// A notification is accepted when it is the first one seen for the resource,
    /// when its generation is the next expected one, or when it moves the resource
    /// to unavailable with a later ready time. Anything else is stale.
    pub fn on_raw_state_change(
        &mut self,
        change: RawStateChange,
        now: Millis,
        bus: &EventBus,
    ) -> UpdateOutcome {
        let resources = self.states.entry(change.agent).or_default();
        let previous = resources.get(&change.resource).copied();

        let generation = match previous {
            None => change.generation,
            Some(current) => {
                // Generations wrap for sources that start near u64::MAX
                let is_next = change.generation == current.generation.wrapping_add(1);
                let later_consume = !change.available && change.ready_at > current.ready_at;

                if !is_next && !later_consume {
                    debug!(
                        agent = %change.agent,
                        resource = %change.resource,
                        claimed_generation = change.generation,
                        current_generation = current.generation,
                        "Discarding stale cooldown update"
                    );
                    self.stats.stale_discarded += 1;
                    return UpdateOutcome::Stale;
                }

                current.generation.wrapping_add(1).max(change.generation)
            }
        };

        let state = ResourceState {
            resource: change.resource,
            available: change.available,
            ready_at: change.ready_at,
            generation,
        };
        resources.insert(change.resource, state);
        self.stats.applied += 1;

        if !state.available {
            self.ready_queue.push(Reverse((
                state.ready_at,
                change.agent,
                change.resource,
                generation,
            )));
        }

        let availability_changed = previous.map_or(true, |p| p.available != state.available);
        if availability_changed {
            publish_availability(bus, change.agent, &state, now);
        }

        trace!(
            agent = %change.agent,
            resource = %change.resource,
            available = state.available,
            generation = generation,
            "Cooldown state updated"
        );

        UpdateOutcome::Applied {
            availability_changed,
        }
    }

    /// Promote resources whose ready time passed without a notification
    ///
    /// Returns how many resources became available.
    pub fn update(&mut self, now: Millis, bus: &EventBus) -> usize {
        let mut promoted = 0;

        while let Some(Reverse((ready_at, agent, resource, scheduled_generation))) =
            self.ready_queue.peek().copied()
        {
            if ready_at > now {
                break;
            }
            self.ready_queue.pop();

            let Some(state) = self
                .states
                .get_mut(&agent)
                .and_then(|resources| resources.get_mut(&resource))
            else {
                continue;
            };

            // Superseded by a later notification
            if state.available || state.generation != scheduled_generation {
                continue;
            }

            state.available = true;
            state.generation = state.generation.wrapping_add(1);
            let state = *state;
            promoted += 1;

            debug!(
                agent = %agent,
                resource = %resource,
                ready_at = ready_at,
                "Sweep promoted resource to available"
            );
            publish_availability(bus, agent, &state, now);
        }

        self.stats.promoted_by_sweep += promoted as u64;
        promoted
    }

    /// Whether the agent can use the resource; unknown resources have never been used
    pub fn is_available(&self, agent: AgentId, resource: ResourceId) -> bool {
        self.state(agent, resource).map_or(true, |state| state.available)
    }

    pub fn state(&self, agent: AgentId, resource: ResourceId) -> Option<ResourceState> {
        self.states
            .get(&agent)
            .and_then(|resources| resources.get(&resource))
            .copied()
    }

    /// Whether a previously read generation still describes the current state
    pub fn is_current(&self, agent: AgentId, resource: ResourceId, generation: u64) -> bool {
        self.state(agent, resource)
            .is_some_and(|state| state.generation == generation)
    }

    /// Time left until the resource is ready, zero when available
    pub fn remaining(&self, agent: AgentId, resource: ResourceId, now: Millis) -> Millis {
        match self.state(agent, resource) {
            Some(state) if !state.available => state.ready_at.saturating_sub(now),
            _ => 0,
        }
    }

    /// Drop every resource of an agent that left for good
    pub fn forget_agent(&mut self, agent: AgentId) -> usize {
        let removed = self.states.remove(&agent).map_or(0, |resources| resources.len());
        if removed > 0 {
            debug!(agent = %agent, removed = removed, "Forgot agent cooldowns");
        }
        removed
    }

    pub fn stats(&self) -> CooldownStats {
        CooldownStats {
            tracked_resources: self.states.values().map(HashMap::len).sum(),
            ..self.stats.clone()
        }
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn publish_availability(bus: &EventBus, agent: AgentId, state: &ResourceState, now: Millis) {
    let payload = if state.available {
        EventPayload::ResourceAvailable {
            agent,
            resource: state.resource,
            generation: state.generation,
        }
    } else {
        EventPayload::ResourceConsumed {
            agent,
            resource: state.resource,
            ready_at: state.ready_at,
            generation: state.generation,
        }
    };

    bus.publish(Event::new(payload, EventSource::CooldownTracker, now));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::{Arc, Mutex};

    const AGENT: AgentId = AgentId(7);
    const RESOURCE: ResourceId = ResourceId(3);

    fn collect_kinds(bus: &EventBus) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::ResourceAvailable, EventKind::ResourceConsumed] {
            let seen = seen.clone();
            bus.subscribe(
                kind,
                Arc::new(move |event: &Event| {
                    seen.lock().unwrap().push(event.kind());
                    Ok(())
                }),
            );
        }
        seen
    }

    #[test]
    fn test_stale_duplicate_is_discarded() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();

        let first = tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 5_000, 1),
            0,
            &bus,
        );
        assert_eq!(
            first,
            UpdateOutcome::Applied {
                availability_changed: true
            }
        );

        // A replay of an older notification, including one claiming availability
        let stale = tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 5_000, 0),
            10,
            &bus,
        );
        assert_eq!(stale, UpdateOutcome::Stale);
        let stale = tracker.on_raw_state_change(
            RawStateChange::available(AGENT, RESOURCE, 0),
            10,
            &bus,
        );
        assert_eq!(stale, UpdateOutcome::Stale);

        assert!(!tracker.is_available(AGENT, RESOURCE));
        assert_eq!(tracker.state(AGENT, RESOURCE).unwrap().ready_at, 5_000);
        assert_eq!(tracker.stats().stale_discarded, 2);
    }

    #[test]
    fn test_next_generation_flips_availability() {
        let bus = EventBus::with_default_config();
        let seen = collect_kinds(&bus);
        let mut tracker = CooldownTracker::new();

        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 5_000, 1), 0, &bus);
        let outcome =
            tracker.on_raw_state_change(RawStateChange::available(AGENT, RESOURCE, 2), 3_000, &bus);

        assert_eq!(
            outcome,
            UpdateOutcome::Applied {
                availability_changed: true
            }
        );
        assert!(tracker.is_available(AGENT, RESOURCE));
        assert!(tracker.is_current(AGENT, RESOURCE, 2));

        bus.dispatch();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::ResourceConsumed, EventKind::ResourceAvailable]
        );
    }

    #[test]
    fn test_later_consume_is_accepted_out_of_sequence() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();

        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 5_000, 1), 0, &bus);
        let outcome = tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 9_000, 7),
            100,
            &bus,
        );

        assert_eq!(
            outcome,
            UpdateOutcome::Applied {
                availability_changed: false
            }
        );
        let state = tracker.state(AGENT, RESOURCE).unwrap();
        assert_eq!(state.ready_at, 9_000);
        assert_eq!(state.generation, 7);
        assert!(!tracker.is_current(AGENT, RESOURCE, 1));
    }

    #[test]
    fn test_sweep_promotes_expired_cooldowns() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();
        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 1_000, 1), 0, &bus);
        tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, ResourceId(4), 3_000, 1),
            0,
            &bus,
        );
        bus.dispatch();

        assert_eq!(tracker.update(999, &bus), 0);
        assert_eq!(tracker.remaining(AGENT, RESOURCE, 999), 1);

        let seen = collect_kinds(&bus);
        assert_eq!(tracker.update(1_000, &bus), 1);
        assert!(tracker.is_available(AGENT, RESOURCE));
        assert!(!tracker.is_available(AGENT, ResourceId(4)));
        assert_eq!(tracker.state(AGENT, RESOURCE).unwrap().generation, 2);

        bus.dispatch();
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::ResourceAvailable]);
        assert_eq!(tracker.stats().promoted_by_sweep, 1);
    }

    #[test]
    fn test_sweep_skips_superseded_entries() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();
        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 1_000, 1), 0, &bus);
        // Re-consumed with a longer cooldown before the first one ran out
        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 4_000, 2), 500, &bus);

        assert_eq!(tracker.update(1_500, &bus), 0);
        assert!(!tracker.is_available(AGENT, RESOURCE));
        assert_eq!(tracker.update(4_000, &bus), 1);
        assert!(tracker.is_available(AGENT, RESOURCE));
    }

    #[test]
    fn test_unknown_resources_are_available() {
        let tracker = CooldownTracker::new();
        assert!(tracker.is_available(AgentId(1), ResourceId(1)));
        assert_eq!(tracker.remaining(AgentId(1), ResourceId(1), 0), 0);
        assert!(!tracker.is_current(AgentId(1), ResourceId(1), 0));
    }

    #[test]
    fn test_forget_agent() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();
        tracker.on_raw_state_change(RawStateChange::consumed(AGENT, RESOURCE, 1_000, 1), 0, &bus);

        assert_eq!(tracker.forget_agent(AGENT), 1);
        assert_eq!(tracker.stats().tracked_resources, 0);
        // Queued readiness for a forgotten agent is ignored
        assert_eq!(tracker.update(2_000, &bus), 0);
    }

    #[test]
    fn test_generation_wraps_at_the_top_of_the_range() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();
        tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 1_000, u64::MAX),
            0,
            &bus,
        );

        // The sweep bumps the generation past the top without panicking
        assert_eq!(tracker.update(1_000, &bus), 1);
        assert!(tracker.is_current(AGENT, RESOURCE, 0));

        let next = tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 3_000, 1),
            1_000,
            &bus,
        );
        assert!(matches!(next, UpdateOutcome::Applied { .. }));
        assert!(!tracker.is_available(AGENT, RESOURCE));
    }

    #[test]
    fn test_notification_after_max_generation_is_not_stale() {
        let bus = EventBus::with_default_config();
        let mut tracker = CooldownTracker::new();
        tracker.on_raw_state_change(
            RawStateChange::consumed(AGENT, RESOURCE, 1_000, u64::MAX),
            0,
            &bus,
        );

        let outcome =
            tracker.on_raw_state_change(RawStateChange::available(AGENT, RESOURCE, 0), 10, &bus);
        assert_eq!(
            outcome,
            UpdateOutcome::Applied {
                availability_changed: true
            }
        );
        assert!(tracker.is_available(AGENT, RESOURCE));

        // A stray high generation afterwards is rejected as before
        let stray =
            tracker.on_raw_state_change(RawStateChange::available(AGENT, RESOURCE, 5), 20, &bus);
        assert_eq!(stray, UpdateOutcome::Stale);
    }
}
