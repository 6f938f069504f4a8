use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use crate::claims::ClaimOutcome;
use crate::context::{CoordinationFeature, Difficulty, WorldMetadata, ZoneKind};
use crate::coordinator::{Coordinator, SharedCoordinator};
use crate::cooldown::RawStateChange;
use crate::event::{Event, EventHandler, EventKind, EventPayload, EventSource};
use crate::group::MembershipUpdate;
use crate::message::{CoordinationMessage, InboxId, MessageType};
use crate::types::{ActionCategory, AgentId, EntityId, GroupId, Millis, ResourceId, Role, TargetKey};

/// Every synthetic agent has one interrupt ability
const INTERRUPT: ResourceId = ResourceId(1);

#[derive(Debug, Clone)]
pub struct SwarmConfig {
    pub agents: u32,
    pub group_size: u32,
    /// Chance per group per step that a hostile cast starts
    pub cast_chance: f64,
    /// Chance a winner reports success rather than failure
    pub success_rate: f64,
    /// Chance a winner never reports at all
    pub silent_rate: f64,
    pub lease_ms: Millis,
    pub interrupt_cooldown_ms: Millis,
    pub seed: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            agents: 100,
            group_size: 5,
            cast_chance: 0.2,
            success_rate: 0.8,
            silent_rate: 0.05,
            lease_ms: 1_500,
            interrupt_cooldown_ms: 3_000,
            seed: 7,
        }
    }
}

impl SwarmConfig {
    pub fn with_agents(agents: u32) -> Self {
        Self {
            agents,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SwarmStats {
    pub casts: u64,
    pub claims_submitted: u64,
    pub already_claimed: u64,
    pub rejected_invalid: u64,
    pub reported_success: u64,
    pub reported_failure: u64,
    pub silent_winners: u64,
    pub messages_read: u64,
}

/// Synthetic stand-in for the decision layer, used for soak runs
///
/// Agents are packed into groups. Each step some groups see a hostile cast and
/// every member whose interrupt is ready claims it with a random priority.
/// Winners spend their interrupt and report an outcome, except for a few that
/// stay silent so lease expiry gets exercised too.
pub struct SyntheticSwarm {
    config: SwarmConfig,
    rng: StdRng,
    groups: Vec<(GroupId, Vec<AgentId>)>,
    inboxes: Vec<InboxId>,
    generations: HashMap<AgentId, u64>,
    /// Filled by the `ClaimConfirmed` handler, consumed on the next step
    confirmed: Arc<Mutex<Vec<(TargetKey, AgentId)>>>,
    next_cast: u32,
    stats: SwarmStats,
}

impl SyntheticSwarm {
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            groups: Vec::new(),
            inboxes: Vec::new(),
            generations: HashMap::new(),
            confirmed: Arc::new(Mutex::new(Vec::new())),
            next_cast: 0,
            stats: SwarmStats::default(),
        }
    }

    /// Join every agent to its group, tag roles and open inboxes
    pub fn register(&mut self, coordinator: &mut Coordinator) {
        let group_size = self.config.group_size.max(1);
        let roles: Vec<Role> = Role::iter().collect();

        for index in 0..self.config.agents {
            let agent = AgentId(index + 1);
            let group = GroupId(index / group_size + 1);

            coordinator.apply_membership(MembershipUpdate::joined(group, agent));
            coordinator.set_role(agent, roles[index as usize % roles.len()]);
            self.inboxes
                .push(coordinator.subscribe_inbox(agent, &[MessageType::Claim, MessageType::Announce]));

            match self.groups.last_mut() {
                Some((last, members)) if *last == group => members.push(agent),
                _ => self.groups.push((group, vec![agent])),
            }
        }

        for (group, members) in &self.groups {
            let metadata = WorldMetadata {
                zone: ZoneKind::Dungeon,
                difficulty: Difficulty::Heroic,
                group_size: members.len() as u32,
                modifiers: Vec::new(),
                in_combat: true,
            };
            coordinator.resolve_context(*group, &metadata);
        }

        let sink = self.confirmed.clone();
        let handler: EventHandler = Arc::new(move |event: &Event| {
            if let EventPayload::ClaimConfirmed {
                target, claimant, ..
            } = &event.payload
            {
                if let Ok(mut confirmed) = sink.lock() {
                    confirmed.push((target.clone(), *claimant));
                }
            }
            Ok(())
        });
        coordinator.subscribe(EventKind::ClaimConfirmed, handler);

        info!(
            agents = self.config.agents,
            groups = self.groups.len(),
            "Synthetic swarm registered"
        );
    }

    /// Act on last tick's confirmations, read inboxes and raise new casts
    pub fn step(&mut self, coordinator: &mut Coordinator) {
        self.act_on_confirmations(coordinator);

        for inbox in &self.inboxes {
            self.stats.messages_read += coordinator.drain_inbox(*inbox).len() as u64;
        }

        for index in 0..self.groups.len() {
            if self.rng.random_bool(self.config.cast_chance) {
                self.raise_cast(coordinator, index);
            }
        }
    }

    fn act_on_confirmations(&mut self, coordinator: &mut Coordinator) {
        let confirmed = match self.confirmed.lock() {
            Ok(mut confirmed) => std::mem::take(&mut *confirmed),
            Err(_) => return,
        };
        let now = coordinator.now();

        for (target, agent) in confirmed {
            let generation = self.generations.entry(agent).or_insert(0);
            *generation += 1;
            coordinator.on_raw_state_change(RawStateChange::consumed(
                agent,
                INTERRUPT,
                now + self.config.interrupt_cooldown_ms,
                *generation,
            ));

            if self.rng.random_bool(self.config.silent_rate) {
                self.stats.silent_winners += 1;
                continue;
            }
            let outcome = if self.rng.random_bool(self.config.success_rate) {
                self.stats.reported_success += 1;
                ClaimOutcome::Success
            } else {
                self.stats.reported_failure += 1;
                ClaimOutcome::Failure
            };
            coordinator.report_outcome(&target, agent, outcome);
        }
    }

    fn raise_cast(&mut self, coordinator: &mut Coordinator, index: usize) {
        let (group, members) = &self.groups[index];
        self.next_cast += 1;
        self.stats.casts += 1;
        let caster = EntityId(u64::from(self.next_cast));
        let now = coordinator.now();

        coordinator.publish_event(
            EventPayload::HostileActionStarted {
                caster,
                action_id: self.next_cast,
                ends_at: now + 2_000,
            },
            EventSource::Ingestion,
        );

        let target = TargetKey::for_entity(caster, ActionCategory::Interrupt);
        for agent in members {
            if !coordinator.is_available(*agent, INTERRUPT)
                || !coordinator.should_coordinate(*agent, CoordinationFeature::InterruptRotation)
            {
                continue;
            }

            let priority = self.rng.random_range(0..100);
            let claim = CoordinationMessage::claim(
                *agent,
                target.clone(),
                priority,
                self.config.lease_ms,
                now,
            );
            self.stats.claims_submitted += 1;
            match coordinator.submit_claim(claim) {
                Ok(_) => {}
                Err(e) if e.is_already_claimed() => self.stats.already_claimed += 1,
                Err(e) => {
                    self.stats.rejected_invalid += 1;
                    debug!(group = %group, agent = %agent, error = %e, "Synthetic claim rejected");
                }
            }
        }
    }

    pub fn stats(&self) -> SwarmStats {
        self.stats.clone()
    }
}

/// Starts the background task that steps the swarm once per tick interval
#[instrument(skip(coordinator, swarm))]
pub async fn start_swarm_task(
    coordinator: SharedCoordinator,
    mut swarm: SyntheticSwarm,
    step_interval: Duration,
) {
    {
        let mut coordinator = coordinator.lock().await;
        swarm.register(&mut coordinator);
    }

    let mut ticker = interval(step_interval);
    let mut steps: u64 = 0;
    loop {
        ticker.tick().await;
        swarm.step(&mut *coordinator.lock().await);

        steps += 1;
        if steps % 200 == 0 {
            info!(steps = steps, stats = ?swarm.stats(), "Synthetic swarm progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimState;

    #[test]
    fn test_register_builds_groups() {
        let mut coordinator = Coordinator::default();
        let mut swarm = SyntheticSwarm::new(SwarmConfig {
            agents: 12,
            group_size: 5,
            ..SwarmConfig::default()
        });

        swarm.register(&mut coordinator);

        assert_eq!(coordinator.groups().group_count(), 3);
        assert_eq!(coordinator.groups().members(GroupId(3)).len(), 2);
        assert_eq!(coordinator.groups().role_of(AgentId(2)), Some(Role::Healer));
    }

    #[test]
    fn test_swarm_soak_keeps_claims_consistent() {
        let mut coordinator = Coordinator::default();
        let mut swarm = SyntheticSwarm::new(SwarmConfig {
            agents: 40,
            cast_chance: 0.5,
            ..SwarmConfig::default()
        });
        swarm.register(&mut coordinator);

        let mut now = 0;
        for _ in 0..200 {
            swarm.step(&mut coordinator);
            now += 50;
            coordinator.tick(now);
        }

        let stats = swarm.stats();
        assert!(stats.casts > 0);
        assert!(stats.claims_submitted > 0);
        assert_eq!(stats.rejected_invalid, 0);

        // Every confirmed record still has a live lease
        for record in coordinator.active_claims() {
            if record.state == ClaimState::Confirmed {
                assert!(record.expires_at > coordinator.now());
            }
        }
        let claims = coordinator.claim_stats();
        assert!(claims.confirmed > 0);
        assert_eq!(claims.submitted, stats.claims_submitted);
        assert!(stats.already_claimed <= stats.claims_submitted);
        assert_eq!(
            claims.confirmed,
            claims.released + claims.expired + claims.confirmed_records as u64
        );
    }

    #[test]
    fn test_busy_interrupts_skip_casts_without_invalid_claims() {
        let mut coordinator = Coordinator::default();
        let mut swarm = SyntheticSwarm::new(SwarmConfig {
            agents: 10,
            cast_chance: 1.0,
            silent_rate: 0.0,
            interrupt_cooldown_ms: 60_000,
            ..SwarmConfig::default()
        });
        swarm.register(&mut coordinator);

        let mut now = 0;
        for _ in 0..40 {
            swarm.step(&mut coordinator);
            now += 50;
            coordinator.tick(now);
        }

        // Once every interrupt is spent, later casts draw no claims at all
        let stats = swarm.stats();
        assert_eq!(stats.casts, 80);
        assert!(stats.claims_submitted < stats.casts * 5);
        assert_eq!(stats.rejected_invalid, 0);
    }
}
