#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;

use claimbus::{
    coordinator::Coordinator,
    group::MembershipUpdate,
    message::InboxId,
    AgentId, CoordinationConfig, GroupId, Millis, Role,
};

use super::recorder::EventRecorder;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub coordinator: Coordinator,
    pub recorder: EventRecorder,
    pub inboxes: HashMap<AgentId, InboxId>,
    pub agents: Vec<AgentId>,
}

impl TestSetup {
    /// Advance to `now`, running one full tick
    pub fn tick(&mut self, now: Millis) -> claimbus::TickReport {
        self.coordinator.tick(now)
    }

    /// Tick every `step` ms from just after the current clock up to and including `until`
    pub fn run_until(&mut self, until: Millis, step: Millis) {
        let mut now = self.coordinator.now();
        while now < until {
            now = (now + step).min(until);
            self.coordinator.tick(now);
        }
    }

    pub fn inbox(&self, agent: AgentId) -> InboxId {
        self.inboxes[&agent]
    }
}

pub struct TestSetupBuilder {
    config: CoordinationConfig,
    group: GroupId,
    agents: Vec<AgentId>,
    roles: Vec<(AgentId, Role)>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: CoordinationConfig::default(),
            group: GroupId(1),
            agents: vec![],
            roles: vec![],
        }
    }

    pub fn with_config(mut self, config: CoordinationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_agents(mut self, ids: &[u32]) -> Self {
        self.agents = ids.iter().copied().map(AgentId).collect();
        self
    }

    /// Agents X=1, Y=2 and Z=3 in one group
    pub fn with_three_agents(self) -> Self {
        self.with_agents(&[1, 2, 3])
    }

    pub fn with_role(mut self, agent: u32, role: Role) -> Self {
        self.roles.push((AgentId(agent), role));
        self
    }

    pub fn build(self) -> TestSetup {
        let mut coordinator = Coordinator::new(self.config);
        let recorder = EventRecorder::attach(&coordinator.event_bus());
        let mut inboxes = HashMap::new();

        for agent in &self.agents {
            coordinator.apply_membership(MembershipUpdate::joined(self.group, *agent));
            inboxes.insert(*agent, coordinator.subscribe_inbox(*agent, &[]));
        }
        for (agent, role) in self.roles {
            coordinator.set_role(agent, role);
        }

        // Flush the join events so tests start from a quiet bus
        coordinator.event_bus().dispatch();
        recorder.clear();

        TestSetup {
            coordinator,
            recorder,
            inboxes,
            agents: self.agents,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
