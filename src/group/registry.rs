use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::event::{Event, EventBus, EventPayload, EventSource};
use crate::types::{AgentId, GroupId, Millis, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Joined,
    Left,
}

/// Membership notification from the ingestion layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipUpdate {
    pub group: GroupId,
    pub agent: AgentId,
    pub change: MembershipChange,
}

impl MembershipUpdate {
    pub fn joined(group: GroupId, agent: AgentId) -> Self {
        Self {
            group,
            agent,
            change: MembershipChange::Joined,
        }
    }

    pub fn left(group: GroupId, agent: AgentId) -> Self {
        Self {
            group,
            agent,
            change: MembershipChange::Left,
        }
    }
}

/// The live member set of one group plus its coordination intensity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScope {
    pub group: GroupId,
    pub members: BTreeSet<AgentId>,
    pub intensity: f32,
}

impl GroupScope {
    fn new(group: GroupId) -> Self {
        Self {
            group,
            members: BTreeSet::new(),
            intensity: 0.0,
        }
    }
}

/// Tracks which agents belong to which group and what role each agent plays
///
/// An agent belongs to at most one group; joining another group leaves the old one.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupId, GroupScope>,
    membership: HashMap<AgentId, GroupId>,
    roles: HashMap<AgentId, Role>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a membership change, publishing the resulting group events
    ///
    /// Returns false when the change was already in effect.
    pub fn apply(&mut self, update: MembershipUpdate, now: Millis, bus: &EventBus) -> bool {
        match update.change {
            MembershipChange::Joined => self.join(update.group, update.agent, now, bus),
            MembershipChange::Left => self.leave(update.group, update.agent, now, bus),
        }
    }

    fn join(&mut self, group: GroupId, agent: AgentId, now: Millis, bus: &EventBus) -> bool {
        match self.membership.get(&agent).copied() {
            Some(current) if current == group => {
                debug!(group = %group, agent = %agent, "Agent already in group");
                return false;
            }
            Some(previous) => {
                self.leave(previous, agent, now, bus);
            }
            None => {}
        }

        self.groups
            .entry(group)
            .or_insert_with(|| GroupScope::new(group))
            .members
            .insert(agent);
        self.membership.insert(agent, group);

        info!(group = %group, agent = %agent, "Agent joined group");
        bus.publish(Event::new(
            EventPayload::MemberJoined { group, agent },
            EventSource::GroupRegistry,
            now,
        ));
        true
    }

    fn leave(&mut self, group: GroupId, agent: AgentId, now: Millis, bus: &EventBus) -> bool {
        if self.membership.get(&agent) != Some(&group) {
            debug!(group = %group, agent = %agent, "Agent not in group, ignoring leave");
            return false;
        }
        self.membership.remove(&agent);

        let now_empty = match self.groups.get_mut(&group) {
            Some(scope) => {
                scope.members.remove(&agent);
                scope.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            debug!(group = %group, "Last member left, dropping group scope");
            self.groups.remove(&group);
        }

        info!(group = %group, agent = %agent, "Agent left group");
        bus.publish(Event::new(
            EventPayload::MemberLeft { group, agent },
            EventSource::GroupRegistry,
            now,
        ));
        true
    }

    /// Tag an agent with its functional role, returning the previous tag
    pub fn set_role(&mut self, agent: AgentId, role: Role) -> Option<Role> {
        self.roles.insert(agent, role)
    }

    pub fn clear_role(&mut self, agent: AgentId) -> Option<Role> {
        self.roles.remove(&agent)
    }

    pub fn role_of(&self, agent: AgentId) -> Option<Role> {
        self.roles.get(&agent).copied()
    }

    /// Record the coordination intensity supplied by the content context resolver
    pub fn set_intensity(&mut self, group: GroupId, intensity: f32) {
        if let Some(scope) = self.groups.get_mut(&group) {
            scope.intensity = intensity.clamp(0.0, 1.0);
        }
    }

    pub fn group_of(&self, agent: AgentId) -> Option<GroupId> {
        self.membership.get(&agent).copied()
    }

    pub fn scope(&self, group: GroupId) -> Option<&GroupScope> {
        self.groups.get(&group)
    }

    pub fn members(&self, group: GroupId) -> Vec<AgentId> {
        self.groups
            .get(&group)
            .map(|scope| scope.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn members_with_role(&self, group: GroupId, role: Role) -> Vec<AgentId> {
        self.groups
            .get(&group)
            .map(|scope| {
                scope
                    .members
                    .iter()
                    .copied()
                    .filter(|member| self.roles.get(member) == Some(&role))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn scopes(&self) -> impl Iterator<Item = &GroupScope> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
