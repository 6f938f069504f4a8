use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claims::{ClaimRecord, ClaimStats};
use crate::config::CoordinationConfig;
use crate::cooldown::CooldownStats;
use crate::coordinator::Coordinator;
use crate::event::{Event, EventBusStats};
use crate::message::MessageBusStats;
use crate::types::{GroupId, Millis};

/// Recent events included in a dump
const RECENT_EVENT_LIMIT: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group: GroupId,
    pub members: usize,
    pub intensity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageBusSummary {
    #[serde(flatten)]
    pub stats: MessageBusStats,
    pub pending: usize,
}

/// Point-in-time view of the coordination core for operators
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsDump {
    pub generated_at: DateTime<Utc>,
    pub now_ms: Millis,
    pub ticks: u64,
    pub config: CoordinationConfig,
    pub active_claims: Vec<ClaimRecord>,
    pub event_bus: EventBusStats,
    pub message_bus: MessageBusSummary,
    pub claims: ClaimStats,
    pub cooldowns: CooldownStats,
    pub groups: Vec<GroupSummary>,
    pub recent_events: Vec<Event>,
}

impl DiagnosticsDump {
    pub fn capture(coordinator: &Coordinator) -> Self {
        let groups = coordinator
            .groups()
            .scopes()
            .map(|scope| GroupSummary {
                group: scope.group,
                members: scope.members.len(),
                intensity: scope.intensity,
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            now_ms: coordinator.now(),
            ticks: coordinator.ticks(),
            config: coordinator.config().clone(),
            active_claims: coordinator.active_claims(),
            event_bus: coordinator.event_stats(),
            message_bus: MessageBusSummary {
                stats: coordinator.message_stats(),
                pending: coordinator.pending_messages(),
            },
            claims: coordinator.claim_stats(),
            cooldowns: coordinator.cooldown_stats(),
            groups,
            recent_events: coordinator.event_bus().recent_history(RECENT_EVENT_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MembershipUpdate;
    use crate::message::CoordinationMessage;
    use crate::types::{ActionCategory, AgentId, TargetKey};

    #[test]
    fn test_capture_lists_claims_and_groups() {
        let mut coordinator = Coordinator::default();
        for agent in [1, 2, 3] {
            coordinator.apply_membership(MembershipUpdate::joined(GroupId(8), AgentId(agent)));
        }
        coordinator
            .submit_claim(CoordinationMessage::claim(
                AgentId(2),
                TargetKey::new("ally#1", ActionCategory::Protect),
                4,
                1_000,
                0,
            ))
            .unwrap();
        coordinator.tick(10);

        let dump = DiagnosticsDump::capture(&coordinator);

        assert_eq!(dump.now_ms, 10);
        assert_eq!(dump.active_claims.len(), 1);
        assert_eq!(dump.claims.pending_records, 1);
        assert_eq!(dump.groups.len(), 1);
        assert_eq!(dump.groups[0].members, 3);
        // Three joins went through the event bus on the first tick
        assert_eq!(dump.recent_events.len(), 3);

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["message_bus"]["published"], 1);
        assert_eq!(json["config"]["claims"]["arbitration_window_ms"], 200);
        assert_eq!(json["recent_events"][0]["payload"]["event"], "member_joined");
    }
}
