mod utils;

use std::collections::HashSet;
use std::sync::Arc;

use claimbus::{
    config::MessageBusConfig,
    event::EventBus,
    group::{GroupRegistry, MembershipUpdate},
    message::{CoordinationMessage, MessageBus, MessageId, MessagePayload, Scope},
    ActionCategory, AgentId, CoordinationConfig, GroupId, MessageType, Role, TargetKey,
};
use utils::TestSetupBuilder;

fn group_of(agents: &[u32]) -> GroupRegistry {
    let bus = EventBus::with_default_config();
    let mut groups = GroupRegistry::new();
    for agent in agents {
        groups.apply(MembershipUpdate::joined(GroupId(1), AgentId(*agent)), 0, &bus);
    }
    groups
}

fn request(sender: u32, priority: u32, created_at: u64) -> CoordinationMessage {
    CoordinationMessage::new(
        MessageType::Request,
        AgentId(sender),
        TargetKey::new(format!("ally#{}", priority), ActionCategory::Heal),
        MessagePayload::Request {
            action: ActionCategory::Heal,
        },
        created_at,
    )
    .with_priority(priority)
    .with_ttl(60_000)
}

#[test]
fn test_ten_thousand_messages_drain_in_fifty_ticks() {
    let groups = group_of(&[1, 2]);
    let mut bus = MessageBus::new(MessageBusConfig {
        per_scope_budget: 200,
        tick_interval_ms: 50,
        ..MessageBusConfig::default()
    });
    let inbox = bus.subscribe(AgentId(2), &[]);

    for i in 0..10_000u32 {
        bus.publish(request(1, i % 7, 0), &groups).unwrap();
    }

    let mut received = Vec::new();
    for tick in 0..50u64 {
        let report = bus.deliver(tick * 50);
        assert_eq!(report.messages, 200, "tick {} delivered wrong count", tick);
        received.extend(bus.drain_inbox(inbox));
    }

    assert_eq!(received.len(), 10_000);
    let unique: HashSet<MessageId> = received.iter().map(|m| m.message_id).collect();
    assert_eq!(unique.len(), 10_000, "a message was delivered twice");
    assert_eq!(bus.pending(), 0);

    let stats = bus.stats();
    assert_eq!(stats.expired, 0);
    assert_eq!(stats.deliveries, 10_000);

    // Deferral never reorders: the whole stream is in delivery order
    assert!(received
        .windows(2)
        .all(|pair| pair[0].delivery_order(&pair[1]).is_lt()));
}

#[test]
fn test_each_member_receives_each_message_once() {
    let groups = group_of(&[1, 2, 3, 4]);
    let mut bus = MessageBus::new(MessageBusConfig {
        per_scope_budget: 50,
        tick_interval_ms: 50,
        ..MessageBusConfig::default()
    });
    let inboxes: Vec<_> = [2, 3, 4]
        .iter()
        .map(|agent| bus.subscribe(AgentId(*agent), &[]))
        .collect();
    // A second inbox for the same agent gets its own copy
    let extra = bus.subscribe(AgentId(4), &[MessageType::Request]);

    for i in 0..120u32 {
        bus.publish(request(1, i % 3, 0), &groups).unwrap();
    }
    for tick in 0..3u64 {
        bus.deliver(tick * 50);
    }

    for inbox in inboxes.into_iter().chain([extra]) {
        let ids: HashSet<MessageId> = bus.drain_inbox(inbox).iter().map(|m| m.message_id).collect();
        assert_eq!(ids.len(), 120);
    }
}

#[test]
fn test_budgets_are_per_scope() {
    let bus_events = EventBus::with_default_config();
    let mut groups = group_of(&[1, 2, 3]);
    groups.apply(MembershipUpdate::joined(GroupId(2), AgentId(10)), 0, &bus_events);
    groups.apply(MembershipUpdate::joined(GroupId(2), AgentId(11)), 0, &bus_events);
    groups.set_role(AgentId(3), Role::Healer);

    let mut bus = MessageBus::new(MessageBusConfig {
        per_scope_budget: 10,
        tick_interval_ms: 50,
        ..MessageBusConfig::default()
    });
    for _ in 0..15 {
        bus.publish(request(1, 0, 0), &groups).unwrap();
        bus.publish(request(10, 0, 0), &groups).unwrap();
        bus.publish(request(1, 0, 0).with_scope(Scope::Role(Role::Healer)), &groups)
            .unwrap();
    }

    let report = bus.deliver(0);
    assert_eq!(report.messages, 30);
    assert_eq!(report.deferred, 15);
}

#[test]
fn test_short_ttl_under_load_is_dropped_and_counted() {
    let groups = group_of(&[1, 2]);
    let mut bus = MessageBus::new(MessageBusConfig {
        per_scope_budget: 100,
        tick_interval_ms: 50,
        ..MessageBusConfig::default()
    });
    let inbox = bus.subscribe(AgentId(2), &[]);

    for i in 0..300u32 {
        // Half the backlog cannot survive a single deferral
        let ttl = if i % 2 == 0 { 60_000 } else { 30 };
        bus.publish(request(1, 0, 0).with_ttl(ttl), &groups).unwrap();
    }

    let mut delivered = 0;
    for tick in 0..4u64 {
        bus.deliver(tick * 50);
        delivered += bus.drain_inbox(inbox).len();
    }

    let stats = bus.stats();
    assert_eq!(delivered as u64 + stats.expired, 300);
    assert!(stats.expired > 0);
}

#[test]
fn test_coordinator_delivers_on_tick() {
    let mut config = CoordinationConfig::default();
    config.message_bus.per_scope_budget = 2;
    let mut setup = TestSetupBuilder::new()
        .with_config(config)
        .with_three_agents()
        .build();

    for priority in [1, 2, 3] {
        setup
            .coordinator
            .publish_message(request(1, priority, 0))
            .unwrap();
    }

    let inbox = setup.inbox(AgentId(2));
    let first = setup.tick(50);
    assert_eq!(first.delivery.messages, 2);
    let delivered: Vec<Arc<CoordinationMessage>> = setup.coordinator.drain_inbox(inbox);
    assert_eq!(
        delivered.iter().map(|m| m.priority).collect::<Vec<_>>(),
        vec![3, 2]
    );

    setup.tick(100);
    let rest = setup.coordinator.drain_inbox(inbox);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].priority, 1);
}
