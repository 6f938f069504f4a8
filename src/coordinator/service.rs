use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::errors::CoordinationError;
use crate::claims::{
    ClaimOutcome, ClaimRecord, ClaimResolver, ClaimState, ClaimStats, ReleaseResult,
    SubmitOutcome, WithdrawOutcome,
};
use crate::config::CoordinationConfig;
use crate::context::{ContentContext, ContentContextResolver, CoordinationFeature, WorldMetadata};
use crate::cooldown::{CooldownStats, CooldownTracker, RawStateChange, UpdateOutcome};
use crate::event::{
    Event, EventBus, EventBusStats, EventHandler, EventKind, EventPayload, EventSource,
    SubscriptionId,
};
use crate::group::{GroupRegistry, MembershipUpdate};
use crate::message::{
    CoordinationMessage, DeliveryReport, InboxId, MessageBus, MessageBusStats, MessageError,
    MessageId, MessageType,
};
use crate::types::{AgentId, GroupId, Millis, ResourceId, Role, TargetKey};

/// What one tick did, in sweep order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub now: Millis,
    pub resources_promoted: usize,
    pub delivery: DeliveryReport,
    pub claims_confirmed: usize,
    pub claims_expired: usize,
    pub contenders_rejected: usize,
    pub events_dispatched: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.resources_promoted == 0
            && self.delivery.messages == 0
            && self.delivery.expired == 0
            && self.claims_confirmed == 0
            && self.claims_expired == 0
            && self.events_dispatched == 0
    }
}

/// Tick driver owning one instance of every coordination component
///
/// All mutation goes through here on the tick thread. Calls between ticks are
/// stamped with the time of the latest tick; `tick` advances the clock and runs
/// the sweeps in dependency order: cooldowns, message delivery, claims, and
/// finally event dispatch so handlers see everything the tick produced.
pub struct Coordinator {
    config: CoordinationConfig,
    event_bus: EventBus,
    cooldowns: CooldownTracker,
    groups: GroupRegistry,
    contexts: HashMap<GroupId, ContentContextResolver>,
    messages: MessageBus,
    claims: ClaimResolver,
    now: Millis,
    ticks: u64,
}

impl Coordinator {
    pub fn new(config: CoordinationConfig) -> Self {
        info!(
            tick_interval_ms = config.tick.interval_ms,
            "Creating coordinator"
        );

        Self {
            event_bus: EventBus::new(config.event_bus.clone()),
            cooldowns: CooldownTracker::new(),
            groups: GroupRegistry::new(),
            contexts: HashMap::new(),
            messages: MessageBus::new(config.message_bus.clone()),
            claims: ClaimResolver::new(config.claims.clone()),
            now: 0,
            ticks: 0,
            config,
        }
    }

    /// Advance the clock to `now` and run one round of sweeps
    pub fn tick(&mut self, now: Millis) -> TickReport {
        if now < self.now {
            warn!(now = now, clock = self.now, "Tick time went backwards, holding clock");
        }
        self.now = self.now.max(now);
        self.ticks += 1;
        let now = self.now;

        let resources_promoted = self.cooldowns.update(now, &self.event_bus);
        let delivery = self.messages.deliver(now);
        let sweep = self.claims.update(now, &self.event_bus);
        let events_dispatched = self.event_bus.dispatch();

        let report = TickReport {
            tick: self.ticks,
            now,
            resources_promoted,
            delivery,
            claims_confirmed: sweep.confirmed.len(),
            claims_expired: sweep.expired.len(),
            contenders_rejected: sweep.rejected,
            events_dispatched,
        };
        if !report.is_idle() {
            debug!(
                tick = report.tick,
                now = now,
                promoted = report.resources_promoted,
                delivered = report.delivery.deliveries,
                deferred = report.delivery.deferred,
                confirmed = report.claims_confirmed,
                expired = report.claims_expired,
                events = report.events_dispatched,
                "Tick complete"
            );
        }
        report
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    // Event bus

    /// Handle to the event bus, for subscribers that outlive a borrow of the coordinator
    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        self.event_bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.event_bus.unsubscribe(id);
    }

    /// Publish a domain event from the ingestion layer, stamped with the current time
    pub fn publish_event(&self, payload: EventPayload, source: EventSource) {
        self.event_bus.publish(Event::new(payload, source, self.now));
    }

    // Cooldowns

    pub fn on_raw_state_change(&mut self, change: RawStateChange) -> UpdateOutcome {
        self.cooldowns
            .on_raw_state_change(change, self.now, &self.event_bus)
    }

    pub fn is_available(&self, agent: AgentId, resource: ResourceId) -> bool {
        self.cooldowns.is_available(agent, resource)
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    // Groups and content context

    pub fn apply_membership(&mut self, update: MembershipUpdate) -> bool {
        let previous = self.groups.group_of(update.agent);
        let changed = self.groups.apply(update, self.now, &self.event_bus);

        // Dissolved groups take their classification state with them
        for group in previous.into_iter().chain(Some(update.group)) {
            if self.groups.scope(group).is_none() && self.contexts.remove(&group).is_some() {
                debug!(group = %group, "Dropped content resolver for dissolved group");
            }
        }
        changed
    }

    pub fn set_role(&mut self, agent: AgentId, role: Role) -> Option<Role> {
        self.groups.set_role(agent, role)
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Classify a group's activity and push the resulting intensity into its scope
    ///
    /// Publishes `ContentContextChanged` whenever the reported classification changes.
    pub fn resolve_context(&mut self, group: GroupId, metadata: &WorldMetadata) -> ContentContext {
        let resolver = self
            .contexts
            .entry(group)
            .or_insert_with(|| ContentContextResolver::new(&self.config.context));
        let before = resolver.current_kind();
        let context = resolver.resolve(metadata);

        self.groups.set_intensity(group, context.intensity);
        if before != Some(context.kind) {
            self.event_bus.publish(Event::new(
                EventPayload::ContentContextChanged {
                    group,
                    kind: context.kind,
                    intensity: context.intensity,
                },
                EventSource::ContextResolver,
                self.now,
            ));
        }
        context
    }

    /// Consumer policy helper: whether the agent's group currently justifies arbitrating `feature`
    pub fn should_coordinate(&self, agent: AgentId, feature: CoordinationFeature) -> bool {
        self.groups
            .group_of(agent)
            .and_then(|group| self.groups.scope(group))
            .is_some_and(|scope| scope.intensity > 0.0 && scope.intensity >= feature.threshold())
    }

    // Messages

    /// Publish a non-claim coordination message to its scope
    ///
    /// Claim messages must go through `submit_claim` so they are arbitrated.
    pub fn publish_message(
        &mut self,
        message: CoordinationMessage,
    ) -> Result<MessageId, CoordinationError> {
        if message.message_type == MessageType::Claim {
            return Err(MessageError::invalid("claim messages must be submitted for arbitration").into());
        }
        Ok(self.messages.publish(message, &self.groups)?)
    }

    pub fn subscribe_inbox(&mut self, agent: AgentId, types: &[MessageType]) -> InboxId {
        self.messages.subscribe(agent, types)
    }

    pub fn unsubscribe_inbox(&mut self, inbox: InboxId) -> bool {
        self.messages.unsubscribe(inbox)
    }

    pub fn drain_inbox(&mut self, inbox: InboxId) -> Vec<Arc<CoordinationMessage>> {
        self.messages.drain_inbox(inbox)
    }

    // Claims

    /// Submit a claim message for arbitration and tell the sender's scope about it
    ///
    /// The message must pass the message bus rules first. Rejected claims are
    /// not fanned out.
    #[instrument(skip(self, message), fields(sender = %message.sender, target_key = %message.target))]
    pub fn submit_claim(
        &mut self,
        message: CoordinationMessage,
    ) -> Result<SubmitOutcome, CoordinationError> {
        self.messages.validate(&message, &self.groups)?;
        let outcome = self
            .claims
            .submit_claim(&message, self.now, &self.event_bus)?;
        self.messages.publish(message, &self.groups)?;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub fn withdraw_claim(
        &mut self,
        target: &TargetKey,
        claimant: AgentId,
    ) -> Result<WithdrawOutcome, CoordinationError> {
        Ok(self.claims.withdraw_claim(target, claimant)?)
    }

    #[instrument(skip(self))]
    pub fn report_outcome(
        &mut self,
        target: &TargetKey,
        claimant: AgentId,
        outcome: ClaimOutcome,
    ) -> ReleaseResult {
        self.claims
            .report_outcome(target, claimant, outcome, self.now, &self.event_bus)
    }

    pub fn get_claim_state(&self, target: &TargetKey) -> ClaimState {
        self.claims.get_claim_state(target)
    }

    pub fn claim(&self, target: &TargetKey) -> Option<ClaimRecord> {
        self.claims.claim(target)
    }

    pub fn active_claims(&self) -> Vec<ClaimRecord> {
        self.claims.active_claims()
    }

    // Counters

    pub fn event_stats(&self) -> EventBusStats {
        self.event_bus.stats()
    }

    pub fn message_stats(&self) -> MessageBusStats {
        self.messages.stats()
    }

    pub fn claim_stats(&self) -> ClaimStats {
        self.claims.stats()
    }

    pub fn cooldown_stats(&self) -> CooldownStats {
        self.cooldowns.stats()
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.pending()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinationConfig::default())
    }
}
