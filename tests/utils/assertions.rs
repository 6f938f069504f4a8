//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use claimbus::{AgentId, ClaimState, EventKind, EventPayload, TargetKey};

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct ClaimAssertion<'a> {
    setup: &'a TestSetup,
    target: TargetKey,
}

impl<'a> ClaimAssertion<'a> {
    pub fn for_target(setup: &'a TestSetup, target: &TargetKey) -> Self {
        Self {
            setup,
            target: target.clone(),
        }
    }

    pub fn is_in_state(self, expected: ClaimState) -> Self {
        assert_eq!(
            self.setup.coordinator.get_claim_state(&self.target),
            expected,
            "{} in wrong state",
            self.target
        );
        self
    }

    pub fn is_unclaimed(self) -> Self {
        self.is_in_state(ClaimState::Unclaimed)
    }

    pub fn is_held_by(self, agent: AgentId) -> Self {
        let record = self
            .setup
            .coordinator
            .claim(&self.target)
            .unwrap_or_else(|| panic!("{} should be claimed", self.target));
        assert_eq!(record.state, ClaimState::Confirmed, "{} not confirmed", self.target);
        assert_eq!(record.claimant, agent, "{} held by wrong agent", self.target);
        self
    }
}

pub struct EventAssertion<'a> {
    setup: &'a TestSetup,
}

impl<'a> EventAssertion<'a> {
    pub fn new(setup: &'a TestSetup) -> Self {
        Self { setup }
    }

    pub fn saw(self, kind: EventKind, times: usize) -> Self {
        assert_eq!(
            self.setup.recorder.count(kind),
            times,
            "wrong number of {:?} events",
            kind
        );
        self
    }

    /// Assert a `ClaimConfirmed` for the target went to `agent`
    pub fn confirmed(self, target: &TargetKey, agent: AgentId) -> Self {
        let found = self
            .setup
            .recorder
            .of_kind(EventKind::ClaimConfirmed)
            .iter()
            .any(|event| {
                matches!(&event.payload, EventPayload::ClaimConfirmed { target: t, claimant, .. }
                    if t == target && *claimant == agent)
            });
        assert!(found, "{} was never confirmed for {}", target, agent);
        self
    }

    /// Assert `agent` was told it lost `target` to `holder`
    pub fn rejected(self, target: &TargetKey, agent: AgentId, holder: AgentId) -> Self {
        let found = self
            .setup
            .recorder
            .of_kind(EventKind::ClaimRejected)
            .iter()
            .any(|event| {
                matches!(&event.payload, EventPayload::ClaimRejected { target: t, claimant, holder: h }
                    if t == target && *claimant == agent && *h == holder)
            });
        assert!(found, "{} was never rejected in favour of {}", agent, holder);
        self
    }
}
