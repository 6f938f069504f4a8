use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

use crate::types::Millis;

/// Configuration for the tick driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// How often the coordinator runs one processing tick
    pub interval_ms: Millis,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { interval_ms: 50 }
    }
}

/// Configuration for the per-domain event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Maximum number of queued events per domain before the oldest are dropped
    pub max_batch_per_domain: usize,
    /// Number of delivered events retained for diagnostics (0 disables history)
    pub history_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_batch_per_domain: 1024,
            history_capacity: 256,
        }
    }
}

/// Configuration for scoped coordination message delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBusConfig {
    /// Messages delivered per scope per tick; the rest are deferred
    pub per_scope_budget: usize,
    /// Used to decide whether a deferred message would expire before the next tick
    pub tick_interval_ms: Millis,
    /// Undrained messages an inbox keeps; the oldest are dropped past this
    pub max_inbox_len: usize,
}

impl Default for MessageBusConfig {
    fn default() -> Self {
        Self {
            per_scope_budget: 256,
            tick_interval_ms: TickConfig::default().interval_ms,
            max_inbox_len: 4_096,
        }
    }
}

/// Configuration for claim arbitration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// How long a pending claim collects competing claims before confirmation
    pub arbitration_window_ms: Millis,
    /// Upper bound on the lease a claimant may request
    pub max_lease_ms: Millis,
    /// Upper bound on simultaneously tracked claim records
    pub max_active_claims: usize,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            arbitration_window_ms: 200,
            max_lease_ms: 10_000,
            max_active_claims: 65_536,
        }
    }
}

/// Configuration for content classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Consecutive observations required before a new classification is reported
    pub dwell_ticks: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { dwell_ticks: 2 }
    }
}

/// Top-level configuration for the coordination core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinationConfig {
    pub tick: TickConfig,
    pub event_bus: EventBusConfig,
    pub message_bus: MessageBusConfig,
    pub claims: ClaimConfig,
    pub context: ContextConfig,
}

impl CoordinationConfig {
    /// Builds the default configuration with `CLAIMBUS_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        override_from_env("CLAIMBUS_TICK_MS", &mut config.tick.interval_ms);
        override_from_env(
            "CLAIMBUS_EVENT_BATCH",
            &mut config.event_bus.max_batch_per_domain,
        );
        override_from_env(
            "CLAIMBUS_EVENT_HISTORY",
            &mut config.event_bus.history_capacity,
        );
        override_from_env(
            "CLAIMBUS_SCOPE_BUDGET",
            &mut config.message_bus.per_scope_budget,
        );
        override_from_env("CLAIMBUS_INBOX_CAP", &mut config.message_bus.max_inbox_len);
        override_from_env(
            "CLAIMBUS_ARBITRATION_WINDOW_MS",
            &mut config.claims.arbitration_window_ms,
        );
        override_from_env("CLAIMBUS_MAX_LEASE_MS", &mut config.claims.max_lease_ms);
        override_from_env(
            "CLAIMBUS_MAX_ACTIVE_CLAIMS",
            &mut config.claims.max_active_claims,
        );
        override_from_env("CLAIMBUS_DWELL_TICKS", &mut config.context.dwell_ticks);

        // The message bus must agree with the driver about when the next tick happens
        config.message_bus.tick_interval_ms = config.tick.interval_ms;

        config
    }
}

fn override_from_env<T>(key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Ok(raw) = std::env::var(key) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => {
            info!(key = key, value = %value, "Config override from environment");
            *slot = value;
        }
        Err(_) => {
            warn!(key = key, raw = %raw, "Ignoring unparsable config override");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = CoordinationConfig::default();

        assert_eq!(config.claims.arbitration_window_ms, 200);
        assert_eq!(config.context.dwell_ticks, 2);
        assert_eq!(config.message_bus.per_scope_budget, 256);
        assert_eq!(
            config.message_bus.tick_interval_ms,
            config.tick.interval_ms
        );
    }

    #[test]
    fn test_env_override_and_bad_values() {
        std::env::set_var("CLAIMBUS_TICK_MS", "20");
        std::env::set_var("CLAIMBUS_SCOPE_BUDGET", "not-a-number");

        let config = CoordinationConfig::from_env();

        std::env::remove_var("CLAIMBUS_TICK_MS");
        std::env::remove_var("CLAIMBUS_SCOPE_BUDGET");

        assert_eq!(config.tick.interval_ms, 20);
        assert_eq!(config.message_bus.tick_interval_ms, 20);
        assert_eq!(config.message_bus.per_scope_budget, 256);
    }
}
