// Library crate for the claim-based multi-agent action bus
// This file exposes the public API for the binary and integration tests

pub mod claims;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod coordinator;
pub mod diagnostics;
pub mod event;
pub mod group;
pub mod message;
pub mod shared;
pub mod sim;
pub mod types;

// Re-export commonly used types for easier access in tests
pub use claims::{ClaimError, ClaimOutcome, ClaimRecord, ClaimState, SubmitOutcome};
pub use config::CoordinationConfig;
pub use coordinator::{start_tick_task, CoordinationError, Coordinator, SharedCoordinator, TickReport};
pub use event::{Event, EventBus, EventKind, EventPayload, EventSource};
pub use message::{CoordinationMessage, MessageError, MessageType, Scope};
pub use shared::{AppError, AppState};
pub use types::{ActionCategory, AgentId, GroupId, Millis, ResourceId, Role, TargetKey};
