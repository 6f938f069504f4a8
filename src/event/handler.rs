use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::events::Event;

/// Errors a handler can report back to the bus
///
/// The bus never propagates these; they are logged with the offending event
/// and the rest of the batch keeps running.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Handler failed: {0}")]
    Failed(String),
}

impl EventError {
    pub fn failed(msg: impl Into<String>) -> Self {
        EventError::Failed(msg.into())
    }
}

/// A registered reaction to events of one kind
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), EventError> + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
