// Message bus: scoped, rate-limited delivery of coordination messages

// Public API - what other modules can use
pub use bus::{DeliveryReport, InboxId, MessageBus};
pub use errors::MessageError;
pub use models::{
    Announcement, CoordinationMessage, MessageBusStats, MessageId, MessagePayload, MessageType,
    Scope, ScopeKey, DEFAULT_MESSAGE_TTL_MS,
};
pub use scope::resolve_recipients;

// Internal modules
mod bus;
mod errors;
mod models;
mod scope;
