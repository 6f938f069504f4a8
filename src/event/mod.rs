// Event bus: typed, per-domain publish/subscribe
//
// Events are buffered per domain and delivered in one batch per tick.
// The bus knows nothing about claims; it only moves facts around.

// Public API - what other modules can use
pub use bus::{EventBus, EventBusStats};
pub use events::{Domain, Event, EventKind, EventPayload, EventSource};
pub use handler::{EventError, EventHandler, SubscriptionId};
pub use history::EventHistory;

// Internal modules
mod bus;
mod events;
mod handler;
mod history;
