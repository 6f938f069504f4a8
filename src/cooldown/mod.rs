// Cooldown tracking: raw ability notifications in, normalized availability events out

// Public API - what other modules can use
pub use models::{CooldownStats, RawStateChange, ResourceState, UpdateOutcome};
pub use tracker::CooldownTracker;

// Internal modules
mod models;
mod tracker;
