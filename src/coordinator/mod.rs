// Coordinator: owns every component and drives them one tick at a time

// Public API - what other modules can use
pub use errors::CoordinationError;
pub use service::{Coordinator, TickReport};
pub use task::{start_tick_task, SharedCoordinator};

// Internal modules
mod errors;
mod service;
mod task;
