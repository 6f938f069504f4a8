// Group scopes: who is coordinating with whom

// Public API - what other modules can use
pub use registry::{GroupRegistry, GroupScope, MembershipChange, MembershipUpdate};

// Internal modules
mod registry;
