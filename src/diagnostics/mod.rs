// Diagnostics: active claims and drop counters for operators

// Public API - what other modules can use
pub use dump::{DiagnosticsDump, GroupSummary, MessageBusSummary};
pub use handlers::{get_claim, get_diagnostics, list_claims, router};

// Internal modules
mod dump;
mod handlers;
