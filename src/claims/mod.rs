// Claim resolver: priority arbitration so at most one agent acts on an opportunity

// Public API - what other modules can use
pub use errors::ClaimError;
pub use models::{
    ClaimOutcome, ClaimRecord, ClaimState, ClaimStats, ClaimSweep, Contender, ReleaseResult,
    SubmitOutcome, WithdrawOutcome,
};
pub use resolver::ClaimResolver;

// Internal modules
mod errors;
mod models;
mod resolver;
