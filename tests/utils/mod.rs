pub mod assertions;
pub mod recorder;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{ClaimAssertion, EventAssertion};
#[allow(unused_imports)]
pub use recorder::EventRecorder;
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
