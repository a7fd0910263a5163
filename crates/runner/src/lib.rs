//! `eventwatch-runner`: drives fetch → reconcile → persist for each city.
//!
//! A failed city never stops the others; everything that happened ends up
//! in the [`RunReport`].

pub mod bounded;
pub mod orchestrator;
pub mod phase;
pub mod report;
pub mod settings;
pub mod shutdown;

pub use orchestrator::Orchestrator;
pub use phase::{CyclePhase, TransitionError};
pub use report::{CycleOutcome, CycleReport, RunReport};
pub use settings::{RetryPolicy, RunSettings};
pub use shutdown::Shutdown;
