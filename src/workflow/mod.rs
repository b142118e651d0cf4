//! Session workflow: state machine, orchestration and metrics

pub mod metrics;
mod orchestrator;
pub mod state;

pub use orchestrator::{FileOutcome, InputFile, Orchestrator, SessionResult};
pub use state::{SessionState, StateMachine};
