pub mod orchestrator;
pub mod progress;

pub use orchestrator::{RequestOrchestrator, Submission};
