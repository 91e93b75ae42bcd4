//! Section Job Orchestrator and its actor handle.

pub mod engine;
pub mod handle;
pub mod messages;

pub use engine::BriefOrchestrator;
pub use handle::{spawn_orchestrator, OrchestratorHandle};
pub use messages::BriefStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no document has been started")]
    NoDocument,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("orchestrator is no longer running")]
    Stopped,
}
