//! Reading-brief coordination library.
//!
//! Turns a long document into a three-section reading brief generated by a
//! pluggable text-generation backend:
//!
//! - [`context_packer`]: paragraph chunking, boilerplate and duplicate
//!   removal, per-section budget clipping.
//! - [`generator`]: the generation client seam and the section adapter
//!   (bullet normalisation, deadlines, prompt cancellation).
//! - [`orchestrator`]: one concurrent task per section, per-kind state
//!   machine, retries, cancellation, and an actor handle.
//! - [`scheduler`]: holds follow-up questions until no section is running.
//! - [`store`]: the knowledge-base log of notes and per-document
//!   conversation snapshots.
//! - [`events`]: broadcast status surface for presentation layers.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use coordination::{spawn_orchestrator, BriefConfig, Document, SnapshotStore};
//!
//! let config = BriefConfig::from_env()?;
//! let store = Arc::new(SnapshotStore::new(&config.knowledge_base));
//! let handle = spawn_orchestrator(config, client, Some(store));
//! let mut events = handle.subscribe();
//!
//! handle.start_all(Document::new("2401.00001", "A Paper", text)).await?;
//! handle.submit_question("What dataset is used?").await?;
//! let status = handle.wait_idle().await?;
//! ```

pub mod config;
pub mod context_packer;
pub mod events;
pub mod generator;
pub mod jobs;
pub mod orchestrator;
pub mod scheduler;
pub mod sections;
pub mod store;

pub use config::{BriefConfig, ConfigError, SectionBudgets};
pub use context_packer::{Chunk, ContextPackage, ContextPacker};
pub use events::{BriefEvent, EventBus, EventFilter, FilteredReceiver};
pub use generator::{
    DeltaCallback, GenerationClient, GenerationError, OneShot, RetryCategory, SectionCompletion,
    SectionGenerator, SectionRequest,
};
pub use jobs::{IllegalTransition, JobSnapshot, JobStatus, SectionPhase, SectionState};
pub use orchestrator::{
    spawn_orchestrator, BriefOrchestrator, BriefStatus, OrchestratorError, OrchestratorHandle,
};
pub use scheduler::{DependentWorkScheduler, PendingQuestion, SubmitOutcome};
pub use sections::{Document, SectionDelta, SectionKind};
pub use store::{
    ConversationSnapshot, Note, SnapshotStore, SnapshotUpdate, StoreError, StoreWriter,
};
