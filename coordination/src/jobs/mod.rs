//! Section lifecycle state and job snapshots.

pub mod snapshot;
pub mod state;

pub use snapshot::{JobSnapshot, JobStatus, QUESTION_JOB_KIND};
pub use state::{IllegalTransition, SectionBoard, SectionPhase, SectionState, TransitionRecord};
