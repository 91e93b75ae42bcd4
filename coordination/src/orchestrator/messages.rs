//! Messages flowing from spawned tasks back to the orchestrator, and the
//! read-only status view it exposes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::generator::GenerationError;
use crate::jobs::{JobSnapshot, SectionState};
use crate::sections::{SectionDelta, SectionKind};

/// Sent by section and answer tasks. Tagged with the document and run
/// generation so the orchestrator can discard output from superseded runs.
#[derive(Debug)]
pub(crate) enum TaskMessage {
    Delta {
        document_id: String,
        generation: u64,
        delta: SectionDelta,
    },
    SectionFinished {
        document_id: String,
        generation: u64,
        kind: SectionKind,
        result: Result<Vec<String>, GenerationError>,
    },
    QuestionFinished {
        document_id: String,
        arrival: u64,
        result: Result<String, GenerationError>,
    },
}

/// Point-in-time view for a presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct BriefStatus {
    pub document_id: Option<String>,
    pub sections: BTreeMap<SectionKind, SectionState>,
    /// Last job snapshot per kind.
    pub jobs: BTreeMap<SectionKind, JobSnapshot>,
    pub question_job: Option<JobSnapshot>,
    pub queued_questions: usize,
    /// No section is running.
    pub ready: bool,
}

impl BriefStatus {
    pub fn section(&self, kind: SectionKind) -> Option<&SectionState> {
        self.sections.get(&kind)
    }
}
