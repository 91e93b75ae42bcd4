//! Event types published on the brief status surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::JobSnapshot;
use crate::sections::SectionKind;

/// Everything a presentation layer needs to follow one brief run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BriefEvent {
    /// A section task was launched
    SectionStarted {
        document_id: String,
        kind: SectionKind,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Cumulative progress for one section
    SectionDelta {
        document_id: String,
        kind: SectionKind,
        bullets: Vec<String>,
        done: bool,
        timestamp: DateTime<Utc>,
    },

    SectionSucceeded {
        document_id: String,
        kind: SectionKind,
        bullets: Vec<String>,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    SectionFailed {
        document_id: String,
        kind: SectionKind,
        error: String,
        retriable: bool,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Cancelled explicitly or superseded by a new run
    SectionCancelled {
        document_id: String,
        kind: SectionKind,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    QuestionQueued {
        document_id: String,
        arrival: u64,
        position: usize,
        question: String,
        timestamp: DateTime<Utc>,
    },

    QuestionDispatched {
        document_id: String,
        arrival: u64,
        question: String,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    QuestionAnswered {
        document_id: String,
        arrival: u64,
        question: String,
        answer: String,
        job: JobSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Answering failed, or the question was superseded before it ran
    QuestionFailed {
        document_id: String,
        arrival: u64,
        question: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job: Option<JobSnapshot>,
        timestamp: DateTime<Utc>,
    },

    /// A snapshot store write failed; generation state is unaffected
    PersistenceFailed {
        document_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl BriefEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SectionStarted { .. } => "section_started",
            Self::SectionDelta { .. } => "section_delta",
            Self::SectionSucceeded { .. } => "section_succeeded",
            Self::SectionFailed { .. } => "section_failed",
            Self::SectionCancelled { .. } => "section_cancelled",
            Self::QuestionQueued { .. } => "question_queued",
            Self::QuestionDispatched { .. } => "question_dispatched",
            Self::QuestionAnswered { .. } => "question_answered",
            Self::QuestionFailed { .. } => "question_failed",
            Self::PersistenceFailed { .. } => "persistence_failed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SectionStarted { timestamp, .. }
            | Self::SectionDelta { timestamp, .. }
            | Self::SectionSucceeded { timestamp, .. }
            | Self::SectionFailed { timestamp, .. }
            | Self::SectionCancelled { timestamp, .. }
            | Self::QuestionQueued { timestamp, .. }
            | Self::QuestionDispatched { timestamp, .. }
            | Self::QuestionAnswered { timestamp, .. }
            | Self::QuestionFailed { timestamp, .. }
            | Self::PersistenceFailed { timestamp, .. } => *timestamp,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Self::SectionStarted { document_id, .. }
            | Self::SectionDelta { document_id, .. }
            | Self::SectionSucceeded { document_id, .. }
            | Self::SectionFailed { document_id, .. }
            | Self::SectionCancelled { document_id, .. }
            | Self::QuestionQueued { document_id, .. }
            | Self::QuestionDispatched { document_id, .. }
            | Self::QuestionAnswered { document_id, .. }
            | Self::QuestionFailed { document_id, .. }
            | Self::PersistenceFailed { document_id, .. } => document_id,
        }
    }

    /// Section kind, for section events
    pub fn kind(&self) -> Option<SectionKind> {
        match self {
            Self::SectionStarted { kind, .. }
            | Self::SectionDelta { kind, .. }
            | Self::SectionSucceeded { kind, .. }
            | Self::SectionFailed { kind, .. }
            | Self::SectionCancelled { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn job(&self) -> Option<&JobSnapshot> {
        match self {
            Self::SectionStarted { job, .. }
            | Self::SectionSucceeded { job, .. }
            | Self::SectionFailed { job, .. }
            | Self::SectionCancelled { job, .. }
            | Self::QuestionDispatched { job, .. }
            | Self::QuestionAnswered { job, .. } => Some(job),
            Self::QuestionFailed { job, .. } => job.as_ref(),
            _ => None,
        }
    }

    /// Whether this event ends a section run
    pub fn is_section_terminal(&self) -> bool {
        matches!(
            self,
            Self::SectionSucceeded { .. } | Self::SectionFailed { .. } | Self::SectionCancelled { .. }
        )
    }
}
