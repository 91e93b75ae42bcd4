//! Job snapshots: the status-display record of one generation or answer task.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

static NEXT_JOB: AtomicU64 = AtomicU64::new(1);

/// Tag used for question-answer jobs.
pub const QUESTION_JOB_KIND: &str = "question";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Created when a task starts and mutated exactly once, on its terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub kind: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl JobSnapshot {
    pub fn start(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let n = NEXT_JOB.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{kind}-{n}"),
            kind,
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            error: String::new(),
        }
    }

    pub fn succeed(&mut self) -> bool {
        self.finish(JobStatus::Succeeded, String::new())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.finish(JobStatus::Failed, error.into())
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(JobStatus::Cancelled, String::new())
    }

    /// Elapsed time, measured to completion or to now while running.
    pub fn duration_ms(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Returns false, leaving the snapshot untouched, if it was already terminal.
    fn finish(&mut self, status: JobStatus, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        true
    }
}
