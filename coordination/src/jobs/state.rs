//! Per-section state machine with explicit legal-transition guards.
//!
//! Every section kind moves through `Idle -> Running -> {Succeeded | Failed}`.
//! `Failed` re-enters `Running` on retry, any phase re-enters `Running` when a
//! new document run starts, and `Running -> Idle` records a cancellation.
//! Every accepted transition is appended to the board's transition log.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sections::SectionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl SectionPhase {
    /// Succeeded or Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Only a running section blocks dependent work.
    pub fn blocks_dependents(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for SectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// ```text
/// Idle      -> Running
/// Running   -> Running (replaced) | Succeeded | Failed | Idle (cancelled)
/// Succeeded -> Running (new run)
/// Failed    -> Running (retry or new run)
/// ```
fn is_legal_transition(from: SectionPhase, to: SectionPhase) -> bool {
    use SectionPhase::*;
    matches!(
        (from, to),
        (_, Running) | (Running, Succeeded) | (Running, Failed) | (Running, Idle)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal section transition for {kind}: {from} -> {to}")]
pub struct IllegalTransition {
    pub kind: SectionKind,
    pub from: SectionPhase,
    pub to: SectionPhase,
}

/// Display state for one section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionState {
    pub phase: SectionPhase,
    /// Accumulated bullets from the latest delta of the current run.
    pub bullets: Vec<String>,
    pub error: Option<String>,
}

impl SectionState {
    pub fn loading(&self) -> bool {
        self.phase == SectionPhase::Running
    }

    pub fn completed(&self) -> bool {
        self.phase == SectionPhase::Succeeded
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub kind: SectionKind,
    pub from: SectionPhase,
    pub to: SectionPhase,
    /// Milliseconds since the board was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// State for every section kind of the active document.
#[derive(Debug, Clone)]
pub struct SectionBoard {
    states: BTreeMap<SectionKind, SectionState>,
    transitions: Vec<TransitionRecord>,
    created_at: Instant,
}

impl Default for SectionBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBoard {
    pub fn new() -> Self {
        Self {
            states: SectionKind::ALL
                .iter()
                .map(|&kind| (kind, SectionState::default()))
                .collect(),
            transitions: Vec::new(),
            created_at: Instant::now(),
        }
    }

    pub fn get(&self, kind: SectionKind) -> &SectionState {
        // Every kind is inserted in `new`.
        &self.states[&kind]
    }

    pub fn phase(&self, kind: SectionKind) -> SectionPhase {
        self.get(kind).phase
    }

    pub fn states(&self) -> &BTreeMap<SectionKind, SectionState> {
        &self.states
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// True when no kind is running.
    pub fn all_settled(&self) -> bool {
        self.states.values().all(|s| !s.phase.blocks_dependents())
    }

    /// Move `kind` to `to`, clearing or recording state for the new phase.
    pub fn advance(
        &mut self,
        kind: SectionKind,
        to: SectionPhase,
        reason: Option<String>,
    ) -> Result<(), IllegalTransition> {
        let state = self.states.entry(kind).or_default();
        let from = state.phase;
        if !is_legal_transition(from, to) {
            warn!(kind = %kind, %from, %to, "rejected section transition");
            return Err(IllegalTransition { kind, from, to });
        }

        match to {
            SectionPhase::Running => {
                state.bullets.clear();
                state.error = None;
            }
            SectionPhase::Failed => state.error = reason.clone(),
            SectionPhase::Succeeded | SectionPhase::Idle => state.error = None,
        }
        state.phase = to;

        debug!(kind = %kind, %from, %to, "section transition");
        self.transitions.push(TransitionRecord {
            kind,
            from,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason,
        });
        Ok(())
    }

    /// Replace the accumulated bullets of a running section.
    pub fn set_bullets(&mut self, kind: SectionKind, bullets: Vec<String>) {
        if let Some(state) = self.states.get_mut(&kind) {
            state.bullets = bullets;
        }
    }
}
