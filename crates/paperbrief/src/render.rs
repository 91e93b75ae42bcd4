//! Plain-text rendering of brief events and stored records for the terminal.

use std::fmt::Write as _;

use coordination::store::{STATUS_COMPLETED, STATUS_FAILED};
use coordination::{BriefEvent, BriefStatus, ConversationSnapshot, Note, SectionKind, SectionPhase};

/// Line(s) printed for an event, or `None` for progress-only events.
pub fn render_event(event: &BriefEvent) -> Option<String> {
    match event {
        BriefEvent::SectionSucceeded { kind, bullets, .. } => Some(render_section(*kind, bullets)),
        BriefEvent::SectionFailed {
            kind,
            error,
            retriable,
            ..
        } => {
            let hint = if *retriable { " (retriable)" } else { "" };
            Some(format!("## {}\n[failed] {error}{hint}\n", kind.title()))
        }
        BriefEvent::SectionCancelled { kind, .. } => {
            Some(format!("## {}\n[cancelled]\n", kind.title()))
        }
        BriefEvent::QuestionQueued {
            position, question, ..
        } => Some(format!("[queued #{position}] {question}")),
        BriefEvent::QuestionAnswered {
            question, answer, ..
        } => Some(format!("Q: {question}\nA: {answer}\n")),
        BriefEvent::QuestionFailed {
            question, error, ..
        } => Some(format!("Q: {question}\n[failed] {error}\n")),
        BriefEvent::PersistenceFailed { error, .. } => Some(format!("[not saved] {error}")),
        BriefEvent::SectionStarted { .. }
        | BriefEvent::SectionDelta { .. }
        | BriefEvent::QuestionDispatched { .. } => None,
    }
}

pub fn render_section(kind: SectionKind, bullets: &[String]) -> String {
    let mut out = format!("## {}\n", kind.title());
    for bullet in bullets {
        let _ = writeln!(out, "- {bullet}");
    }
    out
}

/// One line per section: `summary: succeeded (5 bullets)`.
pub fn render_status(status: &BriefStatus) -> String {
    let mut out = String::new();
    for (kind, state) in &status.sections {
        let detail = match state.phase {
            SectionPhase::Succeeded => format!("{} bullets", state.bullets.len()),
            SectionPhase::Failed => state.error.clone().unwrap_or_default(),
            _ => String::new(),
        };
        if detail.is_empty() {
            let _ = writeln!(out, "{kind}: {}", state.phase);
        } else {
            let _ = writeln!(out, "{kind}: {} ({detail})", state.phase);
        }
    }
    out
}

pub fn render_note(note: &Note) -> String {
    let kind = if note.kind.is_empty() { "note" } else { &note.kind };
    format!(
        "{} [{kind}] {}\n  {}\n  ({} / {})",
        note.created_at.format("%Y-%m-%d %H:%M"),
        note.title,
        note.body,
        note.document_id,
        note.document_title,
    )
}

/// `id  title  summary=completed technical=failed deepDive=-  messages=2 notes=0`
pub fn render_snapshot(snapshot: &ConversationSnapshot) -> String {
    let sections = SectionKind::ALL
        .iter()
        .map(|kind| {
            let status = match snapshot.metadata(*kind) {
                Some(meta) if meta.status == STATUS_COMPLETED => STATUS_COMPLETED,
                Some(meta) if meta.status == STATUS_FAILED => STATUS_FAILED,
                _ => "-",
            };
            format!("{kind}={status}")
        })
        .collect::<Vec<_>>()
        .join(" ");
    let mut line = format!(
        "{}  {}  {sections}  messages={} notes={}",
        snapshot.document_id,
        snapshot.document_title,
        snapshot.messages.len(),
        snapshot.notes.len(),
    );
    if let Some(ref llm) = snapshot.llm {
        let _ = write!(line, "  llm={}", llm.provider);
    }
    line
}
