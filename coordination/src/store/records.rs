//! Record types persisted in the knowledge-base log.
//!
//! Field names are camelCase on disk. `paperId` / `paperTitle` are accepted
//! as aliases so logs written by earlier tooling keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sections::SectionKind;

/// Discriminator field carried by every record.
pub const ENTRY_TYPE_FIELD: &str = "entryType";
pub const ENTRY_TYPE_NOTE: &str = "note";
pub const ENTRY_TYPE_CONVERSATION: &str = "conversation";

/// Message kinds written by the orchestrator.
pub const MESSAGE_QUESTION: &str = "question";
pub const MESSAGE_ANSWER: &str = "answer";

/// Section metadata status values.
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

fn note_entry_type() -> String {
    ENTRY_TYPE_NOTE.to_string()
}

fn conversation_entry_type() -> String {
    ENTRY_TYPE_CONVERSATION.to_string()
}

/// A standalone knowledge note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default = "note_entry_type")]
    pub entry_type: String,
    #[serde(alias = "paperId")]
    pub document_id: String,
    #[serde(default, alias = "paperTitle")]
    pub document_title: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(
        document_id: impl Into<String>,
        document_title: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            entry_type: note_entry_type(),
            document_id: document_id.into(),
            document_title: document_title.into(),
            title: title.into(),
            body: body.into(),
            kind: kind.into(),
            created_at: Utc::now(),
        }
    }

    /// The same note in the shape embedded inside a conversation snapshot.
    pub fn to_snapshot_note(&self) -> SnapshotNote {
        SnapshotNote {
            title: self.title.clone(),
            body: self.body.clone(),
            kind: self.kind.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub kind: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNote {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// Latest bullets per section. Each field merges independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_dive: Option<Vec<String>>,
}

impl BriefSnapshot {
    pub fn with_section(kind: SectionKind, bullets: Vec<String>) -> Self {
        let mut brief = Self::default();
        brief.set(kind, bullets);
        brief
    }

    pub fn get(&self, kind: SectionKind) -> Option<&[String]> {
        match kind {
            SectionKind::Summary => self.summary.as_deref(),
            SectionKind::Technical => self.technical.as_deref(),
            SectionKind::DeepDive => self.deep_dive.as_deref(),
        }
    }

    pub fn set(&mut self, kind: SectionKind, bullets: Vec<String>) {
        let slot = match kind {
            SectionKind::Summary => &mut self.summary,
            SectionKind::Technical => &mut self.technical,
            SectionKind::DeepDive => &mut self.deep_dive,
        };
        *slot = Some(bullets);
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.technical.is_none() && self.deep_dive.is_none()
    }

    /// Overwrite every field `update` carries; leave the others alone.
    pub fn merge(&mut self, update: &BriefSnapshot) {
        for kind in SectionKind::ALL {
            if let Some(bullets) = update.get(kind) {
                self.set(kind, bullets.to_vec());
            }
        }
    }
}

/// Per-section status details. `kind` is the section tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duration_ms: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl SectionMetadata {
    pub fn completed(kind: SectionKind, duration_ms: u64) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            status: STATUS_COMPLETED.to_string(),
            error: String::new(),
            duration_ms,
        }
    }

    pub fn failed(kind: SectionKind, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            status: STATUS_FAILED.to_string(),
            error: error.into(),
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
}

/// Accumulated state for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    #[serde(default = "conversation_entry_type")]
    pub entry_type: String,
    #[serde(alias = "paperId")]
    pub document_id: String,
    #[serde(default, alias = "paperTitle")]
    pub document_title: String,
    #[serde(default)]
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ConversationMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<SnapshotNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<BriefSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section_metadata: Vec<SectionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmMetadata>,
}

impl ConversationSnapshot {
    pub fn new(document_id: impl Into<String>, document_title: impl Into<String>) -> Self {
        Self {
            entry_type: conversation_entry_type(),
            document_id: document_id.into(),
            document_title: document_title.into(),
            captured_at: Utc::now(),
            messages: Vec::new(),
            notes: Vec::new(),
            brief: None,
            section_metadata: Vec::new(),
            llm: None,
        }
    }

    /// Metadata entry for `kind`, if any.
    pub fn metadata(&self, kind: SectionKind) -> Option<&SectionMetadata> {
        self.section_metadata.iter().find(|m| m.kind == kind.as_str())
    }

    /// Fold `update` into this snapshot.
    pub fn merge(&mut self, title: &str, update: &SnapshotUpdate) {
        self.entry_type = conversation_entry_type();
        if self.document_title.is_empty() {
            self.document_title = title.to_string();
        }
        self.messages.extend(update.messages.iter().cloned());
        self.notes.extend(update.notes.iter().cloned());
        if let Some(ref brief) = update.brief {
            self.brief.get_or_insert_with(BriefSnapshot::default).merge(brief);
        }
        for meta in &update.section_metadata {
            if meta.kind.is_empty() {
                continue;
            }
            match self.section_metadata.iter_mut().find(|m| m.kind == meta.kind) {
                Some(existing) => *existing = meta.clone(),
                None => self.section_metadata.push(meta.clone()),
            }
        }
        if update.llm.is_some() {
            self.llm = update.llm.clone();
        }
    }
}

/// Incremental change merged into a document's snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub messages: Vec<ConversationMessage>,
    pub notes: Vec<SnapshotNote>,
    pub brief: Option<BriefSnapshot>,
    pub section_metadata: Vec<SectionMetadata>,
    /// Applied only alongside some other payload.
    pub llm: Option<LlmMetadata>,
}

impl SnapshotUpdate {
    pub fn message(kind: &str, content: impl Into<String>) -> Self {
        Self {
            messages: vec![ConversationMessage::new(kind, content)],
            ..Self::default()
        }
    }

    pub fn note(note: SnapshotNote) -> Self {
        Self {
            notes: vec![note],
            ..Self::default()
        }
    }

    pub fn section(kind: SectionKind, bullets: Option<Vec<String>>, metadata: SectionMetadata) -> Self {
        Self {
            brief: bullets.map(|b| BriefSnapshot::with_section(kind, b)),
            section_metadata: vec![metadata],
            ..Self::default()
        }
    }

    pub fn with_llm(mut self, llm: Option<LlmMetadata>) -> Self {
        self.llm = llm;
        self
    }

    /// No messages, notes, bullets or metadata.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.notes.is_empty()
            && self.brief.as_ref().map_or(true, BriefSnapshot::is_empty)
            && self.section_metadata.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_paper_fields_are_accepted() {
        let raw = r#"{"paperId":"p1","paperTitle":"Old","title":"t","body":"b","kind":"method","createdAt":"2024-01-01T00:00:00Z"}"#;
        let note: Note = serde_json::from_str(raw).unwrap();
        assert_eq!(note.document_id, "p1");
        assert_eq!(note.document_title, "Old");
        assert_eq!(note.entry_type, ENTRY_TYPE_NOTE);
    }

    #[test]
    fn metadata_merges_by_kind() {
        let mut snap = ConversationSnapshot::new("d", "T");
        let first = SnapshotUpdate::section(
            SectionKind::Summary,
            None,
            SectionMetadata::failed(SectionKind::Summary, "boom", 10),
        );
        let second = SnapshotUpdate::section(
            SectionKind::Summary,
            Some(vec!["ok".into()]),
            SectionMetadata::completed(SectionKind::Summary, 20),
        );
        snap.merge("T", &first);
        snap.merge("T", &second);
        assert_eq!(snap.section_metadata.len(), 1);
        let meta = snap.metadata(SectionKind::Summary).unwrap();
        assert_eq!(meta.status, STATUS_COMPLETED);
        assert_eq!(meta.error, "");
        assert_eq!(meta.duration_ms, 20);
    }

    #[test]
    fn brief_fields_merge_independently() {
        let mut snap = ConversationSnapshot::new("d", "T");
        snap.merge(
            "T",
            &SnapshotUpdate {
                brief: Some(BriefSnapshot::with_section(SectionKind::Summary, vec!["s".into()])),
                ..SnapshotUpdate::default()
            },
        );
        snap.merge(
            "T",
            &SnapshotUpdate {
                brief: Some(BriefSnapshot::with_section(SectionKind::DeepDive, vec!["d".into()])),
                ..SnapshotUpdate::default()
            },
        );
        let brief = snap.brief.unwrap();
        assert_eq!(brief.summary, Some(vec!["s".to_string()]));
        assert_eq!(brief.deep_dive, Some(vec!["d".to_string()]));
        assert_eq!(brief.technical, None);
    }

    #[test]
    fn llm_metadata_survives_updates_without_it() {
        let mut snap = ConversationSnapshot::new("d", "T");
        let llm = LlmMetadata {
            provider: "ollama".into(),
            model: "m".into(),
        };
        snap.merge("T", &SnapshotUpdate::message(MESSAGE_QUESTION, "q").with_llm(Some(llm.clone())));
        snap.merge("T", &SnapshotUpdate::message(MESSAGE_ANSWER, "a"));
        assert_eq!(snap.llm, Some(llm));
        assert_eq!(snap.messages.len(), 2);
    }

    #[test]
    fn llm_only_update_is_empty() {
        let update = SnapshotUpdate::default().with_llm(Some(LlmMetadata::default()));
        assert!(update.is_empty());
        let update = SnapshotUpdate {
            brief: Some(BriefSnapshot::default()),
            ..SnapshotUpdate::default()
        };
        assert!(update.is_empty());
    }

    #[test]
    fn empty_collections_are_omitted_on_disk() {
        let json = serde_json::to_value(ConversationSnapshot::new("d", "T")).unwrap();
        assert_eq!(json["entryType"], ENTRY_TYPE_CONVERSATION);
        assert!(json.get("messages").is_none());
        assert!(json.get("brief").is_none());
        assert!(json.get("sectionMetadata").is_none());
    }
}
