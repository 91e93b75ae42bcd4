//! Snapshot Store: the append-only knowledge-base log of notes and
//! per-document conversation snapshots.

pub mod log;
pub mod records;
pub mod snapshots;
pub mod writer;

pub use log::{StoreError, StoreResult};
pub use records::{
    BriefSnapshot, ConversationMessage, ConversationSnapshot, LlmMetadata, Note, SectionMetadata,
    SnapshotNote, SnapshotUpdate, ENTRY_TYPE_CONVERSATION, ENTRY_TYPE_NOTE, MESSAGE_ANSWER,
    MESSAGE_QUESTION, STATUS_COMPLETED, STATUS_FAILED,
};
pub use snapshots::SnapshotStore;
pub use writer::StoreWriter;
