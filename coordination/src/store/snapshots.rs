//! Snapshot Store: read-modify-write access to the knowledge-base log.
//!
//! Every operation loads the whole log, edits it in memory and writes the
//! whole log back. A mutex serializes callers sharing one store; records of
//! other types are carried through untouched.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::log::{document_id, entry_type, read_entries, write_entries, StoreError, StoreResult};
use super::records::{
    ConversationSnapshot, Note, SnapshotUpdate, ENTRY_TYPE_CONVERSATION, ENTRY_TYPE_NOTE,
};

#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an empty snapshot for `document_id` unless one exists.
    /// Returns whether a record was written.
    pub fn ensure_snapshot(&self, document_id: &str, title: &str) -> StoreResult<bool> {
        if document_id.is_empty() {
            return Ok(false);
        }
        let _guard = self.guard();
        let mut entries = read_entries(&self.path)?;
        if find_conversation(&entries, document_id).is_some() {
            debug!(document_id, "snapshot already present");
            return Ok(false);
        }
        entries.push(serde_json::to_value(ConversationSnapshot::new(document_id, title))?);
        write_entries(&self.path, &entries)?;
        info!(document_id, path = %self.path.display(), "created conversation snapshot");
        Ok(true)
    }

    /// Merge `update` into the first snapshot for `document_id`, creating it
    /// if absent. An empty update performs no I/O and returns `false`.
    pub fn append_update(
        &self,
        document_id: &str,
        title: &str,
        update: &SnapshotUpdate,
    ) -> StoreResult<bool> {
        if document_id.is_empty() || update.is_empty() {
            return Ok(false);
        }
        let _guard = self.guard();
        let mut entries = read_entries(&self.path)?;

        match find_conversation(&entries, document_id) {
            Some(index) => {
                let mut snapshot: ConversationSnapshot =
                    serde_json::from_value(entries[index].clone()).map_err(|source| {
                        StoreError::Decode {
                            document_id: document_id.to_string(),
                            source,
                        }
                    })?;
                snapshot.merge(title, update);
                entries[index] = serde_json::to_value(&snapshot)?;
            }
            None => {
                let mut snapshot = ConversationSnapshot::new(document_id, title);
                snapshot.merge(title, update);
                entries.push(serde_json::to_value(&snapshot)?);
            }
        }

        write_entries(&self.path, &entries)?;
        debug!(
            document_id,
            messages = update.messages.len(),
            notes = update.notes.len(),
            metadata = update.section_metadata.len(),
            "snapshot updated"
        );
        Ok(true)
    }

    /// Every note record, in file order.
    pub fn load_notes(&self) -> StoreResult<Vec<Note>> {
        let _guard = self.guard();
        load_typed(&self.path, ENTRY_TYPE_NOTE)
    }

    /// Every conversation snapshot, in file order.
    pub fn load_snapshots(&self) -> StoreResult<Vec<ConversationSnapshot>> {
        let _guard = self.guard();
        load_typed(&self.path, ENTRY_TYPE_CONVERSATION)
    }

    /// First snapshot for `document_id`, if any.
    pub fn find_snapshot(&self, document_id: &str) -> StoreResult<Option<ConversationSnapshot>> {
        Ok(self
            .load_snapshots()?
            .into_iter()
            .find(|s| s.document_id == document_id))
    }

    /// Append note records.
    pub fn save_notes(&self, notes: &[Note]) -> StoreResult<()> {
        let values = notes
            .iter()
            .map(|note| {
                let mut note = note.clone();
                note.entry_type = ENTRY_TYPE_NOTE.to_string();
                serde_json::to_value(note)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.append_entries(values)
    }

    /// Append whole conversation snapshots as new records.
    pub fn save_snapshots(&self, snapshots: &[ConversationSnapshot]) -> StoreResult<()> {
        let values = snapshots
            .iter()
            .map(|snapshot| {
                let mut snapshot = snapshot.clone();
                snapshot.entry_type = ENTRY_TYPE_CONVERSATION.to_string();
                serde_json::to_value(snapshot)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.append_entries(values)
    }

    fn append_entries(&self, values: Vec<Value>) -> StoreResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let _guard = self.guard();
        let mut entries = read_entries(&self.path)?;
        entries.extend(values);
        write_entries(&self.path, &entries)
    }
}

fn find_conversation(entries: &[Value], id: &str) -> Option<usize> {
    entries.iter().position(|entry| {
        entry_type(entry) == Some(ENTRY_TYPE_CONVERSATION) && document_id(entry) == Some(id)
    })
}

/// Decode records tagged `wanted`. Records of that type that fail to decode
/// are skipped with a warning; other types are never decoded.
fn load_typed<T: DeserializeOwned>(path: &Path, wanted: &str) -> StoreResult<Vec<T>> {
    let entries = read_entries(path)?;
    let mut out = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        match entry_type(&entry) {
            Some(tag) if tag == wanted => {}
            Some(_) => continue,
            None => {
                warn!(index, path = %path.display(), "skipping record without a usable entry type");
                continue;
            }
        }
        match serde_json::from_value(entry) {
            Ok(record) => out.push(record),
            Err(e) => warn!(index, entry_type = wanted, error = %e, "skipping malformed record"),
        }
    }
    Ok(out)
}
