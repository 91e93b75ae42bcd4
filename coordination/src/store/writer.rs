//! Single persistence writer.
//!
//! The orchestrator never touches the log file itself. It sends commands to
//! this task, which runs them one at a time on the blocking pool, so every
//! read-modify-write is serialized and generation never waits on disk I/O.
//! Failures are logged and published as `PersistenceFailed`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::log::{StoreError, StoreResult};
use super::records::SnapshotUpdate;
use super::snapshots::SnapshotStore;
use crate::events::{BriefEvent, EventBus};

#[derive(Debug)]
enum WriteCommand {
    Ensure {
        document_id: String,
        title: String,
    },
    Update {
        document_id: String,
        title: String,
        update: SnapshotUpdate,
    },
    Flush(oneshot::Sender<()>),
}

/// Cloneable sender side of the persistence writer.
#[derive(Debug, Clone)]
pub struct StoreWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl StoreWriter {
    /// Spawn the writer task. It exits once every `StoreWriter` clone is dropped.
    pub fn spawn(store: Arc<SnapshotStore>, bus: EventBus) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, bus, rx));
        (Self { tx }, handle)
    }

    pub fn ensure_snapshot(&self, document_id: &str, title: &str) {
        self.send(WriteCommand::Ensure {
            document_id: document_id.to_string(),
            title: title.to_string(),
        });
    }

    /// Queue a merge; empty updates are dropped here.
    pub fn append_update(&self, document_id: &str, title: &str, update: SnapshotUpdate) {
        if update.is_empty() {
            return;
        }
        self.send(WriteCommand::Update {
            document_id: document_id.to_string(),
            title: title.to_string(),
            update,
        });
    }

    /// Wait until every command queued before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(WriteCommand::Flush(tx));
        let _ = rx.await;
    }

    fn send(&self, command: WriteCommand) {
        if self.tx.send(command).is_err() {
            warn!("persistence writer has stopped; dropping write");
        }
    }
}

async fn run_writer(
    store: Arc<SnapshotStore>,
    bus: EventBus,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    while let Some(command) = rx.recv().await {
        let (document_id, result) = match command {
            WriteCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WriteCommand::Ensure { document_id, title } => {
                let store = Arc::clone(&store);
                let id = document_id.clone();
                let result =
                    blocking(move || store.ensure_snapshot(&id, &title).map(|_| ())).await;
                (document_id, result)
            }
            WriteCommand::Update {
                document_id,
                title,
                update,
            } => {
                let store = Arc::clone(&store);
                let id = document_id.clone();
                let result =
                    blocking(move || store.append_update(&id, &title, &update).map(|_| ())).await;
                (document_id, result)
            }
        };

        match result {
            Ok(()) => debug!(document_id = %document_id, "persisted"),
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "snapshot write failed");
                bus.publish(BriefEvent::PersistenceFailed {
                    document_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
    debug!("persistence writer stopped");
}

async fn blocking<F>(f: F) -> StoreResult<()>
where
    F: FnOnce() -> StoreResult<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::SectionKind;
    use crate::store::records::{SectionMetadata, MESSAGE_ANSWER};
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_apply_in_order() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("kb.json")));
        let (writer, _handle) = StoreWriter::spawn(Arc::clone(&store), EventBus::new());

        writer.ensure_snapshot("doc", "Title");
        writer.append_update(
            "doc",
            "Title",
            SnapshotUpdate::section(
                SectionKind::Summary,
                Some(vec!["a".into()]),
                SectionMetadata::completed(SectionKind::Summary, 3),
            ),
        );
        writer.append_update("doc", "Title", SnapshotUpdate::message(MESSAGE_ANSWER, "42"));
        writer.flush().await;

        let snapshots = store.load_snapshots().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].messages.len(), 1);
        assert_eq!(snapshots[0].section_metadata.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_published() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, "{broken").unwrap();
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (writer, _handle) = StoreWriter::spawn(Arc::new(SnapshotStore::new(path)), bus);

        writer.ensure_snapshot("doc", "Title");
        writer.flush().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "persistence_failed");
        assert_eq!(event.document_id(), "doc");
    }
}
