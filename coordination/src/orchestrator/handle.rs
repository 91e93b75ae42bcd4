//! Actor wrapper: the orchestrator runs in its own task and is driven
//! through a cloneable [`OrchestratorHandle`].
//!
//! The loop multiplexes the command mailbox with task messages, so commands
//! and section output are applied strictly one at a time.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::engine::BriefOrchestrator;
use super::messages::BriefStatus;
use super::OrchestratorError;
use crate::config::BriefConfig;
use crate::events::{BriefEvent, EventBus, EventFilter, FilteredReceiver};
use crate::generator::GenerationClient;
use crate::scheduler::SubmitOutcome;
use crate::sections::{Document, SectionKind};
use crate::store::{SnapshotStore, StoreWriter};

const COMMAND_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    StartAll(Document, Reply<()>),
    SubmitQuestion(String, Reply<Result<SubmitOutcome<String>, OrchestratorError>>),
    Retry(SectionKind, Reply<Result<bool, OrchestratorError>>),
    Cancel(SectionKind, Reply<bool>),
    CancelAll(Reply<()>),
    Status(Reply<BriefStatus>),
    WaitIdle(Reply<BriefStatus>),
    Shutdown(Reply<()>),
}

#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Command>,
    bus: EventBus,
}

/// Move a new orchestrator into its own task.
///
/// With a store, snapshot writes go through a dedicated writer task and
/// failures surface as `PersistenceFailed` events.
pub fn spawn_orchestrator(
    config: BriefConfig,
    client: Arc<dyn GenerationClient>,
    store: Option<Arc<SnapshotStore>>,
) -> OrchestratorHandle {
    let bus = EventBus::with_capacity(config.event_capacity);
    let writer = store.map(|store| StoreWriter::spawn(store, bus.clone()).0);
    let orchestrator = BriefOrchestrator::new(&config, client, bus.clone(), writer);
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    tokio::spawn(run_actor(orchestrator, rx));
    OrchestratorHandle { tx, bus }
}

impl OrchestratorHandle {
    pub async fn start_all(&self, document: Document) -> Result<(), OrchestratorError> {
        self.request(|reply| Command::StartAll(document, reply)).await
    }

    pub async fn submit_question(
        &self,
        question: impl Into<String>,
    ) -> Result<SubmitOutcome<String>, OrchestratorError> {
        let question = question.into();
        self.request(|reply| Command::SubmitQuestion(question, reply))
            .await?
    }

    pub async fn retry(&self, kind: SectionKind) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Retry(kind, reply)).await?
    }

    pub async fn cancel(&self, kind: SectionKind) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Cancel(kind, reply)).await
    }

    pub async fn cancel_all(&self) -> Result<(), OrchestratorError> {
        self.request(Command::CancelAll).await
    }

    pub async fn status(&self) -> Result<BriefStatus, OrchestratorError> {
        self.request(Command::Status).await
    }

    /// Resolves once no section, answer or queued question is outstanding.
    pub async fn wait_idle(&self) -> Result<BriefStatus, OrchestratorError> {
        self.request(Command::WaitIdle).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BriefEvent> {
        self.bus.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        self.bus.subscribe_filtered(filter)
    }

    /// Cancel all work, flush pending snapshot writes, and stop the actor.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.request(Command::Shutdown).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| OrchestratorError::Stopped)?;
        rx.await.map_err(|_| OrchestratorError::Stopped)
    }
}

async fn run_actor(mut orchestrator: BriefOrchestrator, mut commands: mpsc::Receiver<Command>) {
    let mut idle_waiters: Vec<Reply<BriefStatus>> = Vec::new();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("all orchestrator handles dropped");
                    orchestrator.cancel_all();
                    orchestrator.flush_persistence().await;
                    break;
                };
                match command {
                    Command::StartAll(document, reply) => {
                        orchestrator.start_all(document);
                        let _ = reply.send(());
                    }
                    Command::SubmitQuestion(question, reply) => {
                        let _ = reply.send(orchestrator.submit_question(question));
                    }
                    Command::Retry(kind, reply) => {
                        let _ = reply.send(orchestrator.retry(kind));
                    }
                    Command::Cancel(kind, reply) => {
                        let _ = reply.send(orchestrator.cancel(kind));
                    }
                    Command::CancelAll(reply) => {
                        orchestrator.cancel_all();
                        let _ = reply.send(());
                    }
                    Command::Status(reply) => {
                        let _ = reply.send(orchestrator.status());
                    }
                    Command::WaitIdle(reply) => idle_waiters.push(reply),
                    Command::Shutdown(reply) => {
                        info!("orchestrator shutting down");
                        orchestrator.cancel_all();
                        orchestrator.flush_persistence().await;
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            Some(message) = orchestrator.next_message() => {
                orchestrator.on_task_message(message);
            }
        }

        if !idle_waiters.is_empty() && orchestrator.is_idle() {
            let status = orchestrator.status();
            for waiter in idle_waiters.drain(..) {
                let _ = waiter.send(status.clone());
            }
        }
    }
}
