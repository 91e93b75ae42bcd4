//! Section Job Orchestrator.
//!
//! Owns every piece of mutable brief state: per-kind section states, the
//! running task per kind, the question scheduler, and the active answer.
//! Spawned tasks never touch this state; they report over one mpsc channel
//! and the orchestrator applies their messages one at a time.
//!
//! Each launched run gets a fresh generation number and cancellation token.
//! Messages carrying a stale document id or generation are dropped, so a
//! superseded run can never write into the current one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{BriefStatus, TaskMessage};
use super::OrchestratorError;
use crate::config::BriefConfig;
use crate::context_packer::ContextPacker;
use crate::events::{BriefEvent, EventBus};
use crate::generator::{GenerationClient, GenerationError, SectionGenerator, SectionRequest};
use crate::jobs::{JobSnapshot, SectionBoard, SectionPhase, QUESTION_JOB_KIND};
use crate::scheduler::{DependentWorkScheduler, PendingQuestion, SubmitOutcome};
use crate::sections::{Document, SectionDelta, SectionKind};
use crate::store::{
    LlmMetadata, SectionMetadata, SnapshotUpdate, StoreWriter, MESSAGE_ANSWER, MESSAGE_QUESTION,
};

/// At most one answer runs at a time.
const MAX_CONCURRENT_ANSWERS: usize = 1;

struct SectionRun {
    generation: u64,
    cancel: CancellationToken,
    job: JobSnapshot,
}

struct QuestionRun {
    document_id: String,
    arrival: u64,
    question: String,
    cancel: CancellationToken,
    job: JobSnapshot,
}

pub struct BriefOrchestrator {
    packer: ContextPacker,
    generator: SectionGenerator,
    bus: EventBus,
    writer: Option<StoreWriter>,
    limiter: Option<Arc<Semaphore>>,
    llm: Option<LlmMetadata>,

    document: Option<Arc<Document>>,
    board: SectionBoard,
    runs: BTreeMap<SectionKind, SectionRun>,
    jobs: BTreeMap<SectionKind, JobSnapshot>,
    next_generation: u64,

    scheduler: DependentWorkScheduler<String>,
    active_question: Option<QuestionRun>,
    question_job: Option<JobSnapshot>,

    tx: mpsc::UnboundedSender<TaskMessage>,
    rx: mpsc::UnboundedReceiver<TaskMessage>,
}

impl BriefOrchestrator {
    pub fn new(
        config: &BriefConfig,
        client: Arc<dyn GenerationClient>,
        bus: EventBus,
        writer: Option<StoreWriter>,
    ) -> Self {
        let llm = Some(LlmMetadata {
            provider: client.name().to_string(),
            model: client.model().unwrap_or_default().to_string(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            packer: ContextPacker::new(config.budgets),
            generator: SectionGenerator::new(client, config.section_timeout()),
            bus,
            writer,
            limiter: config
                .max_concurrent_sections
                .map(|n| Arc::new(Semaphore::new(n))),
            llm,
            document: None,
            board: SectionBoard::new(),
            runs: BTreeMap::new(),
            jobs: BTreeMap::new(),
            next_generation: 0,
            scheduler: DependentWorkScheduler::new(Some(MAX_CONCURRENT_ANSWERS)),
            active_question: None,
            question_job: None,
            tx,
            rx,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_deref()
    }

    pub fn phase(&self, kind: SectionKind) -> SectionPhase {
        self.board.phase(kind)
    }

    /// No section, answer, or queued question outstanding.
    pub fn is_idle(&self) -> bool {
        self.runs.is_empty() && self.active_question.is_none() && self.scheduler.queued() == 0
    }

    pub fn status(&self) -> BriefStatus {
        BriefStatus {
            document_id: self.document.as_ref().map(|d| d.id.clone()),
            sections: self.board.states().clone(),
            jobs: self.jobs.clone(),
            question_job: self.question_job.clone(),
            queued_questions: self.scheduler.queued(),
            ready: self.scheduler.is_ready(),
        }
    }

    /// Package every kind and launch one task per kind.
    ///
    /// A different document supersedes everything: queued questions fail
    /// with a "superseded" error, the running answer and all section tasks
    /// are cancelled. The same document restarts each kind in place.
    pub fn start_all(&mut self, document: Document) {
        let switching = self
            .document
            .as_ref()
            .map_or(true, |current| current.id != document.id);
        if switching {
            self.supersede_questions();
            self.cancel_question("superseded by a new document");
            for kind in SectionKind::ALL {
                self.cancel(kind);
            }
            self.board = SectionBoard::new();
            self.jobs.clear();
        }

        let document = Arc::new(document);
        self.document = Some(Arc::clone(&document));
        if let Some(writer) = &self.writer {
            writer.ensure_snapshot(&document.id, &document.title);
        }

        let package = self.packer.pack(&document.full_text);
        info!(
            document_id = %document.id,
            chunks = package.chunks.len(),
            "starting brief"
        );
        for kind in SectionKind::ALL {
            self.launch(kind, package.section(kind).to_string());
        }
    }

    /// Re-run `kind` if it failed or never ran. Returns whether a run started.
    pub fn retry(&mut self, kind: SectionKind) -> Result<bool, OrchestratorError> {
        let document = self.document.clone().ok_or(OrchestratorError::NoDocument)?;
        match self.board.phase(kind) {
            SectionPhase::Failed | SectionPhase::Idle => {}
            phase => {
                debug!(kind = %kind, %phase, "retry ignored");
                return Ok(false);
            }
        }
        let context = self.packer.pack_section(kind, &document.full_text);
        info!(kind = %kind, document_id = %document.id, "retrying section");
        self.launch(kind, context);
        Ok(true)
    }

    /// Cancel the running task for `kind`; the kind returns to idle.
    pub fn cancel(&mut self, kind: SectionKind) -> bool {
        if !self.abort_run(kind, "cancelled") {
            return false;
        }
        if let Err(e) = self
            .board
            .advance(kind, SectionPhase::Idle, Some("cancelled".into()))
        {
            warn!(error = %e, "cancel transition rejected");
        }
        self.section_settled(kind);
        true
    }

    /// Cancel the running answer and every section task. Queued questions
    /// stay queued and are released once readiness holds.
    pub fn cancel_all(&mut self) {
        self.cancel_question("cancelled");
        for kind in SectionKind::ALL {
            self.cancel(kind);
        }
    }

    /// Queue a question, or start answering it when the brief is settled.
    pub fn submit_question(
        &mut self,
        question: impl Into<String>,
    ) -> Result<SubmitOutcome<String>, OrchestratorError> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(OrchestratorError::EmptyQuestion);
        }
        let document = self.document.clone().ok_or(OrchestratorError::NoDocument)?;
        self.persist(SnapshotUpdate::message(MESSAGE_QUESTION, question.clone()));

        let outcome = self.scheduler.submit(question.clone());
        match &outcome {
            SubmitOutcome::Dispatched(item) => self.dispatch_question(item.clone()),
            SubmitOutcome::Queued { arrival, position } => {
                info!(document_id = %document.id, arrival, position, "question queued");
                self.bus.publish(BriefEvent::QuestionQueued {
                    document_id: document.id.clone(),
                    arrival: *arrival,
                    position: *position,
                    question,
                    timestamp: Utc::now(),
                });
            }
        }
        Ok(outcome)
    }

    /// Apply a delta for the active document. Ignored unless `delta.kind`
    /// is running for `document_id`.
    pub fn handle_delta(&mut self, document_id: &str, delta: SectionDelta) -> bool {
        if !self.is_active(document_id) || !self.runs.contains_key(&delta.kind) {
            debug!(document_id, kind = %delta.kind, "discarding delta for inactive section");
            return false;
        }
        self.apply_delta(delta);
        true
    }

    /// Record a failure for a running kind. Siblings are untouched.
    pub fn handle_failure(
        &mut self,
        document_id: &str,
        kind: SectionKind,
        error: GenerationError,
    ) -> bool {
        if !self.is_active(document_id) || !self.runs.contains_key(&kind) {
            debug!(document_id, kind = %kind, "discarding failure for inactive section");
            return false;
        }
        if error.is_cancelled() {
            return self.cancel(kind);
        }
        self.fail_section(kind, error);
        true
    }

    /// Wait for the next task message and apply it.
    pub async fn process_next(&mut self) {
        if let Some(message) = self.next_message().await {
            self.on_task_message(message);
        }
    }

    /// Process task messages until [`Self::is_idle`] holds.
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            self.process_next().await;
        }
    }

    /// Wait until queued snapshot writes have been applied.
    pub async fn flush_persistence(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    pub(crate) async fn next_message(&mut self) -> Option<TaskMessage> {
        self.rx.recv().await
    }

    pub(crate) fn on_task_message(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::Delta {
                document_id,
                generation,
                delta,
            } => {
                if self.is_current(delta.kind, &document_id, generation) {
                    self.apply_delta(delta);
                } else {
                    debug!(document_id, generation, kind = %delta.kind, "discarding stale delta");
                }
            }
            TaskMessage::SectionFinished {
                document_id,
                generation,
                kind,
                result,
            } => {
                if !self.is_current(kind, &document_id, generation) {
                    debug!(document_id, generation, kind = %kind, "discarding stale result");
                    return;
                }
                match result {
                    Ok(bullets) => self.complete_section(kind, bullets),
                    Err(e) if e.is_cancelled() => {
                        self.cancel(kind);
                    }
                    Err(e) => self.fail_section(kind, e),
                }
            }
            TaskMessage::QuestionFinished {
                document_id,
                arrival,
                result,
            } => self.finish_question(&document_id, arrival, result),
        }
    }

    fn is_active(&self, document_id: &str) -> bool {
        self.document
            .as_ref()
            .map_or(false, |d| d.id == document_id)
    }

    fn is_current(&self, kind: SectionKind, document_id: &str, generation: u64) -> bool {
        self.is_active(document_id)
            && self
                .runs
                .get(&kind)
                .map_or(false, |run| run.generation == generation)
    }

    fn launch(&mut self, kind: SectionKind, context: String) {
        let Some(document) = self.document.clone() else {
            return;
        };
        self.abort_run(kind, "replaced by a new run");
        if let Err(e) = self.board.advance(kind, SectionPhase::Running, None) {
            warn!(error = %e, "start transition rejected");
            return;
        }
        self.scheduler.mark_running(kind);

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        let job = JobSnapshot::start(kind.as_str());
        debug!(kind = %kind, generation, job_id = %job.id, context_chars = context.chars().count(), "launching section");

        self.bus.publish(BriefEvent::SectionStarted {
            document_id: document.id.clone(),
            kind,
            job: job.clone(),
            timestamp: Utc::now(),
        });
        self.jobs.insert(kind, job.clone());
        self.runs.insert(
            kind,
            SectionRun {
                generation,
                cancel: cancel.clone(),
                job,
            },
        );

        let generator = self.generator.clone();
        let limiter = self.limiter.clone();
        let tx = self.tx.clone();
        let document_id = document.id.clone();
        let request = SectionRequest::new(kind, document.title.clone(), context);

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => {
                    let acquired = tokio::select! {
                        _ = cancel.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    };
                    match acquired {
                        Some(permit) => Some(permit),
                        None => {
                            let _ = tx.send(TaskMessage::SectionFinished {
                                document_id,
                                generation,
                                kind,
                                result: Err(GenerationError::Cancelled(format!(
                                    "{kind} section cancelled before it started"
                                ))),
                            });
                            return;
                        }
                    }
                }
                None => None,
            };

            let delta_tx = tx.clone();
            let delta_document = document_id.clone();
            let result = generator
                .generate(&request, &cancel, move |delta| {
                    let _ = delta_tx.send(TaskMessage::Delta {
                        document_id: delta_document.clone(),
                        generation,
                        delta,
                    });
                })
                .await;

            let _ = tx.send(TaskMessage::SectionFinished {
                document_id,
                generation,
                kind,
                result,
            });
        });
    }

    fn apply_delta(&mut self, delta: SectionDelta) {
        let Some(document_id) = self.document.as_ref().map(|d| d.id.clone()) else {
            return;
        };
        let kind = delta.kind;
        self.board.set_bullets(kind, delta.bullets.clone());
        self.bus.publish(BriefEvent::SectionDelta {
            document_id,
            kind,
            bullets: delta.bullets.clone(),
            done: delta.done,
            timestamp: Utc::now(),
        });
        if delta.done {
            self.complete_section(kind, delta.bullets);
        }
    }

    fn complete_section(&mut self, kind: SectionKind, bullets: Vec<String>) {
        let Some(mut run) = self.runs.remove(&kind) else {
            return;
        };
        let document_id = self.document.as_ref().map(|d| d.id.clone()).unwrap_or_default();
        if let Err(e) = self.board.advance(kind, SectionPhase::Succeeded, None) {
            warn!(error = %e, "success transition rejected");
        }
        self.board.set_bullets(kind, bullets.clone());
        run.job.succeed();
        let duration_ms = run.job.duration_ms();
        info!(
            kind = %kind,
            document_id = %document_id,
            elapsed_ms = duration_ms,
            bullets = bullets.len(),
            "section succeeded"
        );

        self.bus.publish(BriefEvent::SectionSucceeded {
            document_id,
            kind,
            bullets: bullets.clone(),
            job: run.job.clone(),
            timestamp: Utc::now(),
        });
        self.jobs.insert(kind, run.job);
        self.persist(SnapshotUpdate::section(
            kind,
            Some(bullets),
            SectionMetadata::completed(kind, duration_ms),
        ));
        self.section_settled(kind);
    }

    fn fail_section(&mut self, kind: SectionKind, error: GenerationError) {
        let Some(mut run) = self.runs.remove(&kind) else {
            return;
        };
        run.cancel.cancel();
        let document_id = self.document.as_ref().map(|d| d.id.clone()).unwrap_or_default();
        let message = error.to_string();
        if let Err(e) = self
            .board
            .advance(kind, SectionPhase::Failed, Some(message.clone()))
        {
            warn!(error = %e, "failure transition rejected");
        }
        run.job.fail(message.clone());
        let duration_ms = run.job.duration_ms();
        warn!(
            kind = %kind,
            document_id = %document_id,
            error = %message,
            category = %error.retry_category(),
            "section failed"
        );

        self.bus.publish(BriefEvent::SectionFailed {
            document_id,
            kind,
            error: message.clone(),
            retriable: error.is_retriable(),
            job: run.job.clone(),
            timestamp: Utc::now(),
        });
        self.jobs.insert(kind, run.job);
        self.persist(SnapshotUpdate::section(
            kind,
            None,
            SectionMetadata::failed(kind, message, duration_ms),
        ));
        self.section_settled(kind);
    }

    /// Stop a run without touching the board or the scheduler.
    fn abort_run(&mut self, kind: SectionKind, reason: &str) -> bool {
        let Some(mut run) = self.runs.remove(&kind) else {
            return false;
        };
        run.cancel.cancel();
        run.job.cancel();
        let document_id = self.document.as_ref().map(|d| d.id.clone()).unwrap_or_default();
        info!(kind = %kind, document_id = %document_id, reason, "section cancelled");
        self.bus.publish(BriefEvent::SectionCancelled {
            document_id,
            kind,
            job: run.job.clone(),
            timestamp: Utc::now(),
        });
        self.jobs.insert(kind, run.job);
        true
    }

    fn section_settled(&mut self, kind: SectionKind) {
        if let Some(item) = self.scheduler.on_section_terminal(kind) {
            self.dispatch_question(item);
        }
    }

    fn dispatch_question(&mut self, item: PendingQuestion<String>) {
        let Some(document) = self.document.clone() else {
            self.scheduler.on_dispatch_finished();
            return;
        };
        let PendingQuestion { request, arrival } = item;
        let cancel = CancellationToken::new();
        let job = JobSnapshot::start(QUESTION_JOB_KIND);
        info!(document_id = %document.id, arrival, job_id = %job.id, "answering question");

        self.bus.publish(BriefEvent::QuestionDispatched {
            document_id: document.id.clone(),
            arrival,
            question: request.clone(),
            job: job.clone(),
            timestamp: Utc::now(),
        });
        self.question_job = Some(job.clone());
        self.active_question = Some(QuestionRun {
            document_id: document.id.clone(),
            arrival,
            question: request.clone(),
            cancel: cancel.clone(),
            job,
        });

        let generator = self.generator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = generator
                .answer(&cancel, &document.title, &request, &document.full_text)
                .await;
            let _ = tx.send(TaskMessage::QuestionFinished {
                document_id: document.id.clone(),
                arrival,
                result,
            });
        });
    }

    fn finish_question(
        &mut self,
        document_id: &str,
        arrival: u64,
        result: Result<String, GenerationError>,
    ) {
        let current = self
            .active_question
            .as_ref()
            .map_or(false, |q| q.arrival == arrival && q.document_id == document_id);
        if !current {
            debug!(document_id, arrival, "discarding stale answer");
            return;
        }
        let Some(mut run) = self.active_question.take() else {
            return;
        };
        self.scheduler.on_dispatch_finished();

        match result {
            Ok(answer) => {
                run.job.succeed();
                info!(document_id, arrival, elapsed_ms = run.job.duration_ms(), "question answered");
                self.persist(SnapshotUpdate::message(MESSAGE_ANSWER, answer.clone()));
                self.bus.publish(BriefEvent::QuestionAnswered {
                    document_id: run.document_id.clone(),
                    arrival,
                    question: run.question.clone(),
                    answer,
                    job: run.job.clone(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                run.job.fail(e.to_string());
                warn!(document_id, arrival, error = %e, "question failed");
                self.bus.publish(BriefEvent::QuestionFailed {
                    document_id: run.document_id.clone(),
                    arrival,
                    question: run.question.clone(),
                    error: e.to_string(),
                    job: Some(run.job.clone()),
                    timestamp: Utc::now(),
                });
            }
        }
        self.question_job = Some(run.job);

        if let Some(next) = self.scheduler.drain() {
            self.dispatch_question(next);
        }
    }

    fn cancel_question(&mut self, reason: &str) {
        let Some(mut run) = self.active_question.take() else {
            return;
        };
        run.cancel.cancel();
        run.job.cancel();
        self.scheduler.on_dispatch_finished();
        info!(document_id = %run.document_id, arrival = run.arrival, reason, "question cancelled");
        self.bus.publish(BriefEvent::QuestionFailed {
            document_id: run.document_id,
            arrival: run.arrival,
            question: run.question,
            error: reason.to_string(),
            job: Some(run.job.clone()),
            timestamp: Utc::now(),
        });
        self.question_job = Some(run.job);
    }

    /// Fail every queued question; used when the document changes.
    fn supersede_questions(&mut self) {
        let Some(document_id) = self.document.as_ref().map(|d| d.id.clone()) else {
            return;
        };
        for item in self.scheduler.take_all() {
            info!(document_id = %document_id, arrival = item.arrival, "queued question superseded");
            self.bus.publish(BriefEvent::QuestionFailed {
                document_id: document_id.clone(),
                arrival: item.arrival,
                question: item.request,
                error: "superseded by a new document".to_string(),
                job: None,
                timestamp: Utc::now(),
            });
        }
    }

    fn persist(&self, update: SnapshotUpdate) {
        if let (Some(writer), Some(document)) = (&self.writer, &self.document) {
            writer.append_update(
                &document.id,
                &document.title,
                update.with_llm(self.llm.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DeltaCallback;
    use async_trait::async_trait;

    /// Never produces output; waits for cancellation.
    struct Silent;

    #[async_trait]
    impl GenerationClient for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn stream_section(
            &self,
            cancel: &CancellationToken,
            _kind: SectionKind,
            _title: &str,
            _context: &str,
            _on_delta: &mut DeltaCallback<'_>,
        ) -> Result<(), GenerationError> {
            cancel.cancelled().await;
            Err(GenerationError::Cancelled("stopped".into()))
        }
    }

    fn orchestrator() -> BriefOrchestrator {
        BriefOrchestrator::new(
            &BriefConfig::default(),
            Arc::new(Silent),
            EventBus::new(),
            None,
        )
    }

    fn document(id: &str) -> Document {
        Document::new(id, "A Paper", "Our model architecture uses a new training loss.")
    }

    #[tokio::test]
    async fn start_all_marks_every_kind_running() {
        let mut orch = orchestrator();
        orch.start_all(document("doc"));
        for kind in SectionKind::ALL {
            assert_eq!(orch.phase(kind), SectionPhase::Running);
        }
        assert!(!orch.status().ready);
    }

    #[tokio::test]
    async fn done_delta_succeeds_only_that_kind() {
        let mut orch = orchestrator();
        orch.start_all(document("doc"));
        assert!(orch.handle_delta(
            "doc",
            SectionDelta::new(SectionKind::Summary, vec!["a".into()], false)
        ));
        assert_eq!(orch.phase(SectionKind::Summary), SectionPhase::Running);
        orch.handle_delta(
            "doc",
            SectionDelta::new(SectionKind::Summary, vec!["a".into(), "b".into()], true),
        );
        assert_eq!(orch.phase(SectionKind::Summary), SectionPhase::Succeeded);
        assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Running);
        let status = orch.status();
        assert_eq!(status.section(SectionKind::Summary).unwrap().bullets.len(), 2);
        assert_eq!(
            status.jobs[&SectionKind::Summary].status,
            crate::jobs::JobStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn failure_is_isolated() {
        let mut orch = orchestrator();
        orch.start_all(document("doc"));
        orch.handle_delta(
            "doc",
            SectionDelta::new(SectionKind::DeepDive, vec!["x".into()], true),
        );
        assert!(orch.handle_failure(
            "doc",
            SectionKind::Technical,
            GenerationError::backend("boom")
        ));
        assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Failed);
        assert_eq!(orch.phase(SectionKind::Summary), SectionPhase::Running);
        assert_eq!(orch.phase(SectionKind::DeepDive), SectionPhase::Succeeded);
        let state = orch.status().sections[&SectionKind::Technical].clone();
        assert!(state.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn other_document_output_is_discarded() {
        let mut orch = orchestrator();
        orch.start_all(document("old"));
        orch.start_all(document("new"));
        assert!(!orch.handle_delta(
            "old",
            SectionDelta::new(SectionKind::Summary, vec!["stale".into()], true)
        ));
        assert_eq!(orch.phase(SectionKind::Summary), SectionPhase::Running);
        assert!(orch.status().sections[&SectionKind::Summary].bullets.is_empty());
    }

    #[tokio::test]
    async fn retry_only_reruns_failed_kinds() {
        let mut orch = orchestrator();
        assert!(matches!(
            orch.retry(SectionKind::Summary),
            Err(OrchestratorError::NoDocument)
        ));
        orch.start_all(document("doc"));
        assert!(!orch.retry(SectionKind::Summary).unwrap());
        orch.handle_failure("doc", SectionKind::Summary, GenerationError::backend("x"));
        assert!(orch.retry(SectionKind::Summary).unwrap());
        assert_eq!(orch.phase(SectionKind::Summary), SectionPhase::Running);
    }

    #[tokio::test]
    async fn cancel_returns_kind_to_idle() {
        let mut orch = orchestrator();
        let mut events = orch.bus().subscribe();
        orch.start_all(document("doc"));
        assert!(orch.cancel(SectionKind::Technical));
        assert!(!orch.cancel(SectionKind::Technical));
        assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Idle);

        let mut saw_cancel = false;
        while let Ok(event) = events.try_recv() {
            if event.event_type() == "section_cancelled" {
                saw_cancel = true;
            }
        }
        assert!(saw_cancel);
    }

    #[tokio::test]
    async fn questions_wait_for_running_sections() {
        let mut orch = orchestrator();
        assert!(matches!(
            orch.submit_question("why?"),
            Err(OrchestratorError::NoDocument)
        ));
        orch.start_all(document("doc"));
        assert!(matches!(
            orch.submit_question("  "),
            Err(OrchestratorError::EmptyQuestion)
        ));
        let outcome = orch.submit_question("What loss is used?").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { position: 1, .. }));
        assert_eq!(orch.status().queued_questions, 1);
    }
}
