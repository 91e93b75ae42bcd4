//! End-to-end orchestration against a scripted generation client.
//!
//! Covers failure isolation, question release after the brief settles,
//! stale-run discard, document replacement, deadlines, the concurrency cap,
//! and persistence through the actor handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordination::orchestrator::BriefOrchestrator;
use coordination::store::{MESSAGE_ANSWER, MESSAGE_QUESTION, STATUS_COMPLETED, STATUS_FAILED};
use coordination::{
    spawn_orchestrator, BriefConfig, BriefEvent, DeltaCallback, Document, EventBus, EventFilter,
    GenerationClient, GenerationError, JobStatus, OneShot, SectionCompletion, SectionKind,
    SectionPhase, SnapshotStore, SubmitOutcome,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Script {
    /// Stream the bullets one at a time, the last delta marked done.
    Bullets(Vec<&'static str>),
    /// Fail with a backend error.
    Fail(&'static str),
    /// Block until cancelled.
    Hang,
    /// Fail the first call, stream bullets afterwards.
    FailOnce(&'static str, Vec<&'static str>),
    /// Block until cancelled on the first call, stream bullets afterwards.
    HangOnce(Vec<&'static str>),
}

struct ScriptedClient {
    scripts: HashMap<SectionKind, Script>,
    first_call_done: Mutex<HashMap<SectionKind, bool>>,
    questions: Mutex<Vec<(String, String)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedClient {
    fn new(scripts: impl IntoIterator<Item = (SectionKind, Script)>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            first_call_done: Mutex::new(HashMap::new()),
            questions: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn all(script: Script) -> Self {
        Self::new(SectionKind::ALL.into_iter().map(|k| (k, script.clone())))
    }

    fn questions(&self) -> Vec<String> {
        self.questions
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    fn has_started(&self, kind: SectionKind) -> bool {
        self.first_call_done.lock().unwrap().contains_key(&kind)
    }

    fn first_call(&self, kind: SectionKind) -> bool {
        let mut seen = self.first_call_done.lock().unwrap();
        !std::mem::replace(seen.entry(kind).or_insert(false), true)
    }

    async fn play(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<(), GenerationError> {
        let script = self.scripts.get(&kind).cloned().unwrap_or(Script::Hang);
        let script = match script {
            Script::FailOnce(msg, bullets) => {
                if self.first_call(kind) {
                    Script::Fail(msg)
                } else {
                    Script::Bullets(bullets)
                }
            }
            Script::HangOnce(bullets) => {
                if self.first_call(kind) {
                    Script::Hang
                } else {
                    Script::Bullets(bullets)
                }
            }
            other => other,
        };
        match script {
            Script::Bullets(bullets) => {
                let mut acc = Vec::new();
                for (i, bullet) in bullets.iter().enumerate() {
                    acc.push(format!("- {bullet}"));
                    on_delta(acc.clone(), i + 1 == bullets.len())?;
                    tokio::task::yield_now().await;
                }
                Ok(())
            }
            Script::Fail(msg) => Err(GenerationError::backend(msg)),
            _ => {
                cancel.cancelled().await;
                Err(GenerationError::Cancelled("client stopped".into()))
            }
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> Option<&str> {
        Some("script-1")
    }

    async fn stream_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        _title: &str,
        _context: &str,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<(), GenerationError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.play(cancel, kind, on_delta).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn answer(
        &self,
        _cancel: &CancellationToken,
        _title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        self.questions
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok(format!("  answer to {question}  "))
    }
}

const TEXT: &str = "Introduction\n\nWe propose a transformer model trained with a new loss.\n\n\
Method\n\nThe architecture stacks attention layers; training uses a contrastive objective.\n\n\
Results\n\nThe benchmark accuracy improves on every dataset we evaluated.";

fn document(id: &str) -> Document {
    Document::new(id, "Scripted Paper", TEXT)
}

fn orchestrator(client: Arc<ScriptedClient>, config: BriefConfig) -> BriefOrchestrator {
    BriefOrchestrator::new(&config, client, EventBus::new(), None)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BriefEvent>) -> Vec<BriefEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_failed_section_does_not_affect_siblings() {
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Bullets(vec!["one", "two"])),
        (SectionKind::Technical, Script::Fail("model overloaded")),
        (SectionKind::DeepDive, Script::Bullets(vec!["deep"])),
    ]));
    let mut orch = orchestrator(client, BriefConfig::default());
    orch.start_all(document("doc-1"));
    orch.run_until_idle().await;

    let status = orch.status();
    let summary = status.section(SectionKind::Summary).unwrap();
    assert_eq!(summary.phase, SectionPhase::Succeeded);
    assert_eq!(summary.bullets, vec!["one", "two"]);
    assert!(summary.error.is_none());

    let technical = status.section(SectionKind::Technical).unwrap();
    assert_eq!(technical.phase, SectionPhase::Failed);
    assert!(technical.bullets.is_empty());
    assert!(technical.error.as_deref().unwrap().contains("model overloaded"));

    assert_eq!(
        status.section(SectionKind::DeepDive).unwrap().bullets,
        vec!["deep"]
    );
    assert_eq!(status.jobs[&SectionKind::Technical].status, JobStatus::Failed);
    assert!(status.ready);
}

#[tokio::test]
async fn test_question_waits_for_every_section() {
    let client = Arc::new(ScriptedClient::all(Script::Bullets(vec!["a", "b"])));
    let mut orch = orchestrator(Arc::clone(&client), BriefConfig::default());
    let mut rx = orch.bus().subscribe();

    orch.start_all(document("doc-q"));
    let outcome = orch.submit_question("What loss is used?").unwrap();
    assert!(matches!(outcome, SubmitOutcome::Queued { position: 1, .. }));

    orch.run_until_idle().await;

    assert_eq!(client.questions(), vec!["What loss is used?"]);
    let context = client.questions.lock().unwrap()[0].1.clone();
    assert_eq!(context, TEXT);

    let events = drain(&mut rx);
    let last_terminal = events
        .iter()
        .rposition(BriefEvent::is_section_terminal)
        .unwrap();
    let dispatched = events
        .iter()
        .position(|e| e.event_type() == "question_dispatched")
        .unwrap();
    assert!(dispatched > last_terminal);

    let answered = events
        .iter()
        .find_map(|e| match e {
            BriefEvent::QuestionAnswered { answer, .. } => Some(answer.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(answered, "answer to What loss is used?");
    assert_eq!(
        orch.status().question_job.unwrap().status,
        JobStatus::Succeeded
    );
}

#[tokio::test]
async fn test_queued_questions_answer_in_arrival_order() {
    let client = Arc::new(ScriptedClient::all(Script::Bullets(vec!["x"])));
    let mut orch = orchestrator(Arc::clone(&client), BriefConfig::default());
    orch.start_all(document("doc-fifo"));

    orch.submit_question("first").unwrap();
    let second = orch.submit_question("second").unwrap();
    assert!(matches!(second, SubmitOutcome::Queued { position: 2, .. }));
    orch.submit_question("third").unwrap();

    orch.run_until_idle().await;
    assert_eq!(client.questions(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_question_on_settled_brief_dispatches_immediately() {
    let client = Arc::new(ScriptedClient::all(Script::Bullets(vec!["x"])));
    let mut orch = orchestrator(Arc::clone(&client), BriefConfig::default());
    orch.start_all(document("doc-now"));
    orch.run_until_idle().await;

    let outcome = orch.submit_question("ready?").unwrap();
    assert!(matches!(outcome, SubmitOutcome::Dispatched(_)));
    orch.run_until_idle().await;
    assert_eq!(client.questions(), vec!["ready?"]);
}

#[tokio::test]
async fn test_retry_reruns_only_the_failed_kind() {
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Bullets(vec!["s"])),
        (
            SectionKind::Technical,
            Script::FailOnce("rate limited", vec!["t1", "t2"]),
        ),
        (SectionKind::DeepDive, Script::Bullets(vec!["d"])),
    ]));
    let mut orch = orchestrator(client, BriefConfig::default());
    orch.start_all(document("doc-r"));
    orch.run_until_idle().await;
    assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Failed);
    let summary_job = orch.status().jobs[&SectionKind::Summary].id.clone();

    assert!(orch.retry(SectionKind::Technical).unwrap());
    assert!(!orch.retry(SectionKind::Summary).unwrap());
    orch.run_until_idle().await;

    let status = orch.status();
    assert_eq!(
        status.section(SectionKind::Technical).unwrap().bullets,
        vec!["t1", "t2"]
    );
    assert!(status.section(SectionKind::Technical).unwrap().error.is_none());
    assert_eq!(status.jobs[&SectionKind::Summary].id, summary_job);
}

#[tokio::test]
async fn test_cancelled_run_output_is_discarded_after_restart() {
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Bullets(vec!["s"])),
        (SectionKind::Technical, Script::HangOnce(vec!["fresh"])),
        (SectionKind::DeepDive, Script::Bullets(vec!["d"])),
    ]));
    let mut orch = orchestrator(Arc::clone(&client), BriefConfig::default());
    orch.start_all(document("doc-c"));
    while !client.has_started(SectionKind::Technical) {
        tokio::task::yield_now().await;
    }

    assert!(orch.cancel(SectionKind::Technical));
    assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Idle);
    assert!(orch.retry(SectionKind::Technical).unwrap());

    // The first run's cancellation result arrives after the restart and
    // must not cancel the new run.
    orch.run_until_idle().await;
    let technical = orch.status().section(SectionKind::Technical).cloned().unwrap();
    assert_eq!(technical.phase, SectionPhase::Succeeded);
    assert_eq!(technical.bullets, vec!["fresh"]);
}

#[tokio::test]
async fn test_new_document_supersedes_queued_questions() {
    let client = Arc::new(ScriptedClient::all(Script::Hang));
    let mut orch = orchestrator(client, BriefConfig::default());
    let mut rx = orch.bus().subscribe();

    orch.start_all(document("old"));
    orch.submit_question("about the old one").unwrap();
    orch.start_all(document("new"));

    let status = orch.status();
    assert_eq!(status.document_id.as_deref(), Some("new"));
    assert_eq!(status.queued_questions, 0);
    for kind in SectionKind::ALL {
        assert_eq!(orch.phase(kind), SectionPhase::Running);
    }

    let events = drain(&mut rx);
    let superseded = events.iter().find_map(|e| match e {
        BriefEvent::QuestionFailed {
            document_id,
            question,
            error,
            ..
        } => Some((document_id.clone(), question.clone(), error.clone())),
        _ => None,
    });
    let (document_id, question, error) = superseded.unwrap();
    assert_eq!(document_id, "old");
    assert_eq!(question, "about the old one");
    assert!(error.contains("superseded"));

    let cancelled_old = events
        .iter()
        .filter(|e| e.event_type() == "section_cancelled" && e.document_id() == "old")
        .count();
    assert_eq!(cancelled_old, 3);
    orch.cancel_all();
}

#[tokio::test]
async fn test_delta_for_replaced_document_is_ignored() {
    let client = Arc::new(ScriptedClient::all(Script::Hang));
    let mut orch = orchestrator(client, BriefConfig::default());
    orch.start_all(document("first"));
    orch.start_all(document("second"));

    let stale = coordination::SectionDelta::new(SectionKind::Summary, vec!["stale".into()], true);
    assert!(!orch.handle_delta("first", stale));
    assert!(orch
        .status()
        .section(SectionKind::Summary)
        .unwrap()
        .bullets
        .is_empty());
    orch.cancel_all();
}

#[tokio::test(start_paused = true)]
async fn test_section_deadline_fails_only_that_section() {
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Hang),
        (SectionKind::Technical, Script::Bullets(vec!["t"])),
        (SectionKind::DeepDive, Script::Bullets(vec!["d"])),
    ]));
    let config = BriefConfig {
        section_timeout_secs: 5,
        ..BriefConfig::default()
    };
    let mut orch = orchestrator(client, config);
    let mut rx = orch.bus().subscribe();
    orch.start_all(document("doc-t"));
    orch.run_until_idle().await;

    let summary = orch.status().section(SectionKind::Summary).cloned().unwrap();
    assert_eq!(summary.phase, SectionPhase::Failed);
    assert!(summary.error.unwrap().contains("timed out"));
    assert_eq!(orch.phase(SectionKind::Technical), SectionPhase::Succeeded);

    let retriable = drain(&mut rx).into_iter().find_map(|e| match e {
        BriefEvent::SectionFailed { retriable, .. } => Some(retriable),
        _ => None,
    });
    assert_eq!(retriable, Some(true));
}

#[tokio::test]
async fn test_concurrency_cap_serializes_sections() {
    let client = Arc::new(ScriptedClient::all(Script::Bullets(vec!["a", "b", "c"])));
    let config = BriefConfig {
        max_concurrent_sections: Some(1),
        ..BriefConfig::default()
    };
    let mut orch = orchestrator(Arc::clone(&client), config);
    orch.start_all(document("doc-cap"));
    orch.run_until_idle().await;

    assert_eq!(client.peak.load(Ordering::SeqCst), 1);
    for kind in SectionKind::ALL {
        assert_eq!(orch.phase(kind), SectionPhase::Succeeded);
    }
}

struct WholeResult;

#[async_trait]
impl SectionCompletion for WholeResult {
    fn name(&self) -> &str {
        "whole"
    }

    async fn generate_section(
        &self,
        _cancel: &CancellationToken,
        kind: SectionKind,
        _title: &str,
        _context: &str,
    ) -> Result<Vec<String>, GenerationError> {
        Ok(vec![format!("* {} point", kind.title())])
    }
}

#[tokio::test]
async fn test_one_shot_client_fills_every_section() {
    let config = BriefConfig::default();
    let mut orch = BriefOrchestrator::new(
        &config,
        Arc::new(OneShot::new(WholeResult)),
        EventBus::new(),
        None,
    );
    let mut rx = orch.bus().subscribe();
    orch.start_all(document("doc-1shot"));
    orch.run_until_idle().await;

    let status = orch.status();
    assert_eq!(
        status.section(SectionKind::DeepDive).unwrap().bullets,
        vec!["Deep Dive point"]
    );
    let deltas = drain(&mut rx)
        .into_iter()
        .filter(|e| e.event_type() == "section_delta")
        .count();
    assert_eq!(deltas, 3);

    // No answer capability: the question fails, the brief is untouched.
    orch.submit_question("anything?").unwrap();
    orch.run_until_idle().await;
    assert_eq!(
        orch.status().question_job.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_handle_persists_brief_and_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::new(dir.path().join("kb.json")));
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Bullets(vec!["short"])),
        (SectionKind::Technical, Script::Fail("backend down")),
        (SectionKind::DeepDive, Script::Bullets(vec!["deeper"])),
    ]));
    let handle = spawn_orchestrator(BriefConfig::default(), client, Some(Arc::clone(&store)));
    let mut succeeded = handle.subscribe_filtered(
        EventFilter::new()
            .document("doc-e2e")
            .types(vec!["section_succeeded"]),
    );

    handle.start_all(document("doc-e2e")).await.unwrap();
    handle.submit_question("Which dataset?").await.unwrap();
    let status = handle.wait_idle().await.unwrap();
    assert_eq!(status.queued_questions, 0);
    assert_eq!(
        status.section(SectionKind::Technical).unwrap().phase,
        SectionPhase::Failed
    );
    let first = succeeded.recv().await.unwrap();
    assert_eq!(first.event_type(), "section_succeeded");

    handle.shutdown().await.unwrap();

    let snapshot = store.find_snapshot("doc-e2e").unwrap().unwrap();
    assert_eq!(snapshot.document_title, "Scripted Paper");
    let kinds: Vec<_> = snapshot.messages.iter().map(|m| m.kind.as_str()).collect();
    assert_eq!(kinds, vec![MESSAGE_QUESTION, MESSAGE_ANSWER]);
    assert_eq!(snapshot.messages[1].content, "answer to Which dataset?");

    let brief = snapshot.brief.as_ref().unwrap();
    assert_eq!(brief.summary, Some(vec!["short".to_string()]));
    assert!(brief.technical.is_none());

    let technical = snapshot.metadata(SectionKind::Technical).unwrap();
    assert_eq!(technical.status, STATUS_FAILED);
    assert!(technical.error.contains("backend down"));
    assert_eq!(
        snapshot.metadata(SectionKind::Summary).unwrap().status,
        STATUS_COMPLETED
    );
    let llm = snapshot.llm.unwrap();
    assert_eq!(llm.provider, "scripted");
    assert_eq!(llm.model, "script-1");
}

#[tokio::test]
async fn test_handle_cancel_leaves_kind_idle() {
    let client = Arc::new(ScriptedClient::new([
        (SectionKind::Summary, Script::Bullets(vec!["s"])),
        (SectionKind::Technical, Script::Hang),
        (SectionKind::DeepDive, Script::Bullets(vec!["d"])),
    ]));
    let handle = spawn_orchestrator(BriefConfig::default(), client, None);
    handle.start_all(document("doc-h")).await.unwrap();

    assert!(handle.cancel(SectionKind::Technical).await.unwrap());
    let status = handle.wait_idle().await.unwrap();
    assert_eq!(
        status.section(SectionKind::Technical).unwrap().phase,
        SectionPhase::Idle
    );
    assert_eq!(status.jobs[&SectionKind::Technical].status, JobStatus::Cancelled);
    assert!(status.ready);

    handle.shutdown().await.unwrap();
    assert!(handle.status().await.is_err());
}
