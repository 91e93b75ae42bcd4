use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordination::{
    spawn_orchestrator, Document, EventFilter, GenerationClient, Note, OneShot, SnapshotStore,
    SnapshotUpdate,
};
use paperbrief::config::{AppConfig, LlmEndpoint, Overrides, Provider};
use paperbrief::ollama::OllamaClient;
use paperbrief::openai::OpenAiClient;
use paperbrief::render::{render_event, render_note, render_snapshot, render_status};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Time allowed for the printer to drain events after shutdown.
const PRINTER_DRAIN: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with brief settings (budgets, deadline, concurrency)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge-base log (overrides PAPERBRIEF_KNOWLEDGE_BASE)
    #[arg(long, global = true)]
    knowledge_base: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a reading brief for a text file and answer follow-up questions
    Brief {
        /// Plain-text document to brief
        #[arg(long)]
        input: PathBuf,

        /// Stable document identifier
        #[arg(long)]
        id: String,

        #[arg(long, default_value = "")]
        title: String,

        /// Follow-up question; repeat for several. Answered after the brief settles.
        #[arg(long = "question", short = 'q')]
        questions: Vec<String>,

        /// LLM backend: auto (OpenAI when OPENAI_API_KEY is set), openai, or ollama
        #[arg(long, default_value = "auto")]
        provider: Provider,

        /// Model name (overrides OPENAI_MODEL / OLLAMA_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Endpoint base URL (overrides OPENAI_BASE_URL / OLLAMA_HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// List stored notes
    Notes,

    /// List stored conversation snapshots with per-section status
    Snapshots,

    /// Save a manual note for a document
    AddNote {
        #[arg(long)]
        id: String,

        /// Note title
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,

        /// Title of the document the note belongs to
        #[arg(long, default_value = "")]
        document_title: String,

        #[arg(long, default_value = "manual")]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut overrides = Overrides {
        config: cli.config,
        knowledge_base: cli.knowledge_base,
        ..Overrides::default()
    };

    match cli.command {
        Command::Brief {
            input,
            id,
            title,
            questions,
            provider,
            model,
            host,
        } => {
            overrides.provider = provider;
            overrides.model = model;
            overrides.endpoint = host;
            let config = AppConfig::resolve(&overrides)?;
            run_brief(config, input, id, title, questions).await
        }
        Command::Notes => {
            let store = open_store(&overrides)?;
            let notes = store.load_notes().context("Failed to load notes")?;
            if notes.is_empty() {
                println!("No notes stored in {}", store.path().display());
            }
            for note in &notes {
                println!("{}\n", render_note(note));
            }
            Ok(())
        }
        Command::Snapshots => {
            let store = open_store(&overrides)?;
            let snapshots = store
                .load_snapshots()
                .context("Failed to load conversation snapshots")?;
            if snapshots.is_empty() {
                println!("No snapshots stored in {}", store.path().display());
            }
            for snapshot in &snapshots {
                println!("{}", render_snapshot(snapshot));
            }
            Ok(())
        }
        Command::AddNote {
            id,
            title,
            body,
            document_title,
            kind,
        } => {
            anyhow::ensure!(!id.trim().is_empty(), "--id must not be empty");
            anyhow::ensure!(
                !title.trim().is_empty() && !body.trim().is_empty(),
                "note title and body must not be empty"
            );
            let store = open_store(&overrides)?;
            let note = Note::new(&id, &document_title, title.trim(), body.trim(), kind);
            store
                .save_notes(std::slice::from_ref(&note))
                .context("Failed to save note")?;
            store
                .append_update(
                    &id,
                    &document_title,
                    &SnapshotUpdate::note(note.to_snapshot_note()),
                )
                .context("Failed to attach note to snapshot")?;
            info!(document_id = %id, path = %store.path().display(), "note saved");
            Ok(())
        }
    }
}

fn open_store(overrides: &Overrides) -> Result<SnapshotStore> {
    let config = AppConfig::resolve(overrides)?;
    Ok(SnapshotStore::new(config.brief.knowledge_base))
}

fn build_client(llm: &LlmEndpoint) -> Result<Arc<dyn GenerationClient>> {
    Ok(match llm {
        LlmEndpoint::Ollama(endpoint) => Arc::new(
            OllamaClient::new(endpoint.clone()).context("Failed to build Ollama client")?,
        ),
        LlmEndpoint::OpenAi(endpoint) => Arc::new(OneShot::new(
            OpenAiClient::new(endpoint.clone()).context("Failed to build OpenAI client")?,
        )),
    })
}

async fn run_brief(
    config: AppConfig,
    input: PathBuf,
    id: String,
    title: String,
    questions: Vec<String>,
) -> Result<()> {
    let text = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let document = Document::new(id.clone(), title, text);
    anyhow::ensure!(
        document.has_text(),
        "{} contains no text to brief",
        input.display()
    );

    let client = build_client(&config.llm)?;
    info!(
        provider = %config.llm.provider(),
        endpoint = %config.llm.base_url(),
        model = %config.llm.model(),
        knowledge_base = %config.brief.knowledge_base.display(),
        "paperbrief starting"
    );

    let store = Arc::new(SnapshotStore::new(config.brief.knowledge_base.clone()));
    let handle = spawn_orchestrator(config.brief, client, Some(store));

    let mut events = handle.subscribe_filtered(EventFilter::new().document(&id));
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(text) = render_event(&event) {
                        println!("{text}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind; some progress events were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    handle
        .start_all(document)
        .await
        .context("Failed to start brief")?;
    for question in questions {
        handle
            .submit_question(question)
            .await
            .context("Failed to submit question")?;
    }

    let status = handle.wait_idle().await.context("Brief did not settle")?;
    handle.shutdown().await.context("Failed to shut down")?;
    drop(handle);
    if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
        warn!("timed out flushing output");
    }

    eprint!("{}", render_status(&status));
    Ok(())
}
