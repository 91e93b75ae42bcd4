//! Streaming client for a local Ollama daemon (`POST /api/generate`).
//!
//! Sections stream as newline-delimited JSON chunks. The accumulated text is
//! re-parsed into bullet lines after every chunk, so each delta carries the
//! full list so far. Answers use a single non-streaming request.

use async_trait::async_trait;
use coordination::generator::parse_bullet_lines;
use coordination::{DeltaCallback, GenerationClient, GenerationError, SectionKind};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::OllamaEndpoint;
use crate::prompts::{answer_prompt, extract_question_context, section_prompt, MAX_ANSWER_CHARS};

/// Longest error body echoed back in an error message.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line, or the whole body of a non-streaming reply.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: OllamaEndpoint,
    name: String,
}

impl OllamaClient {
    pub fn new(endpoint: OllamaEndpoint) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| GenerationError::Configuration(format!("http client: {e}")))?;
        let name = format!("Ollama ({})", endpoint.model);
        Ok(Self {
            http,
            endpoint,
            name,
        })
    }

    pub fn endpoint(&self) -> &OllamaEndpoint {
        &self.endpoint
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.endpoint.host)
    }

    async fn post(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, GenerationError> {
        let body = GenerateRequest {
            model: &self.endpoint.model,
            prompt,
            stream,
        };
        let response = self
            .http
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.trim().chars().take(ERROR_BODY_LIMIT).collect();
            let message = format!("ollama API error: {status} ({excerpt})");
            warn!(status = %status, model = %self.endpoint.model, "ollama request rejected");
            return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                GenerationError::RateLimit(message)
            } else {
                GenerationError::Backend(message)
            });
        }
        Ok(response)
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.endpoint.timeout)
        } else if e.is_connect() {
            GenerationError::Backend(format!(
                "cannot reach ollama at {}: {e}",
                self.endpoint.host
            ))
        } else {
            GenerationError::Backend(format!("ollama request failed: {e}"))
        }
    }

    /// Single non-streaming generation; an empty reply is an error.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self.post(prompt, false).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseFailure(format!("ollama reply: {e}")))?;
        let text = chunk.response.trim();
        if text.is_empty() {
            return Err(GenerationError::ParseFailure(
                "ollama returned an empty response".into(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Folds NDJSON chunks into accumulated text and reports bullet snapshots.
#[derive(Debug, Default)]
struct StreamAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl StreamAccumulator {
    /// Feed raw bytes; returns the complete lines decoded so far.
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<GenerateChunk>, GenerationError> {
        self.pending.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(chunk) = decode_line(&line)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Decode whatever is left once the body ends without a newline.
    fn finish(&mut self) -> Result<Option<GenerateChunk>, GenerationError> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }

    /// Apply one chunk; `Some` when a delta should be forwarded.
    fn apply(&mut self, chunk: GenerateChunk) -> Option<(Vec<String>, bool)> {
        self.text.push_str(&chunk.response);
        self.done |= chunk.done;
        let bullets = parse_bullet_lines(&self.text);
        if bullets.is_empty() && !chunk.done {
            return None;
        }
        Some((bullets, chunk.done))
    }
}

fn decode_line(line: &[u8]) -> Result<Option<GenerateChunk>, GenerationError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| GenerationError::ParseFailure(format!("ollama stream line: {e}")))
}

#[async_trait]
impl GenerationClient for OllamaClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> Option<&str> {
        Some(&self.endpoint.model)
    }

    async fn stream_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        title: &str,
        context: &str,
        on_delta: &mut DeltaCallback<'_>,
    ) -> Result<(), GenerationError> {
        let prompt = section_prompt(kind, title, context);
        debug!(kind = %kind, model = %self.endpoint.model, prompt_chars = prompt.len(), "streaming section");
        let response = self.post(&prompt, true).await?;

        let mut body = response.bytes_stream();
        let mut acc = StreamAccumulator::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerationError::Cancelled(format!("{kind} stream cancelled")));
                }
                next = body.next() => next,
            };
            let Some(bytes) = next else { break };
            let bytes = bytes.map_err(|e| self.transport_error(e))?;
            for chunk in acc.push(&bytes)? {
                if let Some((bullets, done)) = acc.apply(chunk) {
                    on_delta(bullets, done)?;
                }
                if acc.done {
                    return Ok(());
                }
            }
        }

        if let Some(chunk) = acc.finish()? {
            if let Some((bullets, done)) = acc.apply(chunk) {
                on_delta(bullets, done)?;
            }
        }
        Ok(())
    }

    async fn answer(
        &self,
        _cancel: &CancellationToken,
        title: &str,
        question: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        if question.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "question cannot be empty".into(),
            ));
        }
        let narrowed = extract_question_context(context, question, MAX_ANSWER_CHARS);
        if narrowed.is_empty() {
            return Err(GenerationError::Backend(
                "document text empty; cannot answer question".into(),
            ));
        }
        debug!(model = %self.endpoint.model, context_chars = narrowed.len(), "answering question");
        self.generate(&answer_prompt(title, &narrowed, question)).await
    }
}
