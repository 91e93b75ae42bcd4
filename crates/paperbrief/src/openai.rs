//! Chat Completions client for OpenAI-compatible endpoints.
//!
//! The API is used without streaming, so this is a [`SectionCompletion`];
//! wrap it in `OneShot` to hand it to the orchestrator.

use async_trait::async_trait;
use coordination::generator::{normalize_bullets, parse_bullet_lines};
use coordination::{GenerationError, SectionCompletion, SectionKind};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::OpenAiEndpoint;
use crate::prompts::{answer_prompt, extract_question_context, section_prompt, MAX_ANSWER_CHARS};

const SYSTEM_PROMPT: &str = "You are a concise research assistant.";
const TEMPERATURE: f32 = 0.2;

/// Longest error body echoed back in an error message.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// JSON shapes a model sometimes answers with instead of a markdown list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonBullets {
    List(Vec<String>),
    Wrapped {
        #[serde(default)]
        items: Vec<String>,
        #[serde(default)]
        data: Vec<String>,
    },
}

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: OpenAiEndpoint,
    name: String,
}

impl OpenAiClient {
    pub fn new(endpoint: OpenAiEndpoint) -> Result<Self, GenerationError> {
        if endpoint.api_key.is_empty() {
            return Err(GenerationError::Configuration("OPENAI_API_KEY not set".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|e| GenerationError::Configuration(format!("http client: {e}")))?;
        let name = format!("OpenAI ({})", endpoint.model);
        Ok(Self {
            http,
            endpoint,
            name,
        })
    }

    pub fn endpoint(&self) -> &OpenAiEndpoint {
        &self.endpoint
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.base_url)
    }

    async fn chat(&self, cancel: &CancellationToken, prompt: &str) -> Result<String, GenerationError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(GenerationError::Cancelled("openai request cancelled".into()))
            }
            result = self.send_chat(prompt) => result,
        }
    }

    async fn send_chat(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.endpoint.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
        };
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.trim().chars().take(ERROR_BODY_LIMIT).collect();
            let message = format!("openai API error: {status} ({excerpt})");
            warn!(status = %status, model = %self.endpoint.model, "openai request rejected");
            return Err(match status {
                reqwest::StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimit(message),
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    GenerationError::Configuration(message)
                }
                _ => GenerationError::Backend(message),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseFailure(format!("openai reply: {e}")))?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            GenerationError::ParseFailure("openai API returned no choices".into())
        })?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.endpoint.timeout)
        } else if e.is_connect() {
            GenerationError::Backend(format!(
                "cannot reach {}: {e}",
                self.endpoint.base_url
            ))
        } else {
            GenerationError::Backend(format!("openai request failed: {e}"))
        }
    }
}

/// Turn a whole section reply into bullets.
///
/// Accepts a JSON array, an `{"items": [...]}` / `{"data": [...]}` object,
/// or a markdown list, in that order of preference.
pub fn parse_section_reply(raw: &str) -> Result<Vec<String>, GenerationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GenerationError::ParseFailure(
            "empty brief section response".into(),
        ));
    }

    let mut candidates = vec![raw];
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if end > start {
            candidates.push(&raw[start..=end]);
        }
    }
    for candidate in candidates {
        let values = match serde_json::from_str::<JsonBullets>(candidate) {
            Ok(JsonBullets::List(items)) => items,
            Ok(JsonBullets::Wrapped { items, data }) => {
                if items.is_empty() {
                    data
                } else {
                    items
                }
            }
            Err(_) => continue,
        };
        let bullets = normalize_bullets(&values);
        if !bullets.is_empty() {
            return Ok(bullets);
        }
    }

    let bullets = parse_bullet_lines(raw);
    if bullets.is_empty() {
        return Err(GenerationError::ParseFailure(
            "brief section response had no bullets".into(),
        ));
    }
    Ok(bullets)
}

#[async_trait]
impl SectionCompletion for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> Option<&str> {
        Some(&self.endpoint.model)
    }

    async fn generate_section(
        &self,
        cancel: &CancellationToken,
        kind: SectionKind,
        title: &str,
        context: &str,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = section_prompt(kind, title, context);
        debug!(kind = %kind, model = %self.endpoint.model, prompt_chars = prompt.len(), "requesting section");
        let raw = self.chat(cancel, &prompt).await?;
        parse_section_reply(&raw)
    }

    async fn answer(
        &self,
        cancel: &CancellationToken,
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
        let answer = self
            .chat(cancel, &answer_prompt(title, &narrowed, question))
            .await?;
        if answer.is_empty() {
            return Err(GenerationError::ParseFailure(
                "openai returned an empty answer".into(),
            ));
        }
        Ok(answer)
    }
}
