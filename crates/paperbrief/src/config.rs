use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::BriefConfig;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "ministral-3:latest";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(180);

/// Which LLM backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// OpenAI when `OPENAI_API_KEY` is set, otherwise Ollama.
    #[default]
    Auto,
    OpenAi,
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unsupported LLM provider: {other}")),
        }
    }
}

/// Local Ollama daemon endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaEndpoint {
    /// Base URL without a trailing slash.
    pub host: String,
    pub model: String,
    /// Whole-request HTTP timeout.
    pub timeout: Duration,
}

impl OllamaEndpoint {
    /// Build from `OLLAMA_HOST` / `OLLAMA_MODEL` as returned by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("OLLAMA_HOST")
                .map(|v| normalize_host(&v))
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.into()),
            model: lookup("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.into()),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Default for OllamaEndpoint {
    fn default() -> Self {
        Self::from_lookup(env_var)
    }
}

/// OpenAI-compatible Chat Completions endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct OpenAiEndpoint {
    /// Base URL without a trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl OpenAiEndpoint {
    /// `None` when `OPENAI_API_KEY` is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = lookup("OPENAI_API_KEY")?;
        Some(Self {
            base_url: lookup("OPENAI_BASE_URL")
                .map(|v| normalize_host(&v))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            model: lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            api_key: api_key.trim().to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }
}

impl fmt::Debug for OpenAiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEndpoint")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The resolved backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmEndpoint {
    OpenAi(OpenAiEndpoint),
    Ollama(OllamaEndpoint),
}

impl LlmEndpoint {
    pub fn provider(&self) -> Provider {
        match self {
            Self::OpenAi(_) => Provider::OpenAi,
            Self::Ollama(_) => Provider::Ollama,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(e) => &e.model,
            Self::Ollama(e) => &e.model,
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        match self {
            Self::OpenAi(e) => &e.base_url,
            Self::Ollama(e) => &e.host,
        }
    }

    fn set_base_url(&mut self, url: &str) {
        match self {
            Self::OpenAi(e) => e.base_url = normalize_host(url),
            Self::Ollama(e) => e.host = normalize_host(url),
        }
    }

    fn set_model(&mut self, model: &str) {
        match self {
            Self::OpenAi(e) => e.model = model.trim().to_string(),
            Self::Ollama(e) => e.model = model.trim().to_string(),
        }
    }
}

/// Command-line overrides; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub knowledge_base: Option<PathBuf>,
    pub provider: Provider,
    /// Ollama host or OpenAI base URL, depending on the provider.
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub brief: BriefConfig,
    pub llm: LlmEndpoint,
}

impl AppConfig {
    /// Resolve configuration: CLI flags, then environment, then the TOML
    /// file, then defaults.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        Self::resolve_with(overrides, env_var)
    }

    /// Like [`AppConfig::resolve`], reading provider variables through `lookup`.
    pub fn resolve_with(
        overrides: &Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut brief = match &overrides.config {
            Some(path) => load_brief(path)?,
            None => BriefConfig::from_env().context("Invalid PAPERBRIEF_* environment")?,
        };
        if let Some(ref path) = overrides.knowledge_base {
            brief.knowledge_base = path.clone();
        }
        brief.validate().context("Invalid brief configuration")?;

        let mut llm = select_endpoint(overrides.provider, &lookup)?;
        if let Some(ref url) = overrides.endpoint {
            llm.set_base_url(url);
        }
        if let Some(ref model) = overrides.model {
            llm.set_model(model);
        }
        anyhow::ensure!(!llm.model().is_empty(), "{} model name is empty", llm.provider());
        anyhow::ensure!(!llm.base_url().is_empty(), "{} endpoint is empty", llm.provider());

        Ok(Self { brief, llm })
    }
}

fn select_endpoint(
    provider: Provider,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<LlmEndpoint> {
    match provider {
        Provider::Auto => Ok(match OpenAiEndpoint::from_lookup(lookup) {
            Some(openai) => LlmEndpoint::OpenAi(openai),
            None => LlmEndpoint::Ollama(OllamaEndpoint::from_lookup(lookup)),
        }),
        Provider::OpenAi => OpenAiEndpoint::from_lookup(lookup)
            .map(LlmEndpoint::OpenAi)
            .context("OPENAI_API_KEY not set"),
        Provider::Ollama => Ok(LlmEndpoint::Ollama(OllamaEndpoint::from_lookup(lookup))),
    }
}

/// Non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn load_brief(path: &Path) -> Result<BriefConfig> {
    BriefConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Trim whitespace and trailing slashes so paths can be appended directly.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}
