//! Brief configuration: per-section character budgets, deadlines, concurrency.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `PAPERBRIEF_SUMMARY_BUDGET`)
//! 2. Values loaded from a TOML file
//! 3. Built-in defaults
//!
//! | Field                    | Env var                              | Default              |
//! |--------------------------|--------------------------------------|----------------------|
//! | budgets.summary          | `PAPERBRIEF_SUMMARY_BUDGET`          | 60 000 chars         |
//! | budgets.technical        | `PAPERBRIEF_TECHNICAL_BUDGET`        | 110 000 chars        |
//! | budgets.deep_dive        | `PAPERBRIEF_DEEPDIVE_BUDGET`         | 40 000 chars         |
//! | section_timeout_secs     | `PAPERBRIEF_SECTION_TIMEOUT_SECS`    | 120                  |
//! | max_concurrent_sections  | `PAPERBRIEF_MAX_CONCURRENT_SECTIONS` | unbounded            |
//! | knowledge_base           | `PAPERBRIEF_KNOWLEDGE_BASE`          | `./zettelkasten.json`|

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sections::SectionKind;

// Budgets keep roughly 20% headroom under a ~262k-token window at ~4 chars/token.
const DEFAULT_SUMMARY_BUDGET: usize = 60_000;
const DEFAULT_TECHNICAL_BUDGET: usize = 110_000;
const DEFAULT_DEEP_DIVE_BUDGET: usize = 40_000;
const DEFAULT_SECTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EVENT_CAPACITY: usize = 256;
const DEFAULT_KNOWLEDGE_BASE: &str = "zettelkasten.json";

const ENV_SUMMARY_BUDGET: &str = "PAPERBRIEF_SUMMARY_BUDGET";
const ENV_TECHNICAL_BUDGET: &str = "PAPERBRIEF_TECHNICAL_BUDGET";
const ENV_DEEP_DIVE_BUDGET: &str = "PAPERBRIEF_DEEPDIVE_BUDGET";
const ENV_SECTION_TIMEOUT: &str = "PAPERBRIEF_SECTION_TIMEOUT_SECS";
const ENV_MAX_CONCURRENT: &str = "PAPERBRIEF_MAX_CONCURRENT_SECTIONS";
const ENV_KNOWLEDGE_BASE: &str = "PAPERBRIEF_KNOWLEDGE_BASE";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Character budget per section kind. A budget of zero yields an empty context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionBudgets {
    pub summary: usize,
    pub technical: usize,
    pub deep_dive: usize,
}

impl SectionBudgets {
    pub fn get(&self, kind: SectionKind) -> usize {
        match kind {
            SectionKind::Summary => self.summary,
            SectionKind::Technical => self.technical,
            SectionKind::DeepDive => self.deep_dive,
        }
    }

    pub fn set(&mut self, kind: SectionKind, budget: usize) {
        match kind {
            SectionKind::Summary => self.summary = budget,
            SectionKind::Technical => self.technical = budget,
            SectionKind::DeepDive => self.deep_dive = budget,
        }
    }
}

impl Default for SectionBudgets {
    fn default() -> Self {
        Self {
            summary: DEFAULT_SUMMARY_BUDGET,
            technical: DEFAULT_TECHNICAL_BUDGET,
            deep_dive: DEFAULT_DEEP_DIVE_BUDGET,
        }
    }
}

/// Top-level configuration consumed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefConfig {
    pub budgets: SectionBudgets,
    /// Per-section deadline; expiry fails the section like any backend error.
    pub section_timeout_secs: u64,
    /// Upper bound on simultaneously running section tasks. `None` runs one task per kind.
    pub max_concurrent_sections: Option<usize>,
    /// Capacity of the broadcast channel carrying status events.
    pub event_capacity: usize,
    /// Path of the persisted knowledge-base log.
    pub knowledge_base: PathBuf,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            budgets: SectionBudgets::default(),
            section_timeout_secs: DEFAULT_SECTION_TIMEOUT_SECS,
            max_concurrent_sections: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            knowledge_base: PathBuf::from(DEFAULT_KNOWLEDGE_BASE),
        }
    }
}

impl BriefConfig {
    /// Defaults overlaid with environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load a TOML file, then overlay environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay any `PAPERBRIEF_*` variables present in the environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<usize>(ENV_SUMMARY_BUDGET)? {
            self.budgets.summary = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_TECHNICAL_BUDGET)? {
            self.budgets.technical = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_DEEP_DIVE_BUDGET)? {
            self.budgets.deep_dive = v;
        }
        if let Some(v) = env_parse::<u64>(ENV_SECTION_TIMEOUT)? {
            self.section_timeout_secs = v;
        }
        if let Some(v) = env_parse::<usize>(ENV_MAX_CONCURRENT)? {
            self.max_concurrent_sections = Some(v);
        }
        if let Ok(path) = env::var(ENV_KNOWLEDGE_BASE) {
            if !path.trim().is_empty() {
                self.knowledge_base = PathBuf::from(path);
            }
        }
        Ok(())
    }

    pub fn section_timeout(&self) -> Duration {
        Duration::from_secs(self.section_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.section_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "section_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_concurrent_sections == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_sections must be > 0 when set".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
