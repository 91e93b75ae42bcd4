//! Generation error taxonomy with retry classification.
//!
//! Every failure a section task can hit is represented here. Callers query
//! `retry_category()` / `is_retriable()` instead of matching on strings.
//!
//! | Category       | Retriable |
//! |----------------|-----------|
//! | Transient      | yes       |
//! | RateLimit      | yes       |
//! | Timeout        | yes       |
//! | ParseFailure   | yes       |
//! | EmptyContext   | no        |
//! | Unsupported    | no        |
//! | Configuration  | no        |
//! | Cancelled      | no        |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::sections::SectionKind;

/// Classification used to decide whether a failed section is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Network or backend hiccup.
    Transient,
    /// Backend asked us to slow down.
    RateLimit,
    /// The per-section deadline expired.
    Timeout,
    /// Backend output could not be parsed.
    ParseFailure,
    /// Nothing survived packing for this kind.
    EmptyContext,
    /// The client lacks the requested capability.
    Unsupported,
    /// Client or endpoint is misconfigured.
    Configuration,
    /// Superseded or explicitly cancelled; never surfaced as a user-visible error.
    Cancelled,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Transient | Self::RateLimit | Self::Timeout | Self::ParseFailure
        )
    }
}

impl fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Timeout => write!(f, "timeout"),
            Self::ParseFailure => write!(f, "parse_failure"),
            Self::EmptyContext => write!(f, "empty_context"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Configuration => write!(f, "configuration"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Unified error type for section generation and question answering.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("document text empty; cannot build {0} section")]
    EmptyContext(SectionKind),

    #[error("inference failure: {0}")]
    Backend(String),

    #[error("rate limit: {0}")]
    RateLimit(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GenerationError {
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::EmptyContext(_) => RetryCategory::EmptyContext,
            Self::Backend(_) => RetryCategory::Transient,
            Self::RateLimit(_) => RetryCategory::RateLimit,
            Self::Timeout(_) => RetryCategory::Timeout,
            Self::ParseFailure(_) => RetryCategory::ParseFailure,
            Self::Unsupported(_) => RetryCategory::Unsupported,
            Self::Configuration(_) => RetryCategory::Configuration,
            Self::Cancelled(_) => RetryCategory::Cancelled,
            Self::Internal(_) => RetryCategory::Transient,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.retry_category().is_retriable()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
