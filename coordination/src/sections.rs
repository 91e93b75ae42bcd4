//! Shared brief vocabulary: section kinds, streamed deltas, and the source document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed, ordered set of brief sections generated per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    #[serde(rename = "summary")]
    Summary,
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "deepDive")]
    DeepDive,
}

impl SectionKind {
    /// Every kind, in presentation order.
    pub const ALL: [SectionKind; 3] = [Self::Summary, Self::Technical, Self::DeepDive];

    /// Stable tag used in persisted metadata and job ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Technical => "technical",
            Self::DeepDive => "deepDive",
        }
    }

    /// Human-facing heading.
    pub fn title(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Technical => "Technical",
            Self::DeepDive => "Deep Dive",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown section tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown section kind: {0}")]
pub struct UnknownSectionKind(pub String);

impl FromStr for SectionKind {
    type Err = UnknownSectionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "technical" => Ok(Self::Technical),
            "deepdive" | "deep-dive" | "deep_dive" => Ok(Self::DeepDive),
            other => Err(UnknownSectionKind(other.to_string())),
        }
    }
}

/// A cumulative streaming update for one section.
///
/// `bullets` always carries the full list accumulated so far, never a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDelta {
    pub kind: SectionKind,
    pub bullets: Vec<String>,
    pub done: bool,
}

impl SectionDelta {
    pub fn new(kind: SectionKind, bullets: Vec<String>, done: bool) -> Self {
        Self {
            kind,
            bullets,
            done,
        }
    }
}

/// The long document a brief is generated for. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub full_text: String,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        full_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            full_text: full_text.into(),
        }
    }

    /// Whether the document carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.full_text.trim().is_empty()
    }
}
