//! Context Packer: splits document text into deduplicated chunks and clips
//! one context string per section kind to that kind's character budget.
//!
//! `pack` is pure: the same input always yields the same chunks and sections,
//! so it is safe to call from any task without coordination.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::boilerplate::is_boilerplate;
use crate::config::SectionBudgets;
use crate::sections::SectionKind;

/// Blank-line paragraph boundary (after CRLF normalisation).
static PARAGRAPH_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("PARAGRAPH_SPLIT_RE regex should compile"));

/// Any whitespace run, collapsed to a single space for hashing.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE regex should compile"));

/// Terms that mark a paragraph as relevant to the technical section.
const TECHNICAL_TERMS: &[&str] = &[
    "method",
    "architecture",
    "model",
    "training",
    "dataset",
    "evaluation",
    "experiment",
    "loss",
    "optimization",
    "hyperparameter",
    "baseline",
    "ablation",
];

/// Placed between chunks in a section context.
const CHUNK_SEPARATOR: &str = "\n\n";
const SEPARATOR_CHARS: usize = 2;

/// A deduplicated paragraph of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Hex blake3 digest of the whitespace-collapsed text; unique within one packing run.
    pub id: String,
    pub text: String,
    /// Character offset of the first character on the per-run cursor.
    pub start: usize,
    /// `start` plus the chunk's character length.
    pub end: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Result of one packing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPackage {
    pub sections: BTreeMap<SectionKind, String>,
    pub chunks: Vec<Chunk>,
}

impl ContextPackage {
    /// Context for `kind`, or the empty string when nothing survived packing.
    pub fn section(&self, kind: SectionKind) -> &str {
        self.sections.get(&kind).map(String::as_str).unwrap_or("")
    }
}

/// Builds budget-clipped per-section contexts from raw document text.
#[derive(Debug, Clone, Default)]
pub struct ContextPacker {
    budgets: SectionBudgets,
}

impl ContextPacker {
    pub fn new(budgets: SectionBudgets) -> Self {
        Self { budgets }
    }

    pub fn budgets(&self) -> &SectionBudgets {
        &self.budgets
    }

    /// Package `content` into chunks and one context string per kind.
    pub fn pack(&self, content: &str) -> ContextPackage {
        let chunks = chunk_document(content);
        let sections = SectionKind::ALL
            .iter()
            .map(|&kind| (kind, self.assemble(kind, &chunks)))
            .collect();
        ContextPackage { sections, chunks }
    }

    /// Context for a single kind, used when retrying one section.
    pub fn pack_section(&self, kind: SectionKind, content: &str) -> String {
        let chunks = chunk_document(content);
        self.assemble(kind, &chunks)
    }

    fn assemble(&self, kind: SectionKind, chunks: &[Chunk]) -> String {
        let budget = self.budgets.get(kind);
        match kind {
            SectionKind::Technical => {
                let ranked = rank_for_technical(chunks);
                clip_chunks(ranked.iter().copied(), budget)
            }
            _ => clip_chunks(chunks.iter(), budget),
        }
    }
}

/// Split into trimmed paragraphs, drop boilerplate and exact duplicates, assign offsets.
pub fn chunk_document(content: &str) -> Vec<Chunk> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut seen: HashSet<String> = HashSet::new();
    let mut chunks = Vec::new();
    let mut cursor = 0usize;

    for paragraph in PARAGRAPH_SPLIT_RE.split(&content) {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() || is_boilerplate(trimmed) {
            continue;
        }
        let id = hash_chunk(&canonical_paragraph(trimmed));
        if !seen.insert(id.clone()) {
            continue;
        }
        let length = trimmed.chars().count();
        chunks.push(Chunk {
            id,
            text: trimmed.to_string(),
            start: cursor,
            end: cursor + length,
        });
        cursor += length;
    }

    chunks
}

fn canonical_paragraph(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn hash_chunk(canonical: &str) -> String {
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// Total case-insensitive occurrences of the technical terms in `text`.
pub fn technical_score(text: &str) -> usize {
    let lower = text.to_lowercase();
    TECHNICAL_TERMS
        .iter()
        .map(|term| lower.matches(term).count())
        .sum()
}

/// Stable sort by descending score; equal scores keep document order.
fn rank_for_technical(chunks: &[Chunk]) -> Vec<&Chunk> {
    let mut scored: Vec<(usize, &Chunk)> = chunks
        .iter()
        .map(|chunk| (technical_score(&chunk.text), chunk))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, chunk)| chunk).collect()
}

/// Concatenate chunks with a two-character separator without exceeding `budget` characters.
///
/// A chunk that does not fit is cut to the exact remaining character count;
/// cutting happens on `char` boundaries so multi-byte text is never split.
pub fn clip_chunks<'a>(chunks: impl IntoIterator<Item = &'a Chunk>, budget: usize) -> String {
    let mut out = String::new();
    let mut remaining = budget;

    for chunk in chunks {
        if remaining == 0 {
            break;
        }
        if !out.is_empty() {
            if remaining <= SEPARATOR_CHARS {
                break;
            }
            out.push_str(CHUNK_SEPARATOR);
            remaining -= SEPARATOR_CHARS;
        }
        let length = chunk.text.chars().count();
        if length > remaining {
            out.extend(chunk.text.chars().take(remaining));
            break;
        }
        out.push_str(&chunk.text);
        remaining -= length;
    }

    out
}
