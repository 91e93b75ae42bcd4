//! Boilerplate detection for paragraphs that carry no content worth sending to a model.

use std::sync::LazyLock;

use regex::Regex;

/// Headings dropped outright (exact match, case-insensitive).
const HEADING_WORDS: &[&str] = &["abstract", "introduction", "keywords"];

/// Prefixes that mark back-matter or legal text.
const BOILERPLATE_PREFIXES: &[&str] = &["references", "acknowledg", "copyright"];

/// Substrings that mark identifier or license lines anywhere in a paragraph.
const BOILERPLATE_MARKERS: &[&str] = &["arxiv:", "license"];

/// `doi` as a word, so prose like "doing" survives.
static DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdoi\b").expect("DOI_RE regex should compile"));

/// Single tokens up to this many characters are treated as stray headings or page furniture.
const MAX_STRAY_TOKEN_CHARS: usize = 12;

/// Whether `paragraph` (already trimmed) should be excluded from every section context.
///
/// A paragraph is boilerplate when it is empty, is a bare section heading,
/// starts a references/acknowledgments/copyright block, mentions a DOI,
/// arXiv identifier or license, is a single short token, or has fewer than
/// one letter in every five characters.
pub fn is_boilerplate(paragraph: &str) -> bool {
    let lower = paragraph.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    if HEADING_WORDS.contains(&lower.as_str()) {
        return true;
    }
    if BOILERPLATE_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return true;
    }
    if BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m)) || DOI_RE.is_match(&lower) {
        return true;
    }

    let total = lower.chars().count();
    if total <= MAX_STRAY_TOKEN_CHARS && !lower.chars().any(char::is_whitespace) {
        return true;
    }

    let letters = lower.chars().filter(|c| c.is_alphabetic()).count();
    letters * 5 < total
}
