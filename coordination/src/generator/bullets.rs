//! Bullet normalisation shared by every generation client.

use std::sync::LazyLock;

use regex::Regex;

/// Leading list marker: `-`, `*`, `+`, `•`, or an ordinal like `1.` / `2)`.
static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+•]|[0-9]+[.)])(?:\s+|$)").expect("LIST_MARKER_RE regex should compile")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE regex should compile"));

/// Normalise one bullet: strip its list marker and collapse whitespace runs.
pub fn normalize_bullet(raw: &str) -> String {
    let stripped = LIST_MARKER_RE.replace(raw, "");
    WHITESPACE_RE
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// Normalise every bullet and drop the ones left empty.
pub fn normalize_bullets<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .map(|item| normalize_bullet(item.as_ref()))
        .filter(|bullet| !bullet.is_empty())
        .collect()
}

/// Parse streamed markdown into bullets, one per non-empty line.
///
/// Headings (`### Summary`) and code fences are skipped so a model that
/// echoes the section heading does not produce a bogus first bullet.
pub fn parse_bullet_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .map(normalize_bullet)
        .filter(|bullet| !bullet.is_empty())
        .collect()
}
