//! Prompt builders for brief sections and follow-up questions.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever the wording of any
//! template changes, so persisted output can be traced back to the prompt
//! that produced it.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use coordination::SectionKind;
use regex::Regex;

/// Prompt version. Bump on any template change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Character budget for the context attached to a question.
pub const MAX_ANSWER_CHARS: usize = 120_000;

const FALLBACK_TITLE: &str = "the paper";

const SECTION_PREAMBLE: &str = "\
You are guiding a researcher through S. Keshav's three-pass reading method.";

const SUMMARY_DIRECTIVES: &str = "\
Return 3-5 concise top-level bullets covering the problem domain, leading prior work, \
the proposed approach with key contributions, and evaluation results. \
Use two-space indents for nested clarifications.";

const TECHNICAL_DIRECTIVES: &str = "\
Return 3-7 bullets covering assumptions, dataset details, architecture, \
training/evaluation protocols, and reproducibility cues. Include nested sub-bullets \
(two spaces per depth) and feel free to embed inline `code`, $LaTeX$, and markdown \
tables for clarity.";

const DEEP_DIVE_DIRECTIVES: &str = "\
Return exactly 3 bullets describing influential cited or related works, each noting \
the insight or why it matters. Use nested sub-bullets to highlight follow-up \
resources or comparisons.";

const ANSWER_PREAMBLE: &str = "\
You are an expert research assistant. Use ONLY the provided context to answer the question.
If the answer isn't present, say you couldn't find it.";

/// Words too common in questions to locate relevant sentences.
const STOPWORDS: &[&str] = &[
    "what", "why", "how", "is", "the", "a", "an", "of", "does", "do", "paper", "method",
    "result", "in", "on", "for", "are", "be", "use", "using",
];

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

fn section_heading(kind: SectionKind) -> String {
    format!("### {}", kind.title())
}

fn section_label(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Summary => "summary",
        SectionKind::Technical => "technical",
        SectionKind::DeepDive => "deep-dive",
    }
}

fn section_directives(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Summary => SUMMARY_DIRECTIVES,
        SectionKind::Technical => TECHNICAL_DIRECTIVES,
        SectionKind::DeepDive => DEEP_DIVE_DIRECTIVES,
    }
}

fn title_or_fallback(title: &str) -> &str {
    let title = title.trim();
    if title.is_empty() {
        FALLBACK_TITLE
    } else {
        title
    }
}

/// Prompt for one streamed brief section. The model is asked for plain
/// markdown bullets so partial output can be parsed line by line.
pub fn section_prompt(kind: SectionKind, title: &str, context: &str) -> String {
    format!(
        "{SECTION_PREAMBLE}\n\
Write the {label} section as standalone markdown that begins with \"{heading}\" followed by \
structured bullet lists (top-level bullets prefixed with \"- \" and nested bullets indented \
by two additional spaces).\n\
{directives}\n\
Avoid wrapping the output in JSON or prose; emit only the markdown lines.\n\n\
Paper title: {title}\n\n\
Context:\n{context}",
        label = section_label(kind),
        heading = section_heading(kind),
        directives = section_directives(kind),
        title = title_or_fallback(title),
    )
}

/// Prompt for a follow-up question. `context` should already be narrowed
/// with [`extract_question_context`].
pub fn answer_prompt(title: &str, context: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(context.len() + question.len() + 256);
    prompt.push_str(ANSWER_PREAMBLE);
    prompt.push_str("\n\n");
    if !title.trim().is_empty() {
        prompt.push_str("Paper title: ");
        prompt.push_str(title.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str("Context:\n");
    prompt.push_str(context);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nAnswer:");
    prompt
}

/// Trim, then keep at most `limit` characters. A zero limit disables clipping.
pub fn clip_text(text: &str, limit: usize) -> &str {
    let text = text.trim();
    if limit == 0 {
        return text;
    }
    match text.char_indices().nth(limit) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Significant lowercase tokens of a question: at least three characters
/// and not a stopword.
pub fn question_keywords(question: &str) -> BTreeSet<String> {
    let lowered = question.to_lowercase();
    let collapsed = WHITESPACE_RE.replace_all(&lowered, " ");
    collapsed
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 3)
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Split on `.`, `!` and `?`, keeping the terminator with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Sentences mentioning any question keyword, joined and clipped to
/// `limit`. Falls back to the clipped document when the question has no
/// keywords or nothing matches.
pub fn extract_question_context(content: &str, question: &str, limit: usize) -> String {
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }
    let keywords = question_keywords(question);
    if keywords.is_empty() {
        return clip_text(content, limit).to_string();
    }

    let mut matches = Vec::new();
    let mut total = 0;
    for sentence in split_sentences(content) {
        let lower = sentence.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k.as_str())) {
            matches.push(sentence);
            total += sentence.len();
        }
        if limit > 0 && total >= limit {
            break;
        }
    }

    if matches.is_empty() {
        return clip_text(content, limit).to_string();
    }
    clip_text(&matches.join(" "), limit).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_prompt_names_heading_and_title() {
        let prompt = section_prompt(SectionKind::DeepDive, "Attention", "ctx body");
        assert!(prompt.contains("\"### Deep Dive\""));
        assert!(prompt.contains("deep-dive section"));
        assert!(prompt.contains("exactly 3 bullets"));
        assert!(prompt.contains("Paper title: Attention"));
        assert!(prompt.ends_with("Context:\nctx body"));
    }

    #[test]
    fn test_section_prompt_untitled() {
        let prompt = section_prompt(SectionKind::Summary, "  ", "x");
        assert!(prompt.contains("Paper title: the paper"));
    }

    #[test]
    fn test_answer_prompt_layout() {
        let prompt = answer_prompt("T", "some context", "Why?");
        assert!(prompt.starts_with("You are an expert research assistant."));
        assert!(prompt.contains("Paper title: T\n\nContext:\nsome context\n\nQuestion: Why?\nAnswer:"));

        let untitled = answer_prompt("", "c", "q");
        assert!(!untitled.contains("Paper title"));
    }

    #[test]
    fn test_clip_text_counts_chars() {
        assert_eq!(clip_text("  héllo  ", 2), "hé");
        assert_eq!(clip_text("abc", 10), "abc");
        assert_eq!(clip_text(" abc ", 0), "abc");
    }

    #[test]
    fn test_question_keywords_drop_stopwords() {
        let keywords = question_keywords("What dataset is used for the  evaluation?");
        assert_eq!(
            keywords.into_iter().collect::<Vec<_>>(),
            vec!["dataset", "evaluation", "used"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_tail() {
        assert_eq!(
            split_sentences("One. Two! Three? tail"),
            vec!["One.", "Two!", "Three?", "tail"]
        );
    }

    #[test]
    fn test_extract_question_context_prefers_matching_sentences() {
        let content = "Intro text. We train on ImageNet. Results are strong. ImageNet has 1k classes.";
        let context = extract_question_context(content, "Which ImageNet split?", 1_000);
        assert_eq!(context, "We train on ImageNet. ImageNet has 1k classes.");
    }

    #[test]
    fn test_extract_question_context_falls_back_to_document() {
        let content = "Alpha beta. Gamma delta.";
        assert_eq!(extract_question_context(content, "what is it?", 5), "Alpha");
        assert_eq!(
            extract_question_context(content, "unrelated keyword", 100),
            content
        );
        assert_eq!(extract_question_context("   ", "anything", 100), "");
    }
}
