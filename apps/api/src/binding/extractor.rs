//! Placeholder Extractor — scans template text for binding tokens.
//!
//! Two grammars are scanned independently over the same input:
//! - interpolation / iteration: `{{firstName}}`, `{{#each workExperience}}`, `{{/each}}`
//! - typed directives: `[[FIELD:x]]`, `[[LOOP:x]]`, `[[IF:x]]`
//!
//! Malformed or unterminated tokens simply do not match.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// `{{ ... }}` with no embedded braces.
static BRACE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("brace token pattern is valid"));

/// `[[FIELD:...]]`, `[[LOOP:...]]`, `[[IF:...]]` with a body free of `]`.
static DIRECTIVE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[(?:FIELD|LOOP|IF):[^\]]*\]\]").expect("directive token pattern is valid")
});

/// Returns every placeholder token in `content`, verbatim.
///
/// All brace tokens come first (in order found), then all directive tokens.
/// Duplicates are kept; use [`unique_placeholders`] for the distinct set.
pub fn extract_placeholders(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    BRACE_TOKEN_RE
        .find_iter(content)
        .chain(DIRECTIVE_TOKEN_RE.find_iter(content))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct placeholder tokens, order of first appearance preserved.
pub fn unique_placeholders(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    extract_placeholders(content)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}
