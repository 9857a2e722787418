//! Binding Matcher — proposes a data field for each template placeholder.
//!
//! Per placeholder:
//! 1. normalize the token (strip grammar decoration, `.` -> space, collapse whitespace)
//! 2. exact path match (case-insensitive) -> confidence 1.0, no fuzzy scoring
//! 3. fuzzy score = max(sim(path), sim(name), 0.7 * sim(description)); first best wins ties
//! 4. iteration tokens (`each` / `loop`) also score array fields by their base name
//! 5. best score below the threshold -> no suggestion
//!
//! The matcher is read-only after construction and can be shared across requests.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::fields::{flatten_fields, DataField, FlatField, PathStyle};
use crate::binding::similarity::{Similarity, SimilarityKind};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Descriptions are a weaker signal than paths and names.
const DESCRIPTION_WEIGHT: f64 = 0.7;

/// `{{#each`, `{{/if}}` and friends, whatever whitespace (if any) follows
/// the keyword. A directly attached `}}` is consumed so closing markers
/// vanish whole instead of leaving `/each` behind.
static BLOCK_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*[#/]\s*(each|if)\b\s*(?:\}\})?").expect("block marker pattern is valid")
});

/// Decorations removed during normalization, after block markers.
const DECORATIONS: &[&str] = &[
    "[[FIELD:",
    "[[LOOP:",
    "[[IF:",
    "]]",
    "{{",
    "}}",
];

const LOOP_DIRECTIVE: &str = "[[loop:";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherSettings {
    pub threshold: f64,
    pub similarity: SimilarityKind,
    pub path_style: PathStyle,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            similarity: SimilarityKind::default(),
            path_style: PathStyle::default(),
        }
    }
}

/// Best candidate for a single placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub field: String,
    pub score: f64,
}

/// Batch output: one entry per placeholder that produced a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderMatch {
    /// Literal token text as it appears in the template.
    pub placeholder: String,
    pub field: String,
    pub confidence: f64,
}

/// Comparison form of a placeholder token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPlaceholder {
    pub text: String,
    /// Token iterates over a collection (`{{#each x}}`, `[[LOOP:x]]`, or mentions each/loop).
    pub iterates: bool,
}

pub fn normalize_placeholder(raw: &str) -> NormalizedPlaceholder {
    let each_block = BLOCK_MARKER_RE
        .captures_iter(raw)
        .any(|c| &c[1] == "each");

    let mut stripped = BLOCK_MARKER_RE.replace_all(raw, " ").into_owned();
    for decoration in DECORATIONS {
        stripped = stripped.replace(decoration, " ");
    }
    let text = collapse_whitespace(&stripped.replace('.', " "));

    let text_lower = text.to_lowercase();
    let iterates = each_block
        || raw.to_lowercase().contains(LOOP_DIRECTIVE)
        || text_lower.contains("each")
        || text_lower.contains("loop");

    NormalizedPlaceholder { text, iterates }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// `text` is already normalized, so dotted paths are also compared in normalized form.
fn is_exact_path(path: &str, text: &str) -> bool {
    same_text(path, text) || same_text(&collapse_whitespace(&path.replace('.', " ")), text)
}

pub struct BindingMatcher {
    catalog: Vec<FlatField>,
    threshold: f64,
    similarity: Box<dyn Similarity>,
}

impl BindingMatcher {
    /// Matcher over `fields` with the default threshold, similarity and path style.
    pub fn new(fields: &[DataField]) -> Self {
        Self::with_settings(fields, &MatcherSettings::default())
    }

    pub fn with_settings(fields: &[DataField], settings: &MatcherSettings) -> Self {
        Self::from_catalog(
            flatten_fields(fields, settings.path_style),
            settings.threshold,
            settings.similarity.build(),
        )
    }

    pub fn from_catalog(
        catalog: Vec<FlatField>,
        threshold: f64,
        similarity: Box<dyn Similarity>,
    ) -> Self {
        Self {
            catalog,
            threshold: threshold.clamp(0.0, 1.0),
            similarity,
        }
    }

    pub fn catalog(&self) -> &[FlatField] {
        &self.catalog
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.catalog.iter().any(|f| f.path == path)
    }

    /// Best field for one placeholder token, or `None` when nothing clears the threshold.
    pub fn find_best_match(&self, placeholder: &str) -> Option<FieldMatch> {
        let normalized = normalize_placeholder(placeholder);
        if normalized.text.is_empty() {
            return None;
        }
        let text = normalized.text.as_str();

        if let Some(field) = self.catalog.iter().find(|f| is_exact_path(&f.path, text)) {
            return Some(FieldMatch {
                field: field.path.clone(),
                score: 1.0,
            });
        }

        let mut best: Option<&FlatField> = None;
        let mut best_score = 0.0_f64;

        for field in &self.catalog {
            let score = self.field_score(text, field);
            if score > best_score {
                best_score = score;
                best = Some(field);
            }
        }

        if normalized.iterates {
            for field in self.catalog.iter().filter(|f| f.is_array_path()) {
                let score = self.similarity.score(text, field.array_base());
                if score > best_score {
                    best_score = score;
                    best = Some(field);
                }
            }
        }

        let best = best?;
        if best_score >= self.threshold {
            Some(FieldMatch {
                field: best.path.clone(),
                score: best_score.clamp(0.0, 1.0),
            })
        } else {
            debug!(
                "No suggestion for {placeholder}: best '{}' scored {best_score:.3} < {:.3}",
                best.path, self.threshold
            );
            None
        }
    }

    fn field_score(&self, text: &str, field: &FlatField) -> f64 {
        let path_score = self.similarity.score(text, &field.path);
        let name_score = self.similarity.score(text, &field.name);
        let description_score = field
            .description
            .as_deref()
            .map(|d| self.similarity.score(text, d) * DESCRIPTION_WEIGHT)
            .unwrap_or(0.0);
        path_score.max(name_score).max(description_score)
    }

    /// Matches each placeholder in order, keeping only those that produced a match.
    pub fn process_placeholders(&self, placeholders: &[String]) -> Vec<PlaceholderMatch> {
        let matches: Vec<PlaceholderMatch> = placeholders
            .iter()
            .filter_map(|placeholder| {
                self.find_best_match(placeholder)
                    .map(|m| PlaceholderMatch {
                        placeholder: placeholder.clone(),
                        field: m.field,
                        confidence: m.score,
                    })
            })
            .collect();

        debug!(
            "Matched {}/{} placeholders against {} catalog fields",
            matches.len(),
            placeholders.len(),
            self.catalog.len()
        );
        matches
    }
}
