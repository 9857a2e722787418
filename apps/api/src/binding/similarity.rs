//! String similarity primitives used by the binding matcher.
//!
//! Contract shared by every implementation: case-insensitive, symmetric,
//! result in [0, 1], identical strings score 1, empty vs non-empty scores 0.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Greedy forward subsequence overlap: `2 * matches / (len_a + len_b)`.
///
/// Each character of one string consumes the next equal, not-yet-consumed
/// character of the other. The scan runs in both directions and the larger
/// count is kept so the measure stays symmetric.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySubsequence;

impl Similarity for GreedySubsequence {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.to_lowercase().chars().collect();
        let b: Vec<char> = b.to_lowercase().chars().collect();

        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let matches = forward_matches(&a, &b).max(forward_matches(&b, &a));
        (2.0 * matches as f64 / (a.len() + b.len()) as f64).clamp(0.0, 1.0)
    }
}

fn forward_matches(a: &[char], b: &[char]) -> usize {
    let mut matches = 0;
    let mut cursor = 0;
    for ch in a {
        if let Some(offset) = b[cursor..].iter().position(|c| c == ch) {
            matches += 1;
            cursor += offset + 1;
            if cursor == b.len() {
                break;
            }
        }
    }
    matches
}

/// Sørensen–Dice coefficient over character bigrams.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiceCoefficient;

impl Similarity for DiceCoefficient {
    fn score(&self, a: &str, b: &str) -> f64 {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        strsim::sorensen_dice(&a, &b).clamp(0.0, 1.0)
    }
}

/// Jaro-Winkler similarity; rewards a shared prefix.
///
/// Arguments are passed to the scorer in sorted order so the greedy match
/// window sees the same pair regardless of call order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        let (a, b) = (a.to_lowercase(), b.to_lowercase());
        if a == b {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let (lo, hi) = if a <= b { (&a, &b) } else { (&b, &a) };
        strsim::jaro_winkler(lo, hi).clamp(0.0, 1.0)
    }
}

/// Selects a similarity implementation from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    Subsequence,
    Dice,
    JaroWinkler,
}

impl SimilarityKind {
    pub fn build(self) -> Box<dyn Similarity> {
        match self {
            SimilarityKind::Subsequence => Box::new(GreedySubsequence),
            SimilarityKind::Dice => Box::new(DiceCoefficient),
            SimilarityKind::JaroWinkler => Box::new(JaroWinkler),
        }
    }
}

impl FromStr for SimilarityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subsequence" => Ok(SimilarityKind::Subsequence),
            "dice" => Ok(SimilarityKind::Dice),
            "jaro_winkler" | "jaro-winkler" => Ok(SimilarityKind::JaroWinkler),
            other => Err(format!(
                "unknown similarity '{other}', expected 'subsequence', 'dice' or 'jaro_winkler'"
            )),
        }
    }
}
