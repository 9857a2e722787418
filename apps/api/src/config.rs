use anyhow::{anyhow, Context, Result};

use crate::binding::fields::PathStyle;
use crate::binding::matcher::{MatcherSettings, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::binding::similarity::SimilarityKind;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Minimum confidence for a suggestion to be surfaced.
    pub confidence_threshold: f64,
    pub similarity: SimilarityKind,
    /// Flatten nested fields with parent-qualified paths.
    pub qualify_nested_paths: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            confidence_threshold: match std::env::var("BINDING_CONFIDENCE_THRESHOLD") {
                Ok(raw) => parse_threshold(&raw)?,
                Err(_) => DEFAULT_CONFIDENCE_THRESHOLD,
            },
            similarity: match std::env::var("BINDING_SIMILARITY") {
                Ok(raw) => raw
                    .parse::<SimilarityKind>()
                    .map_err(|e| anyhow!(e))
                    .context("BINDING_SIMILARITY is invalid")?,
                Err(_) => SimilarityKind::default(),
            },
            qualify_nested_paths: match std::env::var("BINDING_QUALIFY_NESTED_PATHS") {
                Ok(raw) => parse_flag(&raw).context("BINDING_QUALIFY_NESTED_PATHS is invalid")?,
                Err(_) => false,
            },
        })
    }

    pub fn matcher_settings(&self) -> MatcherSettings {
        MatcherSettings {
            threshold: self.confidence_threshold,
            similarity: self.similarity,
            path_style: if self.qualify_nested_paths {
                PathStyle::Qualified
            } else {
                PathStyle::Declared
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_threshold(raw: &str) -> Result<f64> {
    let value = raw
        .trim()
        .parse::<f64>()
        .context("BINDING_CONFIDENCE_THRESHOLD must be a number")?;
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!(
            "BINDING_CONFIDENCE_THRESHOLD must be within [0, 1], got {value}"
        ));
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}
