use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub html: String,
    pub css: Option<String>,
    pub js: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateRow {
    /// Text scanned for placeholders: markup, then style, then script.
    pub fn body(&self) -> String {
        [Some(self.html.as_str()), self.css.as_deref(), self.js.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
