use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted association between one template placeholder and one data field path.
/// `is_mapped` is false while the binding only carries an unconfirmed suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BindingRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub placeholder: String,
    #[serde(alias = "selector")]
    pub data_field: Option<String>,
    pub description: Option<String>,
    pub is_mapped: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BindingRow {
    pub fn unmapped(template_id: Uuid, placeholder: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_id,
            placeholder: placeholder.to_string(),
            data_field: None,
            description: None,
            is_mapped: false,
            created_at: now,
            updated_at: now,
        }
    }
}
