//! Template and binding persistence.
//!
//! `AppState` holds an `Arc<dyn TemplateStore>`; the server uses PostgreSQL,
//! tests use the in-memory store.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::binding::BindingRow;
use crate::models::template::TemplateRow;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Concatenated markup/style/script of a template, `None` if it does not exist.
    async fn template_body(&self, template_id: Uuid) -> Result<Option<String>, AppError>;

    async fn list_bindings(&self, template_id: Uuid) -> Result<Vec<BindingRow>, AppError>;

    async fn get_binding(&self, binding_id: Uuid) -> Result<Option<BindingRow>, AppError>;

    /// Returns the binding for `placeholder`, creating it unmapped if absent.
    /// An existing binding is returned untouched.
    async fn ensure_binding(
        &self,
        template_id: Uuid,
        placeholder: &str,
    ) -> Result<BindingRow, AppError>;

    /// Sets the data field and marks the binding mapped. Re-assigning replaces the
    /// previous field. `None` if the binding does not exist.
    async fn assign_field(
        &self,
        binding_id: Uuid,
        data_field: &str,
        description: Option<&str>,
    ) -> Result<Option<BindingRow>, AppError>;

    /// Like [`TemplateStore::assign_field`] but only while the binding is still
    /// unmapped; a mapped or missing binding yields `None` and is left untouched.
    async fn assign_if_unmapped(
        &self,
        binding_id: Uuid,
        data_field: &str,
        description: Option<&str>,
    ) -> Result<Option<BindingRow>, AppError>;

    async fn delete_binding(&self, binding_id: Uuid) -> Result<bool, AppError>;

    async fn delete_template_bindings(&self, template_id: Uuid) -> Result<u64, AppError>;
}

pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn template_body(&self, template_id: Uuid) -> Result<Option<String>, AppError> {
        let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE id = $1")
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|t| t.body()))
    }

    async fn list_bindings(&self, template_id: Uuid) -> Result<Vec<BindingRow>, AppError> {
        Ok(sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM template_bindings WHERE template_id = $1 ORDER BY created_at, placeholder",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_binding(&self, binding_id: Uuid) -> Result<Option<BindingRow>, AppError> {
        Ok(
            sqlx::query_as::<_, BindingRow>("SELECT * FROM template_bindings WHERE id = $1")
                .bind(binding_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn ensure_binding(
        &self,
        template_id: Uuid,
        placeholder: &str,
    ) -> Result<BindingRow, AppError> {
        let row = BindingRow::unmapped(template_id, placeholder);
        let inserted = sqlx::query(
            r#"
            INSERT INTO template_bindings
                (id, template_id, placeholder, is_mapped, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (template_id, placeholder) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(row.template_id)
        .bind(&row.placeholder)
        .bind(row.is_mapped)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Created unmapped binding for {placeholder} on template {template_id}");
        }

        Ok(sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM template_bindings WHERE template_id = $1 AND placeholder = $2",
        )
        .bind(template_id)
        .bind(placeholder)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn assign_field(
        &self,
        binding_id: Uuid,
        data_field: &str,
        description: Option<&str>,
    ) -> Result<Option<BindingRow>, AppError> {
        Ok(sqlx::query_as::<_, BindingRow>(
            r#"
            UPDATE template_bindings
            SET data_field = $2,
                description = COALESCE($3, description),
                is_mapped = TRUE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(binding_id)
        .bind(data_field)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn assign_if_unmapped(
        &self,
        binding_id: Uuid,
        data_field: &str,
        description: Option<&str>,
    ) -> Result<Option<BindingRow>, AppError> {
        Ok(sqlx::query_as::<_, BindingRow>(
            r#"
            UPDATE template_bindings
            SET data_field = $2,
                description = COALESCE($3, description),
                is_mapped = TRUE,
                updated_at = NOW()
            WHERE id = $1 AND is_mapped = FALSE
            RETURNING *
            "#,
        )
        .bind(binding_id)
        .bind(data_field)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_binding(&self, binding_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM template_bindings WHERE id = $1")
            .bind(binding_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_template_bindings(&self, template_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM template_bindings WHERE template_id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        info!(
            "Deleted {} bindings for template {template_id}",
            result.rows_affected()
        );
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::RwLock;
    use uuid::Uuid;

    use super::TemplateStore;
    use crate::errors::AppError;
    use crate::models::binding::BindingRow;
    use crate::models::template::TemplateRow;

    #[derive(Default)]
    struct Tables {
        templates: HashMap<Uuid, TemplateRow>,
        bindings: Vec<BindingRow>,
    }

    #[derive(Default)]
    pub struct InMemoryTemplateStore {
        tables: RwLock<Tables>,
    }

    impl InMemoryTemplateStore {
        pub async fn insert_template(&self, html: &str) -> Uuid {
            let id = Uuid::new_v4();
            let row = TemplateRow {
                id,
                name: format!("template-{id}"),
                html: html.to_string(),
                css: None,
                js: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.tables.write().await.templates.insert(id, row);
            id
        }
    }

    #[async_trait]
    impl TemplateStore for InMemoryTemplateStore {
        async fn template_body(&self, template_id: Uuid) -> Result<Option<String>, AppError> {
            Ok(self
                .tables
                .read()
                .await
                .templates
                .get(&template_id)
                .map(TemplateRow::body))
        }

        async fn list_bindings(&self, template_id: Uuid) -> Result<Vec<BindingRow>, AppError> {
            Ok(self
                .tables
                .read()
                .await
                .bindings
                .iter()
                .filter(|b| b.template_id == template_id)
                .cloned()
                .collect())
        }

        async fn get_binding(&self, binding_id: Uuid) -> Result<Option<BindingRow>, AppError> {
            Ok(self
                .tables
                .read()
                .await
                .bindings
                .iter()
                .find(|b| b.id == binding_id)
                .cloned())
        }

        async fn ensure_binding(
            &self,
            template_id: Uuid,
            placeholder: &str,
        ) -> Result<BindingRow, AppError> {
            let mut tables = self.tables.write().await;
            if let Some(existing) = tables
                .bindings
                .iter()
                .find(|b| b.template_id == template_id && b.placeholder == placeholder)
            {
                return Ok(existing.clone());
            }
            let row = BindingRow::unmapped(template_id, placeholder);
            tables.bindings.push(row.clone());
            Ok(row)
        }

        async fn assign_field(
            &self,
            binding_id: Uuid,
            data_field: &str,
            description: Option<&str>,
        ) -> Result<Option<BindingRow>, AppError> {
            let mut tables = self.tables.write().await;
            let Some(row) = tables.bindings.iter_mut().find(|b| b.id == binding_id) else {
                return Ok(None);
            };
            row.data_field = Some(data_field.to_string());
            if let Some(description) = description {
                row.description = Some(description.to_string());
            }
            row.is_mapped = true;
            row.updated_at = Utc::now();
            Ok(Some(row.clone()))
        }

        async fn assign_if_unmapped(
            &self,
            binding_id: Uuid,
            data_field: &str,
            description: Option<&str>,
        ) -> Result<Option<BindingRow>, AppError> {
            let mut tables = self.tables.write().await;
            let Some(row) = tables
                .bindings
                .iter_mut()
                .find(|b| b.id == binding_id && !b.is_mapped)
            else {
                return Ok(None);
            };
            row.data_field = Some(data_field.to_string());
            if let Some(description) = description {
                row.description = Some(description.to_string());
            }
            row.is_mapped = true;
            row.updated_at = Utc::now();
            Ok(Some(row.clone()))
        }

        async fn delete_binding(&self, binding_id: Uuid) -> Result<bool, AppError> {
            let mut tables = self.tables.write().await;
            let before = tables.bindings.len();
            tables.bindings.retain(|b| b.id != binding_id);
            Ok(tables.bindings.len() < before)
        }

        async fn delete_template_bindings(&self, template_id: Uuid) -> Result<u64, AppError> {
            let mut tables = self.tables.write().await;
            let before = tables.bindings.len();
            tables.bindings.retain(|b| b.template_id != template_id);
            Ok((before - tables.bindings.len()) as u64)
        }
    }

    #[tokio::test]
    async fn test_ensure_binding_is_idempotent() {
        let store = InMemoryTemplateStore::default();
        let template_id = store.insert_template("{{email}}").await;

        let first = store.ensure_binding(template_id, "{{email}}").await.unwrap();
        let second = store.ensure_binding(template_id, "{{email}}").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_bindings(template_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_replaces_previous_field() {
        let store = InMemoryTemplateStore::default();
        let template_id = store.insert_template("{{email}}").await;
        let binding = store.ensure_binding(template_id, "{{email}}").await.unwrap();

        store.assign_field(binding.id, "phone", None).await.unwrap();
        let row = store
            .assign_field(binding.id, "email", Some("contact"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.data_field.as_deref(), Some("email"));
        assert_eq!(row.description.as_deref(), Some("contact"));
        assert!(row.is_mapped);
        assert_eq!(store.list_bindings(template_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_if_unmapped_keeps_existing_mapping() {
        let store = InMemoryTemplateStore::default();
        let template_id = store.insert_template("{{name}}").await;
        let binding = store.ensure_binding(template_id, "{{name}}").await.unwrap();

        store.assign_field(binding.id, "lastName", None).await.unwrap();
        assert!(store
            .assign_if_unmapped(binding.id, "firstName", None)
            .await
            .unwrap()
            .is_none());
        let stored = store.get_binding(binding.id).await.unwrap().unwrap();
        assert_eq!(stored.data_field.as_deref(), Some("lastName"));

        assert!(store
            .assign_if_unmapped(Uuid::new_v4(), "firstName", None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_single_and_bulk() {
        let store = InMemoryTemplateStore::default();
        let a = store.insert_template("").await;
        let b = store.insert_template("").await;
        let first = store.ensure_binding(a, "{{x}}").await.unwrap();
        store.ensure_binding(a, "{{y}}").await.unwrap();
        store.ensure_binding(b, "{{x}}").await.unwrap();

        assert!(store.delete_binding(first.id).await.unwrap());
        assert!(!store.delete_binding(first.id).await.unwrap());
        assert_eq!(store.delete_template_bindings(a).await.unwrap(), 1);
        assert_eq!(store.list_bindings(b).await.unwrap().len(), 1);
    }
}
