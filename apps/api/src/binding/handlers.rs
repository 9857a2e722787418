//! Axum route handlers for the Binding API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::binding::discovery::{build_suggestions, discover_bindings};
use crate::binding::extractor::{extract_placeholders, unique_placeholders};
use crate::binding::fields::FlatField;
use crate::binding::matcher::PlaceholderMatch;
use crate::binding::review::{BindingSuggestion, ReviewOutcome, ReviewSession};
use crate::binding::similarity::SimilarityKind;
use crate::errors::AppError;
use crate::models::binding::BindingRow;
use crate::state::AppState;

/// Upper bound on placeholders per match request; callers page larger sets.
pub const MAX_MATCH_BATCH: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    /// Every token in scan order, duplicates included.
    pub placeholders: Vec<String>,
    /// Distinct tokens, first appearance order.
    pub unique: Vec<String>,
}

impl ExtractResponse {
    fn scan(content: &str) -> Self {
        Self {
            placeholders: extract_placeholders(content),
            unique: unique_placeholders(content),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub placeholders: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub matches: Vec<PlaceholderMatch>,
    /// Placeholders that cleared no field; no suggestion, not an error.
    pub unmatched: Vec<String>,
    pub threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct FieldCatalogResponse {
    pub threshold: f64,
    pub similarity: SimilarityKind,
    pub fields: Vec<FlatField>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub template_id: Uuid,
    pub suggestions: Vec<BindingSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct AcceptAllResponse {
    pub accepted: Vec<BindingRow>,
}

#[derive(Debug, Serialize)]
pub struct DeleteBindingsResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(alias = "selector")]
    pub data_field: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Stateless matching
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/placeholders/extract
pub async fn handle_extract(Json(request): Json<ExtractRequest>) -> Json<ExtractResponse> {
    Json(ExtractResponse::scan(request.content.as_deref().unwrap_or("")))
}

/// POST /api/v1/bindings/match
///
/// Runs the batch matcher over the configured field catalog.
pub async fn handle_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    if request.placeholders.len() > MAX_MATCH_BATCH {
        return Err(AppError::Validation(format!(
            "At most {MAX_MATCH_BATCH} placeholders per request, got {}",
            request.placeholders.len()
        )));
    }

    let matches = state.matcher.process_placeholders(&request.placeholders);
    let unmatched = request
        .placeholders
        .iter()
        .filter(|p| !matches.iter().any(|m| &m.placeholder == *p))
        .cloned()
        .collect();

    Ok(Json(MatchResponse {
        matches,
        unmatched,
        threshold: state.matcher.threshold(),
    }))
}

/// GET /api/v1/fields
pub async fn handle_list_fields(State(state): State<AppState>) -> Json<FieldCatalogResponse> {
    Json(FieldCatalogResponse {
        threshold: state.matcher.threshold(),
        similarity: state.config.similarity,
        fields: state.matcher.catalog().to_vec(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Template bindings
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/templates/:id/placeholders
pub async fn handle_template_placeholders(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<ExtractResponse>, AppError> {
    let body = state
        .store
        .template_body(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {template_id} not found")))?;
    Ok(Json(ExtractResponse::scan(&body)))
}

/// GET /api/v1/templates/:id/bindings
pub async fn handle_list_bindings(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Vec<BindingRow>>, AppError> {
    Ok(Json(state.store.list_bindings(template_id).await?))
}

/// DELETE /api/v1/templates/:id/bindings
///
/// Also closes the template's review session; its suggestions point at deleted rows.
pub async fn handle_delete_template_bindings(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<DeleteBindingsResponse>, AppError> {
    state.close_review(template_id).await;
    let deleted = state.store.delete_template_bindings(template_id).await?;
    Ok(Json(DeleteBindingsResponse { deleted }))
}

/// POST /api/v1/templates/:id/bindings/discover
pub async fn handle_discover(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Vec<BindingRow>>, AppError> {
    Ok(Json(discover_bindings(state.store.as_ref(), template_id).await?))
}

/// PUT /api/v1/bindings/:id
///
/// Manual assignment. Replaces any previous field and marks the binding mapped.
/// A pending suggestion for the same binding is superseded so a later
/// Accept / AcceptAll cannot overwrite the manual choice.
pub async fn handle_assign(
    State(state): State<AppState>,
    Path(binding_id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<BindingRow>, AppError> {
    let data_field = request.data_field.trim();
    if data_field.is_empty() {
        return Err(AppError::Validation("data_field cannot be empty".to_string()));
    }
    if !state.matcher.has_field(data_field) {
        return Err(AppError::Validation(format!(
            "Unknown data field '{data_field}'"
        )));
    }

    let binding = state
        .store
        .assign_field(binding_id, data_field, request.description.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Binding {binding_id} not found")))?;

    info!(
        "Binding {binding_id} manually mapped to {data_field} on template {}",
        binding.template_id
    );
    if let Some(session) = state.review_session(binding.template_id).await {
        session.lock().await.supersede(binding_id);
    }
    Ok(Json(binding))
}

/// DELETE /api/v1/bindings/:id
pub async fn handle_delete_binding(
    State(state): State<AppState>,
    Path(binding_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_binding(binding_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Binding {binding_id} not found")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suggestion review
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/templates/:id/suggestions
///
/// Discovers bindings, matches the unmapped ones, and opens a fresh review session.
pub async fn handle_suggest(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let bindings = discover_bindings(state.store.as_ref(), template_id).await?;
    let suggestions = build_suggestions(&state.matcher, &bindings);

    info!(
        "Template {template_id}: {} suggestions for {} unmapped bindings",
        suggestions.len(),
        bindings.iter().filter(|b| !b.is_mapped).count()
    );

    let session = ReviewSession::open(template_id, suggestions.clone(), state.review_events.clone());
    state.open_review(session).await;

    Ok(Json(SuggestionsResponse {
        template_id,
        suggestions,
    }))
}

/// GET /api/v1/templates/:id/suggestions
pub async fn handle_get_suggestions(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let session = state
        .review_session(template_id)
        .await
        .ok_or_else(|| no_session(template_id))?;
    let session = session.lock().await;
    Ok(Json(SuggestionsResponse {
        template_id: session.template_id(),
        suggestions: session.pending().to_vec(),
    }))
}

/// POST /api/v1/templates/:id/suggestions/accept-all
pub async fn handle_accept_all(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<AcceptAllResponse>, AppError> {
    let session = state
        .review_session(template_id)
        .await
        .ok_or_else(|| no_session(template_id))?;
    let accepted = session
        .lock()
        .await
        .accept_all(state.store.as_ref())
        .await?;

    info!("Template {template_id}: accepted {} suggestions", accepted.len());
    Ok(Json(AcceptAllResponse { accepted }))
}

/// POST /api/v1/templates/:id/suggestions/:binding_id/accept
pub async fn handle_accept(
    State(state): State<AppState>,
    Path((template_id, binding_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReviewOutcome>, AppError> {
    let session = state
        .review_session(template_id)
        .await
        .ok_or_else(|| no_session(template_id))?;
    let outcome = session
        .lock()
        .await
        .accept(binding_id, state.store.as_ref())
        .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/templates/:id/suggestions/:binding_id/dismiss
pub async fn handle_dismiss(
    State(state): State<AppState>,
    Path((template_id, binding_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReviewOutcome>, AppError> {
    let session = state
        .review_session(template_id)
        .await
        .ok_or_else(|| no_session(template_id))?;
    let outcome = session.lock().await.dismiss(binding_id)?;
    Ok(Json(outcome))
}

fn no_session(template_id: Uuid) -> AppError {
    AppError::NotFound(format!(
        "No open suggestion review for template {template_id}"
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::binding::fields::resume_schema;
    use crate::binding::matcher::BindingMatcher;
    use crate::binding::review::TracingEventSink;
    use crate::binding::store::memory::InMemoryTemplateStore;
    use crate::binding::store::TemplateStore;
    use crate::config::Config;

    const TEMPLATE: &str =
        "<h1>{{firstName}}</h1><p>[[FIELD:email]]</p><span>{{zzzz}}</span>";

    async fn test_state() -> (AppState, Arc<InMemoryTemplateStore>, Uuid) {
        let store = Arc::new(InMemoryTemplateStore::default());
        let template_id = store.insert_template(TEMPLATE).await;
        let config = Config {
            database_url: String::new(),
            port: 0,
            rust_log: "debug".to_string(),
            confidence_threshold: 0.4,
            similarity: SimilarityKind::Subsequence,
            qualify_nested_paths: false,
        };
        let matcher = Arc::new(BindingMatcher::with_settings(
            &resume_schema(),
            &config.matcher_settings(),
        ));
        let state = AppState::new(config, store.clone(), matcher, Arc::new(TracingEventSink));
        (state, store, template_id)
    }

    #[tokio::test]
    async fn test_extract_absent_content_is_empty() {
        let Json(response) = handle_extract(Json(ExtractRequest { content: None })).await;
        assert!(response.placeholders.is_empty());
        assert!(response.unique.is_empty());
    }

    #[tokio::test]
    async fn test_match_reports_unmatched_separately() {
        let (state, _, _) = test_state().await;
        let request = MatchRequest {
            placeholders: vec!["{{email}}".to_string(), "{{zzzz}}".to_string()],
        };
        let Json(response) = handle_match(State(state), Json(request)).await.unwrap();
        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].field, "email");
        assert_eq!(response.unmatched, vec!["{{zzzz}}"]);
        assert_eq!(response.threshold, 0.4);
    }

    #[tokio::test]
    async fn test_match_rejects_oversized_batch() {
        let (state, _, _) = test_state().await;
        let request = MatchRequest {
            placeholders: vec!["{{email}}".to_string(); MAX_MATCH_BATCH + 1],
        };
        let result = handle_match(State(state), Json(request)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_template_placeholders_unknown_template() {
        let (state, _, _) = test_state().await;
        let result = handle_template_placeholders(State(state), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_suggest_then_accept_all() {
        let (state, store, template_id) = test_state().await;

        let Json(suggested) = handle_suggest(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        let fields: Vec<_> = suggested
            .suggestions
            .iter()
            .map(|s| s.suggested_field.as_str())
            .collect();
        assert_eq!(fields, vec!["firstName", "email"]);

        let Json(result) = handle_accept_all(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        assert_eq!(result.accepted.len(), 2);

        let bindings = store.list_bindings(template_id).await.unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.iter().filter(|b| b.is_mapped).count(), 2);

        // A fresh run only proposes for what is still unmapped.
        let Json(again) = handle_suggest(State(state), Path(template_id)).await.unwrap();
        assert!(again.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_accept_dismiss_single() {
        let (state, store, template_id) = test_state().await;
        let Json(suggested) = handle_suggest(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        let first = suggested.suggestions[0].binding.id;
        let second = suggested.suggestions[1].binding.id;

        let Json(outcome) = handle_accept(State(state.clone()), Path((template_id, first)))
            .await
            .unwrap();
        assert!(matches!(outcome, ReviewOutcome::Accepted { .. }));

        let Json(repeat) = handle_accept(State(state.clone()), Path((template_id, first)))
            .await
            .unwrap();
        assert_eq!(repeat, ReviewOutcome::AlreadyAccepted { binding_id: first });

        handle_dismiss(State(state.clone()), Path((template_id, second)))
            .await
            .unwrap();
        let conflict = handle_accept(State(state.clone()), Path((template_id, second))).await;
        assert!(matches!(conflict, Err(AppError::Conflict(_))));

        let Json(pending) = handle_get_suggestions(State(state), Path(template_id))
            .await
            .unwrap();
        assert!(pending.suggestions.is_empty());
        assert!(!store.get_binding(second).await.unwrap().unwrap().is_mapped);
    }

    #[tokio::test]
    async fn test_manual_assign_survives_accept_all() {
        let (state, store, template_id) = test_state().await;
        let Json(suggested) = handle_suggest(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        let first_name = suggested
            .suggestions
            .iter()
            .find(|s| s.suggested_field == "firstName")
            .unwrap()
            .binding
            .id;

        handle_assign(
            State(state.clone()),
            Path(first_name),
            Json(AssignRequest {
                data_field: "lastName".to_string(),
                description: None,
            }),
        )
        .await
        .unwrap();

        let Json(pending) = handle_get_suggestions(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        assert!(pending.suggestions.iter().all(|s| s.binding.id != first_name));

        let Json(result) = handle_accept_all(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        assert_eq!(result.accepted.len(), 1);

        let stored = store.get_binding(first_name).await.unwrap().unwrap();
        assert_eq!(stored.data_field.as_deref(), Some("lastName"));

        let Json(repeat) = handle_accept(State(state), Path((template_id, first_name)))
            .await
            .unwrap();
        assert_eq!(repeat, ReviewOutcome::AlreadyMapped { binding_id: first_name });
    }

    #[tokio::test]
    async fn test_busy_session_does_not_block_other_templates() {
        let (state, store, template_id) = test_state().await;
        let other_id = store.insert_template("<p>{{email}}</p>").await;
        handle_suggest(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        handle_suggest(State(state.clone()), Path(other_id))
            .await
            .unwrap();

        let busy = state.review_session(template_id).await.unwrap();
        let _held = busy.lock().await;

        let Json(result) = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            handle_accept_all(State(state.clone()), Path(other_id)),
        )
        .await
        .expect("other template's review should not wait")
        .unwrap();
        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.accepted[0].data_field.as_deref(), Some("email"));

        let Json(listed) = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            handle_list_bindings(State(state), Path(template_id)),
        )
        .await
        .expect("store reads should not wait on a review")
        .unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn test_review_without_session_is_not_found() {
        let (state, _, template_id) = test_state().await;
        let result = handle_accept_all(State(state), Path(template_id)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_manual_assign_validates_field() {
        let (state, _, template_id) = test_state().await;
        let Json(bindings) = handle_discover(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        let zzzz = bindings
            .iter()
            .find(|b| b.placeholder == "{{zzzz}}")
            .unwrap()
            .id;

        let unknown = handle_assign(
            State(state.clone()),
            Path(zzzz),
            Json(AssignRequest {
                data_field: "notAField".to_string(),
                description: None,
            }),
        )
        .await;
        assert!(matches!(unknown, Err(AppError::Validation(_))));

        let Json(assigned) = handle_assign(
            State(state),
            Path(zzzz),
            Json(AssignRequest {
                data_field: "hobbies".to_string(),
                description: Some("Footer hobbies line".to_string()),
            }),
        )
        .await
        .unwrap();
        assert!(assigned.is_mapped);
        assert_eq!(assigned.data_field.as_deref(), Some("hobbies"));
    }

    #[tokio::test]
    async fn test_delete_bindings_closes_review() {
        let (state, _, template_id) = test_state().await;
        handle_suggest(State(state.clone()), Path(template_id))
            .await
            .unwrap();

        let Json(deleted) = handle_delete_template_bindings(State(state.clone()), Path(template_id))
            .await
            .unwrap();
        assert_eq!(deleted.deleted, 3);

        let result = handle_get_suggestions(State(state.clone()), Path(template_id)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let missing = handle_delete_binding(State(state), Path(Uuid::new_v4())).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_assign_request_accepts_selector_alias() {
        let request: AssignRequest =
            serde_json::from_str(r#"{"selector": "email"}"#).unwrap();
        assert_eq!(request.data_field, "email");
        assert!(request.description.is_none());
    }
}
