//! Binding discovery and suggestion runs for stored templates.

use tracing::info;
use uuid::Uuid;

use crate::binding::extractor::unique_placeholders;
use crate::binding::matcher::BindingMatcher;
use crate::binding::review::BindingSuggestion;
use crate::binding::store::TemplateStore;
use crate::errors::AppError;
use crate::models::binding::BindingRow;

/// Ensures every distinct placeholder of the template has a binding, creating
/// missing ones unmapped. Existing bindings are left as they are.
///
/// Returns the bindings of the discovered placeholders, in placeholder order.
pub async fn discover_bindings(
    store: &dyn TemplateStore,
    template_id: Uuid,
) -> Result<Vec<BindingRow>, AppError> {
    let body = store
        .template_body(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {template_id} not found")))?;

    let placeholders = unique_placeholders(&body);
    let mut bindings = Vec::with_capacity(placeholders.len());
    for placeholder in &placeholders {
        bindings.push(store.ensure_binding(template_id, placeholder).await?);
    }

    info!(
        "Discovered {} placeholders for template {template_id} ({} mapped)",
        bindings.len(),
        bindings.iter().filter(|b| b.is_mapped).count()
    );
    Ok(bindings)
}

/// Runs the matcher over the unmapped bindings. Mapped bindings and placeholders
/// without a match produce no suggestion.
pub fn build_suggestions(matcher: &BindingMatcher, bindings: &[BindingRow]) -> Vec<BindingSuggestion> {
    let unmapped: Vec<&BindingRow> = bindings.iter().filter(|b| !b.is_mapped).collect();
    let placeholders: Vec<String> = unmapped.iter().map(|b| b.placeholder.clone()).collect();

    matcher
        .process_placeholders(&placeholders)
        .into_iter()
        .filter_map(|m| {
            unmapped
                .iter()
                .find(|b| b.placeholder == m.placeholder)
                .map(|binding| BindingSuggestion {
                    binding: (*binding).clone(),
                    suggested_field: m.field,
                    confidence: m.confidence,
                })
        })
        .collect()
}
