pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::binding::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless extraction / matching
        .route(
            "/api/v1/placeholders/extract",
            post(handlers::handle_extract),
        )
        .route("/api/v1/bindings/match", post(handlers::handle_match))
        .route("/api/v1/fields", get(handlers::handle_list_fields))
        // Template bindings
        .route(
            "/api/v1/templates/:id/placeholders",
            get(handlers::handle_template_placeholders),
        )
        .route(
            "/api/v1/templates/:id/bindings",
            get(handlers::handle_list_bindings).delete(handlers::handle_delete_template_bindings),
        )
        .route(
            "/api/v1/templates/:id/bindings/discover",
            post(handlers::handle_discover),
        )
        .route(
            "/api/v1/bindings/:id",
            put(handlers::handle_assign).delete(handlers::handle_delete_binding),
        )
        // Suggestion review
        .route(
            "/api/v1/templates/:id/suggestions",
            get(handlers::handle_get_suggestions).post(handlers::handle_suggest),
        )
        .route(
            "/api/v1/templates/:id/suggestions/accept-all",
            post(handlers::handle_accept_all),
        )
        .route(
            "/api/v1/templates/:id/suggestions/:binding_id/accept",
            post(handlers::handle_accept),
        )
        .route(
            "/api/v1/templates/:id/suggestions/:binding_id/dismiss",
            post(handlers::handle_dismiss),
        )
        .with_state(state)
}
