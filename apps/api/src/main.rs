mod binding;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::binding::fields::resume_schema;
use crate::binding::matcher::BindingMatcher;
use crate::binding::review::TracingEventSink;
use crate::binding::store::PgTemplateStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Binder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgTemplateStore::new(db));

    // Build the field catalog once; the matcher is read-only from here on
    let settings = config.matcher_settings();
    let matcher = Arc::new(BindingMatcher::with_settings(&resume_schema(), &settings));
    info!(
        "Field catalog loaded: {} fields, threshold {:.2}, similarity {:?}, paths {:?}",
        matcher.catalog().len(),
        settings.threshold,
        settings.similarity,
        settings.path_style
    );

    let state = AppState::new(config.clone(), store, matcher, Arc::new(TracingEventSink));

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the admin UI host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
