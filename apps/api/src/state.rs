use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::binding::matcher::BindingMatcher;
use crate::binding::review::{ReviewEventSink, ReviewSession};
use crate::binding::store::TemplateStore;
use crate::config::Config;

/// One template's review session. Held across store calls, so review traffic
/// on one template never waits on another.
pub type SharedSession = Arc<Mutex<ReviewSession>>;

/// Open review sessions, one per template. A new suggestion run replaces the old one.
/// The map lock is only held to look up, insert or remove a session.
pub type ReviewSessions = Arc<Mutex<HashMap<Uuid, SharedSession>>>;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Template/binding persistence. PostgreSQL in production.
    pub store: Arc<dyn TemplateStore>,
    /// Read-only after startup; built once from the resume-data schema.
    pub matcher: Arc<BindingMatcher>,
    pub reviews: ReviewSessions,
    pub review_events: Arc<dyn ReviewEventSink>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn TemplateStore>,
        matcher: Arc<BindingMatcher>,
        review_events: Arc<dyn ReviewEventSink>,
    ) -> Self {
        Self {
            config,
            store,
            matcher,
            reviews: Arc::new(Mutex::new(HashMap::new())),
            review_events,
        }
    }

    pub async fn review_session(&self, template_id: Uuid) -> Option<SharedSession> {
        self.reviews.lock().await.get(&template_id).cloned()
    }

    /// Replaces any open session for the same template.
    pub async fn open_review(&self, session: ReviewSession) {
        let template_id = session.template_id();
        self.reviews
            .lock()
            .await
            .insert(template_id, Arc::new(Mutex::new(session)));
    }

    pub async fn close_review(&self, template_id: Uuid) -> bool {
        self.reviews.lock().await.remove(&template_id).is_some()
    }
}
