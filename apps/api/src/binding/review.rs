//! Suggestion review: Accept / AcceptAll / Dismiss over one template's pending
//! suggestions.
//!
//! Each suggestion is keyed by its unmapped binding's id and moves from pending
//! to exactly one terminal state. Repeating the same decision is a no-op that
//! reports `AlreadyAccepted` / `AlreadyDismissed`; reversing a decision is an error.
//! A suggestion whose binding was mapped by hand while pending is superseded:
//! the manual field wins and review decisions report `AlreadyMapped`.
//! State transitions are reported to an injected `ReviewEventSink`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::binding::store::TemplateStore;
use crate::errors::AppError;
use crate::models::binding::BindingRow;

/// A proposed, not yet confirmed binding. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingSuggestion {
    pub binding: BindingRow,
    pub suggested_field: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionState {
    Pending,
    Accepted,
    Dismissed,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Accepted { binding: BindingRow },
    AlreadyAccepted { binding_id: Uuid },
    Dismissed { binding_id: Uuid },
    AlreadyDismissed { binding_id: Uuid },
    AlreadyMapped { binding_id: Uuid },
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("No suggestion for binding {0} in this review session")]
    UnknownSuggestion(Uuid),

    #[error("Suggestion for binding {0} was already dismissed")]
    AlreadyDismissed(Uuid),

    #[error("Suggestion for binding {0} was already accepted")]
    AlreadyAccepted(Uuid),

    #[error("Binding {0} no longer exists")]
    BindingGone(Uuid),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::UnknownSuggestion(_) | ReviewError::BindingGone(_) => {
                AppError::NotFound(err.to_string())
            }
            ReviewError::AlreadyDismissed(_) | ReviewError::AlreadyAccepted(_) => {
                AppError::Conflict(err.to_string())
            }
            ReviewError::Store(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    Opened {
        template_id: Uuid,
        pending: usize,
    },
    Accepted {
        template_id: Uuid,
        binding_id: Uuid,
        field: String,
        confidence: f64,
    },
    Dismissed {
        template_id: Uuid,
        binding_id: Uuid,
    },
    Superseded {
        template_id: Uuid,
        binding_id: Uuid,
    },
    Repeated {
        template_id: Uuid,
        binding_id: Uuid,
        state: SuggestionState,
    },
}

/// Observability hook for review transitions.
pub trait ReviewEventSink: Send + Sync {
    fn record(&self, event: &ReviewEvent);
}

/// Default sink: forwards events to `tracing` at debug level.
pub struct TracingEventSink;

impl ReviewEventSink for TracingEventSink {
    fn record(&self, event: &ReviewEvent) {
        debug!("Review event: {event:?}");
    }
}

pub struct ReviewSession {
    template_id: Uuid,
    pending: Vec<BindingSuggestion>,
    resolved: HashMap<Uuid, SuggestionState>,
    events: Arc<dyn ReviewEventSink>,
}

impl ReviewSession {
    pub fn open(
        template_id: Uuid,
        suggestions: Vec<BindingSuggestion>,
        events: Arc<dyn ReviewEventSink>,
    ) -> Self {
        events.record(&ReviewEvent::Opened {
            template_id,
            pending: suggestions.len(),
        });
        Self {
            template_id,
            pending: suggestions,
            resolved: HashMap::new(),
            events,
        }
    }

    pub fn template_id(&self) -> Uuid {
        self.template_id
    }

    /// Pending suggestions in the order the matcher produced them.
    pub fn pending(&self) -> &[BindingSuggestion] {
        &self.pending
    }

    pub fn state_of(&self, binding_id: Uuid) -> Option<SuggestionState> {
        if self.pending.iter().any(|s| s.binding.id == binding_id) {
            return Some(SuggestionState::Pending);
        }
        self.resolved.get(&binding_id).copied()
    }

    /// Confirms one suggestion: persists its field with `is_mapped = true`.
    /// A binding mapped in the meantime keeps its field and the suggestion is
    /// superseded. On a store failure the suggestion stays pending.
    pub async fn accept(
        &mut self,
        binding_id: Uuid,
        store: &dyn TemplateStore,
    ) -> Result<ReviewOutcome, ReviewError> {
        match self.state_of(binding_id) {
            Some(SuggestionState::Pending) => {}
            Some(SuggestionState::Accepted) => {
                self.record_repeat(binding_id, SuggestionState::Accepted);
                return Ok(ReviewOutcome::AlreadyAccepted { binding_id });
            }
            Some(SuggestionState::Dismissed) => {
                return Err(ReviewError::AlreadyDismissed(binding_id));
            }
            Some(SuggestionState::Superseded) => {
                self.record_repeat(binding_id, SuggestionState::Superseded);
                return Ok(ReviewOutcome::AlreadyMapped { binding_id });
            }
            None => return Err(ReviewError::UnknownSuggestion(binding_id)),
        }

        let index = self.pending_index(binding_id)?;
        let field = self.pending[index].suggested_field.clone();
        let confidence = self.pending[index].confidence;
        let description = self.pending[index].binding.description.clone();

        let updated = store
            .assign_if_unmapped(binding_id, &field, description.as_deref())
            .await?;
        let Some(binding) = updated else {
            let current = store.get_binding(binding_id).await?;
            return match current {
                Some(row) if row.is_mapped => {
                    self.supersede(binding_id);
                    Ok(ReviewOutcome::AlreadyMapped { binding_id })
                }
                _ => {
                    self.pending.remove(index);
                    Err(ReviewError::BindingGone(binding_id))
                }
            };
        };

        self.pending.remove(index);
        self.resolved.insert(binding_id, SuggestionState::Accepted);
        self.events.record(&ReviewEvent::Accepted {
            template_id: self.template_id,
            binding_id,
            field,
            confidence,
        });
        Ok(ReviewOutcome::Accepted { binding })
    }

    /// Accepts every pending suggestion in matcher order. Stops at the first store
    /// failure; suggestions accepted before it stay accepted.
    pub async fn accept_all(
        &mut self,
        store: &dyn TemplateStore,
    ) -> Result<Vec<BindingRow>, ReviewError> {
        let ids: Vec<Uuid> = self.pending.iter().map(|s| s.binding.id).collect();
        let mut accepted = Vec::with_capacity(ids.len());

        for binding_id in ids {
            match self.accept(binding_id, store).await {
                Ok(ReviewOutcome::Accepted { binding }) => accepted.push(binding),
                Ok(_) | Err(ReviewError::BindingGone(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(accepted)
    }

    /// Drops one suggestion without touching the stored binding.
    pub fn dismiss(&mut self, binding_id: Uuid) -> Result<ReviewOutcome, ReviewError> {
        match self.state_of(binding_id) {
            Some(SuggestionState::Pending) => {}
            Some(SuggestionState::Dismissed) => {
                self.record_repeat(binding_id, SuggestionState::Dismissed);
                return Ok(ReviewOutcome::AlreadyDismissed { binding_id });
            }
            Some(SuggestionState::Accepted) => {
                return Err(ReviewError::AlreadyAccepted(binding_id));
            }
            Some(SuggestionState::Superseded) => {
                self.record_repeat(binding_id, SuggestionState::Superseded);
                return Ok(ReviewOutcome::AlreadyMapped { binding_id });
            }
            None => return Err(ReviewError::UnknownSuggestion(binding_id)),
        }

        let index = self.pending_index(binding_id)?;
        self.pending.remove(index);
        self.resolved.insert(binding_id, SuggestionState::Dismissed);

        self.events.record(&ReviewEvent::Dismissed {
            template_id: self.template_id,
            binding_id,
        });
        Ok(ReviewOutcome::Dismissed { binding_id })
    }

    /// Retires a pending suggestion because its binding was mapped by hand.
    /// Returns `false` when nothing was pending for `binding_id`.
    pub fn supersede(&mut self, binding_id: Uuid) -> bool {
        let Ok(index) = self.pending_index(binding_id) else {
            return false;
        };
        self.pending.remove(index);
        self.resolved.insert(binding_id, SuggestionState::Superseded);
        self.events.record(&ReviewEvent::Superseded {
            template_id: self.template_id,
            binding_id,
        });
        true
    }

    fn pending_index(&self, binding_id: Uuid) -> Result<usize, ReviewError> {
        self.pending
            .iter()
            .position(|s| s.binding.id == binding_id)
            .ok_or(ReviewError::UnknownSuggestion(binding_id))
    }

    fn record_repeat(&self, binding_id: Uuid, state: SuggestionState) {
        self.events.record(&ReviewEvent::Repeated {
            template_id: self.template_id,
            binding_id,
            state,
        });
    }
}
