//! Reorder evaluation and suggestion management

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    ActivityEntry, EntityKind, PaginatedResponse, Pagination, Product, ReorderDecision,
    ReorderOutcome, ReorderSuggestion, SuggestionStatus, UpdateSuggestionInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::store::{LedgerStore, StoreTx};

/// Creates or resolves reorder suggestions from a product's reconciled total
#[derive(Debug, Clone, Copy)]
pub struct ReorderEvaluator {
    suggested_quantity: i64,
}

impl ReorderEvaluator {
    pub fn new(suggested_quantity: i64) -> Self {
        Self { suggested_quantity: suggested_quantity.max(1) }
    }

    /// Evaluate inside the caller's transaction.
    ///
    /// At or below threshold a single pending suggestion is ensured; above it
    /// every pending suggestion is resolved.
    pub async fn evaluate(
        &self,
        tx: &mut dyn StoreTx,
        product: &Product,
        now: DateTime<Utc>,
    ) -> AppResult<ReorderOutcome> {
        match ReorderDecision::for_levels(product.total_quantity, product.reorder_threshold) {
            ReorderDecision::EnsurePending => {
                if let Some(existing) = tx.find_pending_suggestion(product.owner_id, product.id).await? {
                    return Ok(ReorderOutcome::AlreadyPending(existing.id));
                }

                let suggestion = ReorderSuggestion {
                    id: Uuid::new_v4(),
                    owner_id: product.owner_id,
                    product_id: product.id,
                    suggested_quantity: self.suggested_quantity,
                    status: SuggestionStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                tx.insert_suggestion(&suggestion).await?;
                tracing::info!(
                    product_id = %product.id,
                    total = product.total_quantity,
                    threshold = product.reorder_threshold,
                    "reorder suggestion created"
                );
                Ok(ReorderOutcome::Created(suggestion))
            }
            ReorderDecision::ResolvePending => {
                let resolved = tx
                    .resolve_pending_suggestions(product.owner_id, product.id, now)
                    .await?;
                if resolved > 0 {
                    tracing::info!(product_id = %product.id, resolved, "reorder suggestions resolved");
                }
                Ok(ReorderOutcome::Resolved(resolved))
            }
        }
    }
}

impl Default for ReorderEvaluator {
    fn default() -> Self {
        Self::new(shared::DEFAULT_REORDER_QUANTITY)
    }
}

/// Which suggestions to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuggestionScope {
    #[default]
    Pending,
    Status(SuggestionStatus),
    All,
}

impl SuggestionScope {
    fn status(self) -> Option<SuggestionStatus> {
        match self {
            SuggestionScope::Pending => Some(SuggestionStatus::Pending),
            SuggestionScope::Status(status) => Some(status),
            SuggestionScope::All => None,
        }
    }
}

/// User-facing side of reorder suggestions
#[derive(Clone)]
pub struct ReorderService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl ReorderService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        scope: SuggestionScope,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<ReorderSuggestion>> {
        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_suggestions(user_id, scope.status(), page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    /// Mark a pending suggestion as ordered or ignored
    pub async fn update_status(
        &self,
        user_id: Uuid,
        suggestion_id: Uuid,
        input: UpdateSuggestionInput,
    ) -> AppResult<ReorderSuggestion> {
        input.validate()?;

        if !input.status.is_user_settable() {
            return Err(AppError::InvalidStateTransition(format!(
                "Suggestions can only be marked Ordered or Ignored, not '{}'",
                input.status
            )));
        }

        let mut tx = self.store.begin().await?;
        let mut suggestion = tx
            .lock_suggestion(user_id, suggestion_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reorder suggestion"))?;

        if !suggestion.status.is_pending() {
            return Err(AppError::InvalidStateTransition(format!(
                "Only pending suggestions can be updated; this one is '{}'",
                suggestion.status
            )));
        }

        suggestion.status = input.status;
        suggestion.updated_at = Utc::now();
        tx.update_suggestion(&suggestion).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Reorder Suggestion",
            EntityKind::ReorderSuggestion,
            suggestion.id,
            format!("Marked suggestion for product {} as {}", suggestion.product_id, suggestion.status),
        ));

        Ok(suggestion)
    }
}
