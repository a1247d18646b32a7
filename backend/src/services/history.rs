//! Movement recorder and stock history queries

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use shared::{
    ActionSummary, HistoryFilter, PaginatedResponse, Pagination, StockAction, StockHistory,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, StoreTx};

/// One stock movement about to be recorded
#[derive(Debug, Clone)]
pub struct Movement {
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub action: StockAction,
    pub quantity: i64,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub reference: String,
    metadata: Map<String, Value>,
}

impl Movement {
    pub fn new(owner_id: Uuid, product_id: Uuid, action: StockAction, quantity: i64) -> Self {
        Self {
            owner_id,
            product_id,
            action,
            quantity,
            from_location_id: None,
            to_location_id: None,
            reference: String::new(),
            metadata: Map::new(),
        }
    }

    pub fn from_location(mut self, location_id: Uuid) -> Self {
        self.from_location_id = Some(location_id);
        self
    }

    pub fn to_location(mut self, location_id: Uuid) -> Self {
        self.to_location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Attach the caller's free-text note, if any
    pub fn note(self, note: Option<&str>) -> Self {
        match shared::normalize_text(note) {
            Some(note) => self.meta("note", json!(note)),
            None => self,
        }
    }
}

/// Appends stock history. There is no update or delete.
pub struct MovementRecorder;

impl MovementRecorder {
    /// Record one movement inside the caller's transaction
    pub async fn record(
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        movement: Movement,
        now: DateTime<Utc>,
    ) -> AppResult<StockHistory> {
        if movement.quantity < 0 {
            return Err(AppError::Internal(format!(
                "negative history quantity {} for {}",
                movement.quantity, movement.action
            )));
        }

        let entry = StockHistory {
            id: Uuid::new_v4(),
            owner_id: movement.owner_id,
            product_id: movement.product_id,
            from_location_id: movement.from_location_id,
            to_location_id: movement.to_location_id,
            quantity: movement.quantity,
            action: movement.action,
            user_id,
            reference: movement.reference,
            metadata: Value::Object(movement.metadata),
            created_at: now,
        };

        tx.insert_history(&entry).await?;
        Ok(entry)
    }
}

/// Read side of the stock history
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn LedgerStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Movements matching the filter, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &HistoryFilter,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<StockHistory>> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(AppError::InvalidArgument(
                    "Start date must not be after end date".to_string(),
                ));
            }
        }

        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_history(user_id, filter, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    /// Per-action totals for one product
    pub async fn summary(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<ActionSummary>> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(user_id, product_id).await?.is_none() {
            return Err(AppError::not_found("Product"));
        }
        tx.history_summary(user_id, product_id).await
    }
}
