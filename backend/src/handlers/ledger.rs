//! HTTP handlers for stock movements
//!
//! Each movement runs in a detached task: once the ledger has started, a
//! client disconnect cannot cancel the transaction halfway.

use std::future::Future;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use shared::{
    AdjustStockInput, OperationOutcome, Product, StockMovementInput, TransferStockInput,
};
use tokio::task::JoinError;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::LedgerReceipt;
use crate::AppState;

pub(crate) fn task_failed(err: JoinError) -> AppError {
    AppError::Internal(format!("ledger task failed: {}", err))
}

async fn detached<F>(operation: F) -> AppResult<Json<OperationOutcome>>
where
    F: Future<Output = AppResult<LedgerReceipt>> + Send + 'static,
{
    let receipt = tokio::spawn(operation).await.map_err(task_failed)??;
    Ok(Json(receipt.outcome()))
}

/// Place new stock at a location
pub async fn assign_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.assign(current_user.user_id, input).await }).await
}

/// Replenish a location
pub async fn receive_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.receive(current_user.user_id, input).await }).await
}

/// Take stock out of a location
pub async fn pick_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.pick(current_user.user_id, input).await }).await
}

pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferStockInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.transfer(current_user.user_id, input).await }).await
}

/// Move unassigned stock into a location
pub async fn put_away_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StockMovementInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.put_away(current_user.user_id, input).await }).await
}

/// Cycle-count correction
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<OperationOutcome>> {
    let ledger = state.ledger();
    detached(async move { ledger.adjust(current_user.user_id, input).await }).await
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub product: Product,
    pub previous_total: i64,
    pub drifted: bool,
}

/// Recompute a product's total from its stock rows
pub async fn reconcile_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ReconcileResponse>> {
    let ledger = state.ledger();
    let reconciliation = tokio::spawn(async move {
        ledger.reconcile_product(current_user.user_id, product_id).await
    })
    .await
    .map_err(task_failed)??;

    Ok(Json(ReconcileResponse {
        drifted: reconciliation.drifted(),
        previous_total: reconciliation.previous_total,
        product: reconciliation.product,
    }))
}
