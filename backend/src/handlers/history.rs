//! HTTP handlers for stock history queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{ActionSummary, HistoryFilter, PaginatedResponse, StockAction, StockHistory};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub product_id: Option<Uuid>,
    pub action: Option<StockAction>,
    pub user_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Movements, newest first
pub async fn list_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PaginatedResponse<StockHistory>>> {
    let page = page_request(&state, query.page, query.per_page);
    let filter = HistoryFilter {
        product_id: query.product_id,
        action: query.action,
        user_id: query.user_id,
        start: query.start,
        end: query.end,
    };
    let service = state.history();
    let history = service.list(current_user.user_id, &filter, &page).await?;
    Ok(Json(history))
}

/// Per-action totals for one product
pub async fn get_history_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<ActionSummary>>> {
    let service = state.history();
    let summary = service.summary(current_user.user_id, product_id).await?;
    Ok(Json(summary))
}
