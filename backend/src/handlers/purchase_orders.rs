//! HTTP handlers for draft purchase orders

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    CreatePurchaseOrderInput, DraftPurchaseOrder, PaginatedResponse, PurchaseOrderFilter,
    PurchaseOrderStatus, RejectPurchaseOrderInput, UpdatePurchaseOrderInput,
};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderListQuery {
    pub status: Option<PurchaseOrderStatus>,
    pub suggestion_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    let order = state.purchase_orders().create(current_user.user_id, input).await?;
    Ok(Json(order))
}

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PurchaseOrderListQuery>,
) -> AppResult<Json<PaginatedResponse<DraftPurchaseOrder>>> {
    let page = page_request(&state, query.page, query.per_page);
    let filter = PurchaseOrderFilter {
        status: query.status,
        suggestion_id: query.suggestion_id,
    };
    let orders = state
        .purchase_orders()
        .list(current_user.user_id, &filter, &page)
        .await?;
    Ok(Json(orders))
}

/// Orders submitted for approval. Managers only.
pub async fn list_pending_approvals(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<DraftPurchaseOrder>>> {
    current_user.require_manager()?;
    let page = page_request(&state, query.page, query.per_page);
    let orders = state
        .purchase_orders()
        .pending_approvals(current_user.user_id, &page)
        .await?;
    Ok(Json(orders))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    let order = state.purchase_orders().get(current_user.user_id, order_id).await?;
    Ok(Json(order))
}

pub async fn update_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    let order = state
        .purchase_orders()
        .update(current_user.user_id, order_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn submit_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    let order = state.purchase_orders().submit(current_user.user_id, order_id).await?;
    Ok(Json(order))
}

pub async fn approve_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    current_user.require_manager()?;
    let order = state.purchase_orders().approve(current_user.user_id, order_id).await?;
    Ok(Json(order))
}

pub async fn reject_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<RejectPurchaseOrderInput>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    current_user.require_manager()?;
    let order = state
        .purchase_orders()
        .reject(current_user.user_id, order_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn mark_purchase_order_ordered(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<DraftPurchaseOrder>> {
    let order = state
        .purchase_orders()
        .mark_ordered(current_user.user_id, order_id)
        .await?;
    Ok(Json(order))
}
