//! HTTP handlers for shipments

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    CreateShipmentInput, OperationOutcome, PaginatedResponse, Shipment, ShipmentFilter,
    ShipmentType, UpdateShipmentStatusInput,
};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ShipmentListQuery {
    pub shipment_type: Option<ShipmentType>,
    pub product_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn create_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<Json<Shipment>> {
    let service = state.shipments();
    let shipment = service.create(current_user.user_id, input).await?;
    Ok(Json(shipment))
}

pub async fn list_shipments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ShipmentListQuery>,
) -> AppResult<Json<PaginatedResponse<Shipment>>> {
    let page = page_request(&state, query.page, query.per_page);
    let filter = ShipmentFilter {
        shipment_type: query.shipment_type,
        product_id: query.product_id,
    };
    let service = state.shipments();
    let shipments = service.list(current_user.user_id, &filter, &page).await?;
    Ok(Json(shipments))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<Shipment>> {
    let service = state.shipments();
    let shipment = service.get(current_user.user_id, shipment_id).await?;
    Ok(Json(shipment))
}

/// Advance a shipment; delivery applies its stock effect
pub async fn update_shipment_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
    Json(input): Json<UpdateShipmentStatusInput>,
) -> AppResult<Json<Shipment>> {
    let service = state.shipments();
    let (shipment, _) = tokio::spawn(async move {
        service
            .update_status(current_user.user_id, shipment_id, input)
            .await
    })
    .await
    .map_err(super::ledger::task_failed)??;
    Ok(Json(shipment))
}

pub async fn delete_shipment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(shipment_id): Path<Uuid>,
) -> AppResult<Json<OperationOutcome>> {
    let service = state.shipments();
    let outcome = service.delete(current_user.user_id, shipment_id).await?;
    Ok(Json(outcome))
}
