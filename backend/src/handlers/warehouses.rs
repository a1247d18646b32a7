//! HTTP handlers for warehouses and storage locations

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    CreateLocationInput, CreateWarehouseInput, LocationDetail, OperationOutcome,
    PaginatedResponse, StorageLocation, UpdateWarehouseInput, Warehouse, WarehouseStockReport,
};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WarehouseListQuery {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Body for creating a location under a warehouse path
#[derive(Debug, Deserialize)]
pub struct NewLocation {
    pub rack: String,
    pub bin: String,
    pub zone: Option<String>,
    pub capacity: Option<i64>,
}

// ============================================================================
// Warehouses
// ============================================================================

pub async fn create_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<Json<Warehouse>> {
    current_user.require_manager()?;
    let service = state.warehouses();
    let warehouse = service.create_warehouse(current_user.user_id, input).await?;
    Ok(Json(warehouse))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<WarehouseListQuery>,
) -> AppResult<Json<PaginatedResponse<Warehouse>>> {
    let page = page_request(&state, query.page, query.per_page);
    let service = state.warehouses();
    let warehouses = service
        .list_warehouses(current_user.user_id, query.query.as_deref(), &page)
        .await?;
    Ok(Json(warehouses))
}

pub async fn get_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Warehouse>> {
    let service = state.warehouses();
    let warehouse = service.get_warehouse(current_user.user_id, warehouse_id).await?;
    Ok(Json(warehouse))
}

pub async fn update_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Json(input): Json<UpdateWarehouseInput>,
) -> AppResult<Json<Warehouse>> {
    let service = state.warehouses();
    let warehouse = service
        .update_warehouse(current_user.user_id, warehouse_id, input)
        .await?;
    Ok(Json(warehouse))
}

/// Delete a warehouse with its locations and stock
pub async fn delete_warehouse(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<OperationOutcome>> {
    current_user.require_manager()?;
    let service = state.warehouses();
    let outcome = tokio::spawn(async move {
        service.delete_warehouse(current_user.user_id, warehouse_id).await
    })
    .await
    .map_err(super::ledger::task_failed)??;
    Ok(Json(outcome))
}

pub async fn get_warehouse_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<WarehouseStockReport>> {
    let service = state.warehouses();
    let report = service.stock_report(current_user.user_id, warehouse_id).await?;
    Ok(Json(report))
}

// ============================================================================
// Storage locations
// ============================================================================

pub async fn create_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
    Json(body): Json<NewLocation>,
) -> AppResult<Json<StorageLocation>> {
    current_user.require_manager()?;
    let input = CreateLocationInput {
        warehouse_id,
        rack: body.rack,
        bin: body.bin,
        zone: body.zone,
        capacity: body.capacity,
    };
    let service = state.warehouses();
    let location = service.create_location(current_user.user_id, input).await?;
    Ok(Json(location))
}

pub async fn list_locations(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<StorageLocation>>> {
    let service = state.warehouses();
    let locations = service.list_locations(current_user.user_id, warehouse_id).await?;
    Ok(Json(locations))
}

/// Scan lookup: a location with the stock it holds
pub async fn get_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<LocationDetail>> {
    let service = state.warehouses();
    let detail = service.location_detail(current_user.user_id, location_id).await?;
    Ok(Json(detail))
}

pub async fn delete_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<OperationOutcome>> {
    current_user.require_manager()?;
    let service = state.warehouses();
    let outcome = tokio::spawn(async move {
        service.delete_location(current_user.user_id, location_id).await
    })
    .await
    .map_err(super::ledger::task_failed)??;
    Ok(Json(outcome))
}
