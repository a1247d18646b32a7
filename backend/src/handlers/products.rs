//! HTTP handlers for the product catalog

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{
    CreateProductInput, OperationOutcome, PaginatedResponse, Product, ProductFilter, ProductStock,
    UpdateProductInput,
};
use uuid::Uuid;

use super::page_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub query: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<Product>> {
    let service = state.products();
    let product = service.create(current_user.user_id, input).await?;
    Ok(Json(product))
}

/// List active products
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ProductListQuery>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    let page = page_request(&state, query.page, query.per_page);
    let filter = ProductFilter {
        query: query.query,
        low_stock: query.low_stock,
    };
    let service = state.products();
    let products = service.list(current_user.user_id, &filter, &page).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = state.products();
    let product = service.get(current_user.user_id, product_id).await?;
    Ok(Json(product))
}

/// Update catalog fields
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = state.products();
    let (product, _) = service.update(current_user.user_id, product_id, input).await?;
    Ok(Json(product))
}

/// Deactivate a product
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<OperationOutcome>> {
    let service = state.products();
    let outcome = service.deactivate(current_user.user_id, product_id).await?;
    Ok(Json(outcome))
}

/// Stock breakdown by location
pub async fn get_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductStock>> {
    let service = state.products();
    let stock = service.stock(current_user.user_id, product_id).await?;
    Ok(Json(stock))
}
