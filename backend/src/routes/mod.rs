//! Route definitions for the stock ledger API
//!
//! Every route below needs the caller identity headers; the
//! [`CurrentUser`](crate::middleware::CurrentUser) extractor rejects
//! requests without them.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/products", product_routes())
        .nest("/warehouses", warehouse_routes())
        .nest("/locations", location_routes())
        .nest("/stock", stock_routes())
        .nest("/shipments", shipment_routes())
        .nest("/reorder-suggestions", reorder_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/history", history_routes())
        .nest("/activity", activity_routes())
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/stock", get(handlers::get_product_stock))
        .route("/:product_id/history/summary", get(handlers::get_history_summary))
}

/// Warehouse routes
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_warehouses).post(handlers::create_warehouse))
        .route(
            "/:warehouse_id",
            get(handlers::get_warehouse)
                .put(handlers::update_warehouse)
                .delete(handlers::delete_warehouse),
        )
        .route("/:warehouse_id/stock", get(handlers::get_warehouse_stock))
        .route(
            "/:warehouse_id/locations",
            get(handlers::list_locations).post(handlers::create_location),
        )
}

/// Storage location routes (scan lookup)
fn location_routes() -> Router<AppState> {
    Router::new().route(
        "/:location_id",
        get(handlers::get_location).delete(handlers::delete_location),
    )
}

/// Stock movement routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/assign", post(handlers::assign_stock))
        .route("/receive", post(handlers::receive_stock))
        .route("/pick", post(handlers::pick_stock))
        .route("/transfer", post(handlers::transfer_stock))
        .route("/put-away", post(handlers::put_away_stock))
        .route("/adjust", post(handlers::adjust_stock))
        .route("/reconcile/:product_id", post(handlers::reconcile_stock))
}

/// Shipment routes
fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_shipments).post(handlers::create_shipment))
        .route(
            "/:shipment_id",
            get(handlers::get_shipment).delete(handlers::delete_shipment),
        )
        .route("/:shipment_id/status", put(handlers::update_shipment_status))
}

/// Reorder suggestion routes
fn reorder_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suggestions))
        .route("/:suggestion_id", put(handlers::update_suggestion))
}

/// Draft purchase order routes
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/pending-approvals", get(handlers::list_pending_approvals))
        .route(
            "/:order_id",
            get(handlers::get_purchase_order).put(handlers::update_purchase_order),
        )
        .route("/:order_id/submit", post(handlers::submit_purchase_order))
        .route("/:order_id/approve", post(handlers::approve_purchase_order))
        .route("/:order_id/reject", post(handlers::reject_purchase_order))
        .route("/:order_id/mark-ordered", post(handlers::mark_purchase_order_ordered))
}

/// Stock history routes
fn history_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_history))
}

/// Activity log routes
fn activity_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_activity))
}
