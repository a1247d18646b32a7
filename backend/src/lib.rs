//! Multi-warehouse stock ledger
//!
//! Products are held in storage locations (rack/bin slots inside
//! warehouses). Every movement runs as one transaction that updates the
//! affected stock rows, appends a history row, recomputes the product total
//! and re-evaluates its reorder suggestion.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use services::{
    ActivityService, AuditSink, HistoryService, ProductService, PurchaseOrderService,
    ReorderEvaluator, ReorderService, ShipmentService, StockLedger, WarehouseService,
};
use store::LedgerStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub config: Arc<Config>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, config: Config, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            audit,
        }
    }

    pub fn evaluator(&self) -> ReorderEvaluator {
        ReorderEvaluator::new(self.config.ledger.default_reorder_quantity)
    }

    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.store.clone(), self.evaluator(), self.audit.clone())
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.store.clone(), self.evaluator(), self.audit.clone())
    }

    pub fn warehouses(&self) -> WarehouseService {
        WarehouseService::new(self.store.clone(), self.evaluator(), self.audit.clone())
    }

    pub fn shipments(&self) -> ShipmentService {
        ShipmentService::new(self.store.clone(), self.ledger(), self.audit.clone())
    }

    pub fn reorder(&self) -> ReorderService {
        ReorderService::new(self.store.clone(), self.audit.clone())
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(self.store.clone())
    }

    pub fn purchase_orders(&self) -> PurchaseOrderService {
        PurchaseOrderService::new(self.store.clone(), self.audit.clone())
    }

    pub fn activity(&self) -> ActivityService {
        ActivityService::new(self.audit.clone())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Stock Ledger API v1.0"
}
