//! Test fixtures shared by the integration suites
//!
//! Every harness runs the real services on a fresh in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    CreateLocationInput, CreateProductInput, CreateWarehouseInput, HistoryFilter, Pagination,
    Product, ReorderSuggestion, StockHistory, StockMovementInput, StorageLocation, Warehouse,
};
use stock_ledger::{
    services::{MemoryAuditSink, SuggestionScope},
    store::{LedgerStore, MemoryLedgerStore},
    AppState, Config,
};
use uuid::Uuid;

pub struct Harness {
    pub state: AppState,
    pub audit: MemoryAuditSink,
    pub user: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        let audit = MemoryAuditSink::new();
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new());
        let state = AppState::new(store, Config::in_memory(), Arc::new(audit.clone()));
        Self {
            state,
            audit,
            user: Uuid::new_v4(),
        }
    }

    pub async fn product(&self, sku: &str, reorder_threshold: i64) -> Product {
        self.state
            .products()
            .create(
                self.user,
                CreateProductInput {
                    name: format!("Product {}", sku),
                    sku: sku.to_string(),
                    category: Some("General".to_string()),
                    price: Decimal::new(1999, 2),
                    reorder_threshold: Some(reorder_threshold),
                },
            )
            .await
            .unwrap()
    }

    pub async fn warehouse(&self, name: &str) -> Warehouse {
        self.state
            .warehouses()
            .create_warehouse(
                self.user,
                CreateWarehouseInput {
                    name: name.to_string(),
                    address: "1 Dock Road".to_string(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn location(&self, warehouse_id: Uuid, rack: &str, bin: &str) -> StorageLocation {
        self.state
            .warehouses()
            .create_location(
                self.user,
                CreateLocationInput {
                    warehouse_id,
                    rack: rack.to_string(),
                    bin: bin.to_string(),
                    zone: None,
                    capacity: None,
                },
            )
            .await
            .unwrap()
    }

    /// A product with `locations` slots in one warehouse
    pub async fn fixture(&self, threshold: i64, locations: usize) -> (Product, Vec<StorageLocation>) {
        let product = self.product(&format!("SKU-{}", Uuid::new_v4().simple()), threshold).await;
        let warehouse = self.warehouse(&format!("WH-{}", Uuid::new_v4().simple())).await;
        let mut slots = Vec::with_capacity(locations);
        for i in 0..locations {
            slots.push(self.location(warehouse.id, "A", &format!("{:02}", i + 1)).await);
        }
        (product, slots)
    }

    pub async fn current(&self, product_id: Uuid) -> Product {
        self.state.products().get(self.user, product_id).await.unwrap()
    }

    pub async fn stock_at(&self, product_id: Uuid, location_id: Uuid) -> Option<i64> {
        let mut tx = self.state.store.begin().await.unwrap();
        tx.get_stock(self.user, product_id, location_id)
            .await
            .unwrap()
            .map(|s| s.quantity)
    }

    pub async fn located_sum(&self, product_id: Uuid) -> i64 {
        let mut tx = self.state.store.begin().await.unwrap();
        tx.sum_product_stock(self.user, product_id).await.unwrap()
    }

    pub async fn history(&self, product_id: Uuid) -> Vec<StockHistory> {
        let filter = HistoryFilter {
            product_id: Some(product_id),
            ..Default::default()
        };
        self.state
            .history()
            .list(self.user, &filter, &Pagination::new(1, 200))
            .await
            .unwrap()
            .data
    }

    pub async fn suggestions(&self, scope: SuggestionScope, product_id: Uuid) -> Vec<ReorderSuggestion> {
        self.state
            .reorder()
            .list(self.user, scope, &Pagination::new(1, 200))
            .await
            .unwrap()
            .data
            .into_iter()
            .filter(|s| s.product_id == product_id)
            .collect()
    }

    pub async fn pending(&self, product_id: Uuid) -> Vec<ReorderSuggestion> {
        self.suggestions(SuggestionScope::Pending, product_id).await
    }
}

pub fn movement(product_id: Uuid, location_id: Uuid, quantity: i64) -> StockMovementInput {
    StockMovementInput {
        product_id,
        location_id,
        quantity,
        note: None,
    }
}
