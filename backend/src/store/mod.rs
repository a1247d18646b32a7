//! Entity store
//!
//! A [`LedgerStore`] hands out [`StoreTx`] values, each one atomic unit of work.
//! Every row operation is scoped by the owning user. A `StoreTx` that is
//! dropped without [`StoreTx::commit`] is rolled back, so an early `?` return
//! anywhere in a service leaves no partial state behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    ActionSummary, DraftPurchaseOrder, HistoryFilter, LocatedStock, Pagination, Product,
    ProductFilter, PurchaseOrderFilter, ReorderSuggestion, Shipment, ShipmentFilter,
    StockHistory, StockLocation, StorageLocation, SuggestionStatus, Warehouse, WarehouseStockRow,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Result of a conditional debit on one stock row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    /// Quantity was taken; a row left at zero has been deleted
    Applied { remaining: i64 },
    /// The row holds less than requested and was left untouched
    Insufficient { available: i64 },
    /// No stock row exists for (product, location)
    Missing,
}

/// Source of transactional units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Cheap liveness probe used by the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// One open transaction against the entity store
#[async_trait]
pub trait StoreTx: Send {
    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;

    async fn get_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>>;

    /// Read a product and hold its row lock until the transaction ends.
    /// Ledger operations on the same product serialize on this lock.
    async fn lock_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>>;

    /// Write every mutable product field
    async fn update_product(&mut self, product: &Product) -> AppResult<()>;

    /// Active products matching the filter, ordered by name
    async fn list_products(
        &mut self,
        owner_id: Uuid,
        filter: &ProductFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Product>, u64)>;

    // ------------------------------------------------------------------
    // Warehouses and storage locations
    // ------------------------------------------------------------------

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()>;

    async fn get_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Warehouse>>;

    async fn update_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()>;

    /// Warehouses whose name or address contains `query`, ordered by name
    async fn list_warehouses(
        &mut self,
        owner_id: Uuid,
        query: Option<&str>,
        page: &Pagination,
    ) -> AppResult<(Vec<Warehouse>, u64)>;

    /// Delete a warehouse together with its locations and their stock rows
    async fn delete_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool>;

    async fn insert_location(&mut self, location: &StorageLocation) -> AppResult<()>;

    async fn get_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>>;

    /// Locations of one warehouse, ordered by rack then bin
    async fn list_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<StorageLocation>>;

    /// Lock one location row. Stock rows cannot be inserted under it until commit.
    async fn lock_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>>;

    /// Lock every location of a warehouse, returning their ids
    async fn lock_warehouse_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>>;

    /// Delete a location together with its stock rows
    async fn delete_location(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool>;

    // ------------------------------------------------------------------
    // Stock rows
    // ------------------------------------------------------------------

    async fn get_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<StockLocation>>;

    /// Atomically add to (product, location), inserting the row when absent.
    /// Returns the new quantity.
    async fn credit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<i64>;

    /// Atomically take from (product, location) when enough is held
    async fn debit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Debit>;

    /// A product's stock rows, oldest first
    async fn list_product_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockLocation>>;

    /// Sum of a product's stock rows
    async fn sum_product_stock(&mut self, owner_id: Uuid, product_id: Uuid) -> AppResult<i64>;

    /// A product's stock rows joined with their locations
    async fn located_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<LocatedStock>>;

    async fn list_location_stock(
        &mut self,
        owner_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Vec<StockLocation>>;

    /// Distinct products holding stock anywhere in the warehouse
    async fn products_in_warehouse(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>>;

    /// Stock report rows ordered by product name, rack, bin
    async fn warehouse_stock_rows(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<WarehouseStockRow>>;

    // ------------------------------------------------------------------
    // Stock history (append-only)
    // ------------------------------------------------------------------

    async fn insert_history(&mut self, entry: &StockHistory) -> AppResult<()>;

    /// Matching history, newest first
    async fn list_history(
        &mut self,
        owner_id: Uuid,
        filter: &HistoryFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<StockHistory>, u64)>;

    async fn history_summary(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<ActionSummary>>;

    // ------------------------------------------------------------------
    // Reorder suggestions
    // ------------------------------------------------------------------

    async fn find_pending_suggestion(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>>;

    /// Fails with `Conflict` when a second pending row would exist
    async fn insert_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()>;

    /// Move every pending suggestion of the product to `Resolved`
    async fn resolve_pending_suggestions(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    async fn lock_suggestion(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>>;

    async fn update_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()>;

    /// Suggestions newest first, optionally restricted to one status
    async fn list_suggestions(
        &mut self,
        owner_id: Uuid,
        status: Option<SuggestionStatus>,
        page: &Pagination,
    ) -> AppResult<(Vec<ReorderSuggestion>, u64)>;

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    async fn insert_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()>;

    async fn get_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>>;

    async fn lock_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>>;

    /// The Draft or Pending_Approval order of a suggestion, if any
    async fn find_open_purchase_order(
        &mut self,
        owner_id: Uuid,
        suggestion_id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>>;

    async fn update_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()>;

    /// Purchase orders newest first
    async fn list_purchase_orders(
        &mut self,
        owner_id: Uuid,
        filter: &PurchaseOrderFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<DraftPurchaseOrder>, u64)>;

    // ------------------------------------------------------------------
    // Shipments
    // ------------------------------------------------------------------

    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()>;

    async fn get_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>>;

    /// Read and lock a shipment row before a status change
    async fn lock_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>>;

    async fn update_shipment(&mut self, shipment: &Shipment) -> AppResult<()>;

    async fn delete_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool>;

    /// Shipments newest first
    async fn list_shipments(
        &mut self,
        owner_id: Uuid,
        filter: &ShipmentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Shipment>, u64)>;

    // ------------------------------------------------------------------

    /// Publish every change made through this transaction
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
