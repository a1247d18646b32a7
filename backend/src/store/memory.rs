//! In-memory entity store
//!
//! Each transaction holds the store mutex for its whole lifetime and works on
//! a private copy of the tables. Commit publishes the copy; drop discards it.
//! Transactions are therefore fully serialized, which gives the same outcome as
//! the row locks taken by the PostgreSQL store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    ActionSummary, DraftPurchaseOrder, HistoryFilter, LocatedStock, Pagination, Product,
    ProductFilter, PurchaseOrderFilter, ReorderSuggestion, Shipment, ShipmentFilter, StockAction,
    StockHistory, StockLocation, StorageLocation, SuggestionStatus, Warehouse, WarehouseStockRow,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Debit, LedgerStore, StoreTx};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Vec<Product>,
    warehouses: Vec<Warehouse>,
    locations: Vec<StorageLocation>,
    stock: Vec<StockLocation>,
    history: Vec<StockHistory>,
    suggestions: Vec<ReorderSuggestion>,
    purchase_orders: Vec<DraftPurchaseOrder>,
    shipments: Vec<Shipment>,
}

/// Entity store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = Tables::clone(&guard);
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn duplicate(constraint: &str) -> AppError {
    AppError::Conflict(format!("Duplicate entry violates '{}'", constraint))
}

fn out_of_range(message: &str) -> AppError {
    AppError::InvalidArgument(message.to_string())
}

fn paginate<T>(rows: Vec<T>, page: &Pagination) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let data = rows
        .into_iter()
        .skip(offset)
        .take(page.limit() as usize)
        .collect();
    (data, total)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl MemoryTx {
    fn stock_index(&self, owner_id: Uuid, product_id: Uuid, location_id: Uuid) -> Option<usize> {
        self.working.stock.iter().position(|s| {
            s.owner_id == owner_id && s.product_id == product_id && s.location_id == location_id
        })
    }

    fn location(&self, id: Uuid) -> Option<&StorageLocation> {
        self.working.locations.iter().find(|l| l.id == id)
    }

    fn check_product_unique(&self, product: &Product) -> AppResult<()> {
        let clash = self.working.products.iter().any(|p| {
            p.id != product.id && p.owner_id == product.owner_id && p.sku == product.sku
        });
        if clash {
            return Err(duplicate("products_owner_sku_key"));
        }
        Ok(())
    }

    fn check_warehouse_unique(&self, warehouse: &Warehouse) -> AppResult<()> {
        let clash = self.working.warehouses.iter().any(|w| {
            w.id != warehouse.id && w.owner_id == warehouse.owner_id && w.name == warehouse.name
        });
        if clash {
            return Err(duplicate("warehouses_owner_name_key"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        self.check_product_unique(product)?;
        self.working.products.push(product.clone());
        Ok(())
    }

    async fn get_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.id == id && p.owner_id == owner_id)
            .cloned())
    }

    async fn lock_product(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Product>> {
        self.get_product(owner_id, id).await
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        self.check_product_unique(product)?;
        let row = self
            .working
            .products
            .iter_mut()
            .find(|p| p.id == product.id && p.owner_id == product.owner_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        *row = product.clone();
        Ok(())
    }

    async fn list_products(
        &mut self,
        owner_id: Uuid,
        filter: &ProductFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut rows: Vec<Product> = self
            .working
            .products
            .iter()
            .filter(|p| p.owner_id == owner_id && filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(rows, page))
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        self.check_warehouse_unique(warehouse)?;
        self.working.warehouses.push(warehouse.clone());
        Ok(())
    }

    async fn get_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self
            .working
            .warehouses
            .iter()
            .find(|w| w.id == id && w.owner_id == owner_id)
            .cloned())
    }

    async fn update_warehouse(&mut self, warehouse: &Warehouse) -> AppResult<()> {
        self.check_warehouse_unique(warehouse)?;
        let row = self
            .working
            .warehouses
            .iter_mut()
            .find(|w| w.id == warehouse.id && w.owner_id == warehouse.owner_id)
            .ok_or_else(|| AppError::not_found("Warehouse"))?;
        *row = warehouse.clone();
        Ok(())
    }

    async fn list_warehouses(
        &mut self,
        owner_id: Uuid,
        query: Option<&str>,
        page: &Pagination,
    ) -> AppResult<(Vec<Warehouse>, u64)> {
        let mut rows: Vec<Warehouse> = self
            .working
            .warehouses
            .iter()
            .filter(|w| w.owner_id == owner_id)
            .filter(|w| match query {
                Some(q) => contains_ci(&w.name, q) || contains_ci(&w.address, q),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(rows, page))
    }

    async fn delete_warehouse(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let before = self.working.warehouses.len();
        self.working
            .warehouses
            .retain(|w| !(w.id == id && w.owner_id == owner_id));
        if self.working.warehouses.len() == before {
            return Ok(false);
        }

        let removed: Vec<Uuid> = self
            .working
            .locations
            .iter()
            .filter(|l| l.warehouse_id == id)
            .map(|l| l.id)
            .collect();
        self.working.locations.retain(|l| l.warehouse_id != id);
        self.working
            .stock
            .retain(|s| !removed.contains(&s.location_id));
        Ok(true)
    }

    async fn insert_location(&mut self, location: &StorageLocation) -> AppResult<()> {
        let clash = self.working.locations.iter().any(|l| {
            l.warehouse_id == location.warehouse_id && l.rack == location.rack && l.bin == location.bin
        });
        if clash {
            return Err(duplicate("storage_locations_slot_key"));
        }
        self.working.locations.push(location.clone());
        Ok(())
    }

    async fn get_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>> {
        Ok(self
            .location(id)
            .filter(|l| l.owner_id == owner_id)
            .cloned())
    }

    async fn list_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<StorageLocation>> {
        let mut rows: Vec<StorageLocation> = self
            .working
            .locations
            .iter()
            .filter(|l| l.owner_id == owner_id && l.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (&a.rack, &a.bin).cmp(&(&b.rack, &b.bin)));
        Ok(rows)
    }

    async fn lock_location(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<StorageLocation>> {
        self.get_location(owner_id, id).await
    }

    async fn lock_warehouse_locations(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        Ok(self
            .working
            .locations
            .iter()
            .filter(|l| l.owner_id == owner_id && l.warehouse_id == warehouse_id)
            .map(|l| l.id)
            .collect())
    }

    async fn delete_location(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let before = self.working.locations.len();
        self.working
            .locations
            .retain(|l| !(l.id == id && l.owner_id == owner_id));
        if self.working.locations.len() == before {
            return Ok(false);
        }
        self.working.stock.retain(|s| s.location_id != id);
        Ok(true)
    }

    async fn get_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Option<StockLocation>> {
        Ok(self
            .stock_index(owner_id, product_id, location_id)
            .map(|i| self.working.stock[i].clone()))
    }

    async fn credit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        match self.stock_index(owner_id, product_id, location_id) {
            Some(i) => {
                let row = &mut self.working.stock[i];
                row.quantity =
                    shared::add_quantities(row.quantity, quantity).map_err(out_of_range)?;
                row.updated_at = now;
                Ok(row.quantity)
            }
            None => {
                self.working.stock.push(StockLocation {
                    id: Uuid::new_v4(),
                    owner_id,
                    product_id,
                    location_id,
                    quantity,
                    created_at: now,
                    updated_at: now,
                });
                Ok(quantity)
            }
        }
    }

    async fn debit_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Debit> {
        let Some(i) = self.stock_index(owner_id, product_id, location_id) else {
            return Ok(Debit::Missing);
        };
        let row = &mut self.working.stock[i];
        if row.quantity < quantity {
            return Ok(Debit::Insufficient { available: row.quantity });
        }
        row.quantity -= quantity;
        row.updated_at = now;
        let remaining = row.quantity;
        if remaining == 0 {
            self.working.stock.remove(i);
        }
        Ok(Debit::Applied { remaining })
    }

    async fn list_product_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<StockLocation>> {
        let mut rows: Vec<StockLocation> = self
            .working
            .stock
            .iter()
            .filter(|s| s.owner_id == owner_id && s.product_id == product_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.created_at);
        Ok(rows)
    }

    async fn sum_product_stock(&mut self, owner_id: Uuid, product_id: Uuid) -> AppResult<i64> {
        self.working
            .stock
            .iter()
            .filter(|s| s.owner_id == owner_id && s.product_id == product_id)
            .try_fold(0i64, |sum, s| shared::add_quantities(sum, s.quantity))
            .map_err(out_of_range)
    }

    async fn located_stock(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<LocatedStock>> {
        let rows = self.list_product_stock(owner_id, product_id).await?;
        Ok(rows
            .iter()
            .filter_map(|s| {
                self.location(s.location_id).map(|l| LocatedStock {
                    location_id: l.id,
                    warehouse_id: l.warehouse_id,
                    rack: l.rack.clone(),
                    bin: l.bin.clone(),
                    quantity: s.quantity,
                })
            })
            .collect())
    }

    async fn list_location_stock(
        &mut self,
        owner_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Vec<StockLocation>> {
        Ok(self
            .working
            .stock
            .iter()
            .filter(|s| s.owner_id == owner_id && s.location_id == location_id)
            .cloned()
            .collect())
    }

    async fn products_in_warehouse(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .working
            .stock
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .filter(|s| {
                self.location(s.location_id)
                    .map_or(false, |l| l.warehouse_id == warehouse_id)
            })
            .map(|s| s.product_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn warehouse_stock_rows(
        &mut self,
        owner_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<WarehouseStockRow>> {
        let mut rows: Vec<WarehouseStockRow> = self
            .working
            .stock
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .filter_map(|s| {
                let location = self
                    .location(s.location_id)
                    .filter(|l| l.warehouse_id == warehouse_id)?;
                let product = self.working.products.iter().find(|p| p.id == s.product_id)?;
                Some(WarehouseStockRow {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_sku: product.sku.clone(),
                    location_id: location.id,
                    rack: location.rack.clone(),
                    bin: location.bin.clone(),
                    quantity: s.quantity,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.product_name, &a.rack, &a.bin).cmp(&(&b.product_name, &b.rack, &b.bin))
        });
        Ok(rows)
    }

    async fn insert_history(&mut self, entry: &StockHistory) -> AppResult<()> {
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn list_history(
        &mut self,
        owner_id: Uuid,
        filter: &HistoryFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<StockHistory>, u64)> {
        let mut rows: Vec<StockHistory> = self
            .working
            .history
            .iter()
            .rev()
            .filter(|h| h.owner_id == owner_id && filter.matches(h))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn history_summary(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<ActionSummary>> {
        let mut totals: BTreeMap<&'static str, (StockAction, i64, i64)> = BTreeMap::new();
        for entry in self
            .working
            .history
            .iter()
            .filter(|h| h.owner_id == owner_id && h.product_id == product_id)
        {
            let slot = totals
                .entry(entry.action.as_str())
                .or_insert((entry.action, 0, 0));
            slot.1 += entry.quantity;
            slot.2 += 1;
        }
        Ok(totals
            .into_values()
            .map(|(action, total_quantity, count)| ActionSummary { action, total_quantity, count })
            .collect())
    }

    async fn find_pending_suggestion(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>> {
        Ok(self
            .working
            .suggestions
            .iter()
            .find(|s| s.owner_id == owner_id && s.product_id == product_id && s.status.is_pending())
            .cloned())
    }

    async fn insert_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()> {
        if suggestion.status.is_pending() {
            let clash = self.working.suggestions.iter().any(|s| {
                s.owner_id == suggestion.owner_id
                    && s.product_id == suggestion.product_id
                    && s.status.is_pending()
            });
            if clash {
                return Err(duplicate("reorder_suggestions_one_pending"));
            }
        }
        self.working.suggestions.push(suggestion.clone());
        Ok(())
    }

    async fn resolve_pending_suggestions(
        &mut self,
        owner_id: Uuid,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut resolved = 0;
        for s in self.working.suggestions.iter_mut().filter(|s| {
            s.owner_id == owner_id && s.product_id == product_id && s.status.is_pending()
        }) {
            s.status = SuggestionStatus::Resolved;
            s.updated_at = now;
            resolved += 1;
        }
        Ok(resolved)
    }

    async fn lock_suggestion(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<ReorderSuggestion>> {
        Ok(self
            .working
            .suggestions
            .iter()
            .find(|s| s.id == id && s.owner_id == owner_id)
            .cloned())
    }

    async fn update_suggestion(&mut self, suggestion: &ReorderSuggestion) -> AppResult<()> {
        let row = self
            .working
            .suggestions
            .iter_mut()
            .find(|s| s.id == suggestion.id && s.owner_id == suggestion.owner_id)
            .ok_or_else(|| AppError::not_found("Reorder suggestion"))?;
        *row = suggestion.clone();
        Ok(())
    }

    async fn list_suggestions(
        &mut self,
        owner_id: Uuid,
        status: Option<SuggestionStatus>,
        page: &Pagination,
    ) -> AppResult<(Vec<ReorderSuggestion>, u64)> {
        let mut rows: Vec<ReorderSuggestion> = self
            .working
            .suggestions
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id && status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn insert_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()> {
        if order.status.is_open() {
            let clash = self.working.purchase_orders.iter().any(|o| {
                o.owner_id == order.owner_id
                    && o.suggestion_id == order.suggestion_id
                    && o.status.is_open()
            });
            if clash {
                return Err(duplicate("purchase_orders_one_open"));
            }
        }
        self.working.purchase_orders.push(order.clone());
        Ok(())
    }

    async fn get_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        Ok(self
            .working
            .purchase_orders
            .iter()
            .find(|o| o.id == id && o.owner_id == owner_id)
            .cloned())
    }

    async fn lock_purchase_order(
        &mut self,
        owner_id: Uuid,
        id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        self.get_purchase_order(owner_id, id).await
    }

    async fn find_open_purchase_order(
        &mut self,
        owner_id: Uuid,
        suggestion_id: Uuid,
    ) -> AppResult<Option<DraftPurchaseOrder>> {
        Ok(self
            .working
            .purchase_orders
            .iter()
            .find(|o| o.owner_id == owner_id && o.suggestion_id == suggestion_id && o.status.is_open())
            .cloned())
    }

    async fn update_purchase_order(&mut self, order: &DraftPurchaseOrder) -> AppResult<()> {
        let row = self
            .working
            .purchase_orders
            .iter_mut()
            .find(|o| o.id == order.id && o.owner_id == order.owner_id)
            .ok_or_else(|| AppError::not_found("Purchase order"))?;
        *row = order.clone();
        Ok(())
    }

    async fn list_purchase_orders(
        &mut self,
        owner_id: Uuid,
        filter: &PurchaseOrderFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<DraftPurchaseOrder>, u64)> {
        let mut rows: Vec<DraftPurchaseOrder> = self
            .working
            .purchase_orders
            .iter()
            .rev()
            .filter(|o| o.owner_id == owner_id && filter.matches(o))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn insert_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        self.working.shipments.push(shipment.clone());
        Ok(())
    }

    async fn get_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>> {
        Ok(self
            .working
            .shipments
            .iter()
            .find(|s| s.id == id && s.owner_id == owner_id)
            .cloned())
    }

    async fn lock_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<Option<Shipment>> {
        self.get_shipment(owner_id, id).await
    }

    async fn update_shipment(&mut self, shipment: &Shipment) -> AppResult<()> {
        let row = self
            .working
            .shipments
            .iter_mut()
            .find(|s| s.id == shipment.id && s.owner_id == shipment.owner_id)
            .ok_or_else(|| AppError::not_found("Shipment"))?;
        *row = shipment.clone();
        Ok(())
    }

    async fn delete_shipment(&mut self, owner_id: Uuid, id: Uuid) -> AppResult<bool> {
        let before = self.working.shipments.len();
        self.working
            .shipments
            .retain(|s| !(s.id == id && s.owner_id == owner_id));
        Ok(self.working.shipments.len() < before)
    }

    async fn list_shipments(
        &mut self,
        owner_id: Uuid,
        filter: &ShipmentFilter,
        page: &Pagination,
    ) -> AppResult<(Vec<Shipment>, u64)> {
        let mut rows: Vec<Shipment> = self
            .working
            .shipments
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id && filter.matches(s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(rows, page))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
