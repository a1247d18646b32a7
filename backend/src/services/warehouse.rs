//! Warehouse and storage location service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    validate_slot_code, ActivityEntry, CreateLocationInput, CreateWarehouseInput, EntityKind,
    LocationDetail, OperationOutcome, PaginatedResponse, Pagination, StorageLocation,
    UpdateWarehouseInput, Warehouse, WarehouseStockReport, DEFAULT_LOCATION_CAPACITY,
    DEFAULT_ZONE,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::services::reconciler::reconcile;
use crate::services::reorder::ReorderEvaluator;
use crate::store::{LedgerStore, StoreTx};

#[derive(Clone)]
pub struct WarehouseService {
    store: Arc<dyn LedgerStore>,
    evaluator: ReorderEvaluator,
    audit: Arc<dyn AuditSink>,
}

fn duplicate_name(name: &str) -> impl FnOnce(AppError) -> AppError + '_ {
    move |err| match err {
        AppError::Conflict(_) => AppError::Conflict(format!("A warehouse named '{}' already exists", name)),
        other => other,
    }
}

/// Lock the given products, in id order to avoid lock-order inversions
async fn lock_products(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    mut product_ids: Vec<Uuid>,
) -> AppResult<Vec<shared::Product>> {
    product_ids.sort();
    product_ids.dedup();
    let mut products = Vec::with_capacity(product_ids.len());
    for id in product_ids {
        if let Some(product) = tx.lock_product(user_id, id).await? {
            products.push(product);
        }
    }
    Ok(products)
}

impl WarehouseService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        evaluator: ReorderEvaluator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, evaluator, audit }
    }

    /// Reconcile products that lost stock rows through a cascade
    async fn settle_products(
        &self,
        tx: &mut dyn StoreTx,
        products: Vec<shared::Product>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        for mut product in products {
            reconcile(tx, &mut product, now).await?;
            if product.is_active() {
                self.evaluator.evaluate(tx, &product, now).await?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn create_warehouse(
        &self,
        user_id: Uuid,
        input: CreateWarehouseInput,
    ) -> AppResult<Warehouse> {
        input.validate()?;

        let now = Utc::now();
        let warehouse = Warehouse {
            id: Uuid::new_v4(),
            owner_id: user_id,
            name: input.name.trim().to_string(),
            address: input.address.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_warehouse(&warehouse)
            .await
            .map_err(duplicate_name(&warehouse.name))?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Create Warehouse",
            EntityKind::Warehouse,
            warehouse.id,
            format!("Created warehouse {}", warehouse.name),
        ));

        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, user_id: Uuid, warehouse_id: Uuid) -> AppResult<Warehouse> {
        let mut tx = self.store.begin().await?;
        tx.get_warehouse(user_id, warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse"))
    }

    pub async fn list_warehouses(
        &self,
        user_id: Uuid,
        query: Option<&str>,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<Warehouse>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_warehouses(user_id, query, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    pub async fn update_warehouse(
        &self,
        user_id: Uuid,
        warehouse_id: Uuid,
        input: UpdateWarehouseInput,
    ) -> AppResult<Warehouse> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let mut warehouse = tx
            .get_warehouse(user_id, warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse"))?;

        if let Some(name) = input.name {
            warehouse.name = name.trim().to_string();
        }
        if let Some(address) = input.address {
            warehouse.address = address.trim().to_string();
        }
        if let Some(is_active) = input.is_active {
            warehouse.is_active = is_active;
        }
        warehouse.updated_at = Utc::now();

        tx.update_warehouse(&warehouse)
            .await
            .map_err(duplicate_name(&warehouse.name))?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Warehouse",
            EntityKind::Warehouse,
            warehouse.id,
            format!("Updated warehouse {}", warehouse.name),
        ));

        Ok(warehouse)
    }

    /// Delete a warehouse, its locations and their stock. History is kept.
    pub async fn delete_warehouse(
        &self,
        user_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<OperationOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let warehouse = tx
            .get_warehouse(user_id, warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse"))?;

        // Hold the locations first so no stock row appears after the read below
        tx.lock_warehouse_locations(user_id, warehouse_id).await?;
        let affected = tx.products_in_warehouse(user_id, warehouse_id).await?;
        let products = lock_products(tx.as_mut(), user_id, affected).await?;

        tx.delete_warehouse(user_id, warehouse_id).await?;
        let mut outcome = OperationOutcome::new(format!("Warehouse '{}' deleted", warehouse.name))
            .with(EntityKind::Warehouse, warehouse.id);
        for product in &products {
            outcome = outcome.with(EntityKind::Product, product.id);
        }
        self.settle_products(tx.as_mut(), products, now).await?;
        tx.commit().await?;

        tracing::info!(warehouse_id = %warehouse.id, "warehouse deleted");
        self.audit.emit(ActivityEntry::new(
            user_id,
            "Delete Warehouse",
            EntityKind::Warehouse,
            warehouse.id,
            format!("Deleted warehouse {}", warehouse.name),
        ));

        Ok(outcome)
    }

    /// Stock held in a warehouse, by product name, rack and bin
    pub async fn stock_report(
        &self,
        user_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<WarehouseStockReport> {
        let mut tx = self.store.begin().await?;
        let warehouse = tx
            .get_warehouse(user_id, warehouse_id)
            .await?
            .ok_or_else(|| AppError::not_found("Warehouse"))?;
        let rows = tx.warehouse_stock_rows(user_id, warehouse_id).await?;

        Ok(WarehouseStockReport {
            warehouse_id: warehouse.id,
            warehouse_name: warehouse.name,
            rows,
        })
    }

    // ========================================================================
    // Storage locations
    // ========================================================================

    pub async fn create_location(
        &self,
        user_id: Uuid,
        input: CreateLocationInput,
    ) -> AppResult<StorageLocation> {
        input.validate()?;
        let rack = input.rack.trim().to_uppercase();
        let bin = input.bin.trim().to_uppercase();
        validate_slot_code(&rack).map_err(|e| AppError::InvalidArgument(e.to_string()))?;
        validate_slot_code(&bin).map_err(|e| AppError::InvalidArgument(e.to_string()))?;

        let mut tx = self.store.begin().await?;
        if tx.get_warehouse(user_id, input.warehouse_id).await?.is_none() {
            return Err(AppError::not_found("Warehouse"));
        }

        let location = StorageLocation {
            id: Uuid::new_v4(),
            owner_id: user_id,
            warehouse_id: input.warehouse_id,
            rack,
            bin,
            zone: shared::normalize_text(input.zone.as_deref())
                .unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            capacity: input.capacity.unwrap_or(DEFAULT_LOCATION_CAPACITY),
            is_active: true,
            created_at: Utc::now(),
        };

        tx.insert_location(&location).await.map_err(|err| match err {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "Location {} already exists in this warehouse",
                location.label()
            )),
            other => other,
        })?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Create Location",
            EntityKind::StorageLocation,
            location.id,
            format!("Created location {}", location.label()),
        ));

        Ok(location)
    }

    /// Locations of a warehouse, ordered by rack then bin
    pub async fn list_locations(
        &self,
        user_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<StorageLocation>> {
        let mut tx = self.store.begin().await?;
        if tx.get_warehouse(user_id, warehouse_id).await?.is_none() {
            return Err(AppError::not_found("Warehouse"));
        }
        tx.list_locations(user_id, warehouse_id).await
    }

    /// A location with the stock it holds
    pub async fn location_detail(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<LocationDetail> {
        let mut tx = self.store.begin().await?;
        let location = tx
            .get_location(user_id, location_id)
            .await?
            .ok_or_else(|| AppError::not_found("Storage location"))?;
        let stock = tx.list_location_stock(user_id, location_id).await?;
        Ok(LocationDetail { location, stock })
    }

    /// Delete a location and its stock rows. History is kept.
    pub async fn delete_location(
        &self,
        user_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<OperationOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let location = tx
            .lock_location(user_id, location_id)
            .await?
            .ok_or_else(|| AppError::not_found("Storage location"))?;

        let affected: Vec<Uuid> = tx
            .list_location_stock(user_id, location_id)
            .await?
            .into_iter()
            .map(|s| s.product_id)
            .collect();
        let products = lock_products(tx.as_mut(), user_id, affected).await?;

        tx.delete_location(user_id, location_id).await?;
        let mut outcome = OperationOutcome::new(format!("Location {} deleted", location.label()))
            .with(EntityKind::StorageLocation, location.id);
        for product in &products {
            outcome = outcome.with(EntityKind::Product, product.id);
        }
        self.settle_products(tx.as_mut(), products, now).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Delete Location",
            EntityKind::StorageLocation,
            location.id,
            format!("Deleted location {}", location.label()),
        ));

        Ok(outcome)
    }
}
