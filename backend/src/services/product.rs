//! Product catalog service

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_reorder_threshold, validate_sku, ActivityEntry, CreateProductInput, EntityKind,
    OperationOutcome, PaginatedResponse, Pagination, Product, ProductFilter, ProductStatus,
    ProductStock, ReorderOutcome, UpdateProductInput, DEFAULT_REORDER_THRESHOLD,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::services::ledger::lock_active_product;
use crate::services::reorder::ReorderEvaluator;
use crate::store::LedgerStore;

/// Product catalog service
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn LedgerStore>,
    evaluator: ReorderEvaluator,
    audit: Arc<dyn AuditSink>,
}

fn duplicate_sku(sku: &str) -> impl FnOnce(AppError) -> AppError + '_ {
    move |err| match err {
        AppError::Conflict(_) => AppError::Conflict(format!("A product with SKU '{}' already exists", sku)),
        other => other,
    }
}

impl ProductService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        evaluator: ReorderEvaluator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, evaluator, audit }
    }

    /// Create a product with no stock
    pub async fn create(&self, user_id: Uuid, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        let sku = input.sku.trim().to_string();
        validate_sku(&sku).map_err(|e| AppError::InvalidArgument(e.to_string()))?;
        let reorder_threshold = input.reorder_threshold.unwrap_or(DEFAULT_REORDER_THRESHOLD);
        validate_reorder_threshold(reorder_threshold)
            .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
        if input.price.is_sign_negative() {
            return Err(AppError::InvalidArgument("Price cannot be negative".to_string()));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            owner_id: user_id,
            name: input.name.trim().to_string(),
            sku,
            category: shared::normalize_text(input.category.as_deref()).unwrap_or_default(),
            price: input.price,
            total_quantity: 0,
            unassigned_quantity: 0,
            reorder_threshold,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_product(&product)
            .await
            .map_err(duplicate_sku(&product.sku))?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
        self.audit.emit(ActivityEntry::new(
            user_id,
            "Create Product",
            EntityKind::Product,
            product.id,
            format!("Created product {} ({})", product.name, product.sku),
        ));

        Ok(product)
    }

    pub async fn get(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        let mut tx = self.store.begin().await?;
        tx.get_product(user_id, product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))
    }

    /// Active products, searched by name, SKU or category
    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ProductFilter,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_products(user_id, filter, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    /// Update catalog fields. Quantities cannot be edited here.
    pub async fn update(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<(Product, ReorderOutcome)> {
        input.validate()?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut product = lock_active_product(tx.as_mut(), user_id, product_id).await?;

        if let Some(name) = input.name {
            product.name = name.trim().to_string();
        }
        if let Some(sku) = input.sku {
            let sku = sku.trim().to_string();
            validate_sku(&sku).map_err(|e| AppError::InvalidArgument(e.to_string()))?;
            product.sku = sku;
        }
        if let Some(category) = input.category {
            product.category = category.trim().to_string();
        }
        if let Some(price) = input.price {
            if price.is_sign_negative() {
                return Err(AppError::InvalidArgument("Price cannot be negative".to_string()));
            }
            product.price = price;
        }
        if let Some(threshold) = input.reorder_threshold {
            validate_reorder_threshold(threshold)
                .map_err(|e| AppError::InvalidArgument(e.to_string()))?;
            product.reorder_threshold = threshold;
        }
        product.updated_at = now;

        tx.update_product(&product)
            .await
            .map_err(duplicate_sku(&product.sku))?;
        let reorder = self.evaluator.evaluate(tx.as_mut(), &product, now).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Product",
            EntityKind::Product,
            product.id,
            format!("Updated product {} ({})", product.name, product.sku),
        ));

        Ok((product, reorder))
    }

    /// Soft delete: the product stays for the history trail
    pub async fn deactivate(&self, user_id: Uuid, product_id: Uuid) -> AppResult<OperationOutcome> {
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_product(user_id, product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;

        if !product.is_active() {
            return Err(AppError::InvalidStateTransition(format!(
                "Product '{}' is already inactive",
                product.sku
            )));
        }

        product.status = ProductStatus::Inactive;
        product.updated_at = Utc::now();
        tx.update_product(&product).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Delete Product",
            EntityKind::Product,
            product.id,
            format!("Deactivated product {} ({})", product.name, product.sku),
        ));

        Ok(OperationOutcome::new("Product deactivated").with(EntityKind::Product, product.id))
    }

    /// Where a product's stock is held
    pub async fn stock(&self, user_id: Uuid, product_id: Uuid) -> AppResult<ProductStock> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .get_product(user_id, product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;
        let locations = tx.located_stock(user_id, product_id).await?;

        Ok(ProductStock {
            product_id: product.id,
            name: product.name,
            sku: product.sku,
            total_quantity: product.total_quantity,
            unassigned_quantity: product.unassigned_quantity,
            locations,
        })
    }
}
