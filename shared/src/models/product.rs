//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Default reorder threshold applied when a product is created without one
pub const DEFAULT_REORDER_THRESHOLD: i64 = 10;

/// A stock keeping unit owned by one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// Unique per owner
    pub sku: String,
    pub category: String,
    pub price: Decimal,
    /// Denormalized on-hand total. Recomputed by the reconciler, never patched.
    pub total_quantity: i64,
    /// Stock that entered the system outside the rack/bin model (inbound
    /// shipments awaiting put-away). Part of `total_quantity`.
    pub unassigned_quantity: i64,
    pub reorder_threshold: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Quantity held in storage locations
    pub fn located_quantity(&self) -> i64 {
        self.total_quantity - self.unassigned_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.total_quantity <= self.reorder_threshold
    }
}

/// Product lifecycle. Products are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "Active",
            ProductStatus::Inactive => "Inactive",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(ProductStatus::Active),
            "Inactive" => Ok(ProductStatus::Inactive),
            other => Err(crate::ParseEnumError::new("product status", other)),
        }
    }
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub category: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0))]
    pub reorder_threshold: Option<i64>,
}

/// Input for updating a product. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_threshold: Option<i64>,
}

/// Filter for product listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive match on name, SKU or category
    pub query: Option<String>,
    /// Only products at or below their reorder threshold
    #[serde(default)]
    pub low_stock: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active() {
            return false;
        }
        if self.low_stock && !product.is_low_stock() {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(q) => {
                let q = q.to_lowercase();
                product.name.to_lowercase().contains(&q)
                    || product.sku.to_lowercase().contains(&q)
                    || product.category.to_lowercase().contains(&q)
            }
        }
    }
}
