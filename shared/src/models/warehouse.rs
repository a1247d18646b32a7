//! Warehouse and storage location models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_ZONE: &str = "General";
pub const DEFAULT_LOCATION_CAPACITY: i64 = 100;

/// A physical warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Warehouse {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Unique per owner
    pub name: String,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A rack/bin slot inside a warehouse. (warehouse, rack, bin) is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageLocation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub warehouse_id: Uuid,
    pub rack: String,
    pub bin: String,
    pub zone: String,
    pub capacity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl StorageLocation {
    /// Short human label, e.g. "A-03"
    pub fn label(&self) -> String {
        format!("{}-{}", self.rack, self.bin)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWarehouseInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLocationInput {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub rack: String,
    #[validate(length(min = 1, max = 32))]
    pub bin: String,
    pub zone: Option<String>,
    #[validate(range(min = 0))]
    pub capacity: Option<i64>,
}

/// One line of a warehouse stock report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehouseStockRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub location_id: Uuid,
    pub rack: String,
    pub bin: String,
    pub quantity: i64,
}

/// Warehouse stock report, ordered by product name, rack, bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseStockReport {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub rows: Vec<WarehouseStockRow>,
}

/// A storage location with everything it holds (scan lookup)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationDetail {
    pub location: StorageLocation,
    pub stock: Vec<crate::StockLocation>,
}
