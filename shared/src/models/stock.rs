//! Stock placement and movement history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Quantity of one product held at one storage location.
///
/// (product, location) is unique and `quantity` is always positive: a row that
/// is debited to zero is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLocation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of stock movement recorded in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockAction {
    Receive,
    Pick,
    Transfer,
    Assign,
    #[serde(rename = "Shipment_Inbound")]
    ShipmentInbound,
    #[serde(rename = "Shipment_Outbound")]
    ShipmentOutbound,
    Adjustment,
}

impl StockAction {
    pub const ALL: [StockAction; 7] = [
        StockAction::Receive,
        StockAction::Pick,
        StockAction::Transfer,
        StockAction::Assign,
        StockAction::ShipmentInbound,
        StockAction::ShipmentOutbound,
        StockAction::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::Receive => "Receive",
            StockAction::Pick => "Pick",
            StockAction::Transfer => "Transfer",
            StockAction::Assign => "Assign",
            StockAction::ShipmentInbound => "Shipment_Inbound",
            StockAction::ShipmentOutbound => "Shipment_Outbound",
            StockAction::Adjustment => "Adjustment",
        }
    }

    /// Past-tense verb used in history references and audit details
    pub fn verb(&self) -> &'static str {
        match self {
            StockAction::Receive => "Received",
            StockAction::Pick => "Picked",
            StockAction::Transfer => "Transferred",
            StockAction::Assign => "Assigned",
            StockAction::ShipmentInbound => "Delivered inbound",
            StockAction::ShipmentOutbound => "Delivered outbound",
            StockAction::Adjustment => "Adjusted",
        }
    }
}

impl std::fmt::Display for StockAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockAction {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StockAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| crate::ParseEnumError::new("stock action", s))
    }
}

/// Immutable movement record. Never updated or deleted; product and location
/// references may dangle once those entities are gone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockHistory {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub quantity: i64,
    pub action: StockAction,
    /// Acting user
    pub user_id: Uuid,
    pub reference: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Filter for history listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub product_id: Option<Uuid>,
    pub action: Option<StockAction>,
    pub user_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &StockHistory) -> bool {
        self.product_id.map_or(true, |p| entry.product_id == p)
            && self.action.map_or(true, |a| entry.action == a)
            && self.user_id.map_or(true, |u| entry.user_id == u)
            && self.start.map_or(true, |s| entry.created_at >= s)
            && self.end.map_or(true, |e| entry.created_at <= e)
    }
}

/// Per-action aggregate of a product's movements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionSummary {
    pub action: StockAction,
    pub total_quantity: i64,
    pub count: i64,
}

/// Input for assign, receive and pick
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockMovementInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: i64,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferStockInput {
    pub product_id: Uuid,
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    pub quantity: i64,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Cycle-count correction of one location
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustStockInput {
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub counted_quantity: i64,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// A product's stock with the locations holding it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub total_quantity: i64,
    pub unassigned_quantity: i64,
    pub locations: Vec<LocatedStock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocatedStock {
    pub location_id: Uuid,
    pub warehouse_id: Uuid,
    pub rack: String,
    pub bin: String,
    pub quantity: i64,
}
