//! Activity log entries emitted to the audit side channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity an activity entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Product,
    Warehouse,
    StorageLocation,
    StockLocation,
    Shipment,
    ReorderSuggestion,
    PurchaseOrder,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Warehouse => "Warehouse",
            EntityKind::StorageLocation => "StorageLocation",
            EntityKind::StockLocation => "StockLocation",
            EntityKind::Shipment => "Shipment",
            EntityKind::ReorderSuggestion => "ReorderSuggestion",
            EntityKind::PurchaseOrder => "PurchaseOrder",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Product" => Ok(EntityKind::Product),
            "Warehouse" => Ok(EntityKind::Warehouse),
            "StorageLocation" => Ok(EntityKind::StorageLocation),
            "StockLocation" => Ok(EntityKind::StockLocation),
            "Shipment" => Ok(EntityKind::Shipment),
            "ReorderSuggestion" => Ok(EntityKind::ReorderSuggestion),
            "PurchaseOrder" => Ok(EntityKind::PurchaseOrder),
            other => Err(crate::ParseEnumError::new("entity kind", other)),
        }
    }
}

/// One human-readable audit entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub performed_by: Uuid,
    pub action: String,
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        user_id: Uuid,
        action: impl Into<String>,
        entity: EntityKind,
        entity_id: Uuid,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: user_id,
            performed_by: user_id,
            action: action.into(),
            entity,
            entity_id,
            details: details.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Filter for activity listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub entity: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        self.entity.map_or(true, |e| entry.entity == e)
            && self.entity_id.map_or(true, |id| entry.entity_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trips_through_text() {
        for kind in [EntityKind::Product, EntityKind::StorageLocation, EntityKind::PurchaseOrder] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("Customer".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_filter_matches_entity() {
        let entry = ActivityEntry::new(
            Uuid::new_v4(),
            "Create Warehouse",
            EntityKind::Warehouse,
            Uuid::new_v4(),
            "Created warehouse Main",
        );
        assert!(ActivityFilter::default().matches(&entry));
        assert!(ActivityFilter { entity: Some(EntityKind::Warehouse), entity_id: None }.matches(&entry));
        assert!(!ActivityFilter { entity: Some(EntityKind::Product), entity_id: None }.matches(&entry));
        assert!(!ActivityFilter { entity: None, entity_id: Some(Uuid::new_v4()) }.matches(&entry));
    }
}
