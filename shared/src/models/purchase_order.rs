//! Draft purchase orders raised from reorder suggestions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle: Draft -> Pending_Approval -> Approved | Rejected, Approved -> Ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseOrderStatus {
    Draft,
    #[serde(rename = "Pending_Approval")]
    PendingApproval,
    Approved,
    Rejected,
    Ordered,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "Draft",
            PurchaseOrderStatus::PendingApproval => "Pending_Approval",
            PurchaseOrderStatus::Approved => "Approved",
            PurchaseOrderStatus::Rejected => "Rejected",
            PurchaseOrderStatus::Ordered => "Ordered",
        }
    }

    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseOrderStatus::Draft, PurchaseOrderStatus::PendingApproval)
                | (PurchaseOrderStatus::PendingApproval, PurchaseOrderStatus::Approved)
                | (PurchaseOrderStatus::PendingApproval, PurchaseOrderStatus::Rejected)
                | (PurchaseOrderStatus::Approved, PurchaseOrderStatus::Ordered)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(
        self,
        next: PurchaseOrderStatus,
    ) -> Result<PurchaseOrderStatus, PurchaseOrderTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PurchaseOrderTransitionError { from: self, to: next })
        }
    }

    /// Still being prepared: editable, and blocks another draft for the same suggestion
    pub fn is_open(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft | PurchaseOrderStatus::PendingApproval)
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PurchaseOrderStatus {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(PurchaseOrderStatus::Draft),
            "Pending_Approval" => Ok(PurchaseOrderStatus::PendingApproval),
            "Approved" => Ok(PurchaseOrderStatus::Approved),
            "Rejected" => Ok(PurchaseOrderStatus::Rejected),
            "Ordered" => Ok(PurchaseOrderStatus::Ordered),
            other => Err(crate::ParseEnumError::new("purchase order status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot move purchase order from '{from}' to '{to}'")]
pub struct PurchaseOrderTransitionError {
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
}

/// A purchase order prepared from a reorder suggestion.
///
/// At most one open (Draft or Pending_Approval) order exists per suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftPurchaseOrder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub suggestion_id: Uuid,
    pub product_id: Uuid,
    pub approved_quantity: i64,
    pub supplier: Option<String>,
    pub estimated_cost: Option<Decimal>,
    pub status: PurchaseOrderStatus,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub suggestion_id: Uuid,
    /// Defaults to the suggestion's quantity
    #[validate(range(min = 1, max = 1_000_000_000))]
    pub approved_quantity: Option<i64>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    pub estimated_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePurchaseOrderInput {
    #[validate(range(min = 1, max = 1_000_000_000))]
    pub approved_quantity: Option<i64>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    pub estimated_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RejectPurchaseOrderInput {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

/// Filter for purchase order listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub suggestion_id: Option<Uuid>,
}

impl PurchaseOrderFilter {
    pub fn matches(&self, order: &DraftPurchaseOrder) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.suggestion_id.map_or(true, |id| order.suggestion_id == id)
    }
}
