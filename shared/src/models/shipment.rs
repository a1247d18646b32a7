//! Shipment models, the shipment status state machine and outbound draw planning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub shipment_type: ShipmentType,
    pub product_id: Uuid,
    pub quantity: i64,
    pub status: ShipmentStatus,
    pub handled_by: Uuid,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentType {
    Inbound,
    Outbound,
}

impl ShipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentType::Inbound => "Inbound",
            ShipmentType::Outbound => "Outbound",
        }
    }
}

impl std::str::FromStr for ShipmentType {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Inbound" => Ok(ShipmentType::Inbound),
            "Outbound" => Ok(ShipmentType::Outbound),
            other => Err(crate::ParseEnumError::new("shipment type", other)),
        }
    }
}

/// Shipment lifecycle: Pending -> {In Transit, Delivered}; In Transit -> Delivered.
/// Delivered is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::InTransit => "In Transit",
            ShipmentStatus::Delivered => "Delivered",
        }
    }

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        matches!(
            (self, next),
            (ShipmentStatus::Pending, ShipmentStatus::InTransit)
                | (ShipmentStatus::Pending, ShipmentStatus::Delivered)
                | (ShipmentStatus::InTransit, ShipmentStatus::Delivered)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: ShipmentStatus) -> Result<ShipmentStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ShipmentStatus::Pending),
            "In Transit" => Ok(ShipmentStatus::InTransit),
            "Delivered" => Ok(ShipmentStatus::Delivered),
            other => Err(crate::ParseEnumError::new("shipment status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot transition from '{from}' to '{to}'")]
pub struct TransitionError {
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateShipmentInput {
    pub shipment_type: ShipmentType,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1_000_000_000))]
    pub quantity: i64,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateShipmentStatusInput {
    pub status: ShipmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentFilter {
    pub shipment_type: Option<ShipmentType>,
    pub product_id: Option<Uuid>,
}

impl ShipmentFilter {
    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.shipment_type.map_or(true, |t| shipment.shipment_type == t)
            && self.product_id.map_or(true, |p| shipment.product_id == p)
    }
}

/// How an outbound delivery is taken out of stock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPlan {
    /// Taken from the product's unassigned stock
    pub from_unassigned: i64,
    /// Taken from storage locations, in draw order
    pub draws: Vec<LocationDraw>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDraw {
    pub location_id: Uuid,
    pub quantity: i64,
}

impl OutboundPlan {
    pub fn total(&self) -> i64 {
        self.from_unassigned + self.draws.iter().map(|d| d.quantity).sum::<i64>()
    }
}

/// Plan an outbound draw of `quantity`: unassigned stock first, then
/// locations in the given order (callers pass them oldest first).
///
/// Returns the available total when stock is insufficient.
pub fn plan_outbound(
    unassigned: i64,
    located: &[(Uuid, i64)],
    quantity: i64,
) -> Result<OutboundPlan, i64> {
    let available = located
        .iter()
        .fold(unassigned, |acc, (_, q)| acc.saturating_add(*q));
    if quantity > available {
        return Err(available);
    }

    let mut remaining = quantity;
    let from_unassigned = remaining.min(unassigned);
    remaining -= from_unassigned;

    let mut draws = Vec::new();
    for (location_id, held) in located {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(*held);
        if take > 0 {
            draws.push(LocationDraw { location_id: *location_id, quantity: take });
            remaining -= take;
        }
    }

    Ok(OutboundPlan { from_unassigned, draws })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_transitions() {
        assert!(ShipmentStatus::Pending.can_transition_to(ShipmentStatus::InTransit));
        assert!(ShipmentStatus::Pending.can_transition_to(ShipmentStatus::Delivered));
        assert!(ShipmentStatus::InTransit.can_transition_to(ShipmentStatus::Delivered));
    }

    #[test]
    fn test_delivered_is_terminal() {
        for next in [ShipmentStatus::Pending, ShipmentStatus::InTransit, ShipmentStatus::Delivered] {
            assert!(ShipmentStatus::Delivered.transition(next).is_err());
        }
    }

    #[test]
    fn test_no_backward_transition() {
        assert!(ShipmentStatus::InTransit.transition(ShipmentStatus::Pending).is_err());
        assert!(ShipmentStatus::Pending.transition(ShipmentStatus::Pending).is_err());
    }

    #[test]
    fn test_transition_error_message() {
        let err = ShipmentStatus::Delivered
            .transition(ShipmentStatus::InTransit)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot transition from 'Delivered' to 'In Transit'");
    }

    #[test]
    fn test_plan_uses_unassigned_first() {
        let a = Uuid::new_v4();
        let plan = plan_outbound(5, &[(a, 10)], 8).unwrap();
        assert_eq!(plan.from_unassigned, 5);
        assert_eq!(plan.draws, vec![LocationDraw { location_id: a, quantity: 3 }]);
    }

    #[test]
    fn test_plan_walks_locations_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let plan = plan_outbound(0, &[(a, 4), (b, 10)], 6).unwrap();
        assert_eq!(
            plan.draws,
            vec![
                LocationDraw { location_id: a, quantity: 4 },
                LocationDraw { location_id: b, quantity: 2 },
            ]
        );
    }

    #[test]
    fn test_plan_insufficient_reports_available() {
        let a = Uuid::new_v4();
        assert_eq!(plan_outbound(2, &[(a, 3)], 6), Err(5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_plan_takes_exactly_requested(
            unassigned in 0i64..100,
            held in prop::collection::vec(1i64..100, 0..6),
            quantity in 1i64..400,
        ) {
            let located: Vec<(Uuid, i64)> = held.iter().map(|q| (Uuid::new_v4(), *q)).collect();
            let available = unassigned + held.iter().sum::<i64>();

            match plan_outbound(unassigned, &located, quantity) {
                Ok(plan) => {
                    prop_assert!(quantity <= available);
                    prop_assert_eq!(plan.total(), quantity);
                    prop_assert!(plan.from_unassigned <= unassigned);
                    for draw in &plan.draws {
                        let held = located.iter().find(|(id, _)| *id == draw.location_id).unwrap().1;
                        prop_assert!(draw.quantity > 0 && draw.quantity <= held);
                    }
                }
                Err(reported) => {
                    prop_assert!(quantity > available);
                    prop_assert_eq!(reported, available);
                }
            }
        }
    }
}
