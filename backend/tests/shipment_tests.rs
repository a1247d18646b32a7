//! Shipment lifecycle tests
//!
//! - State machine: Pending -> In Transit -> Delivered, Delivered is terminal
//! - Delivery applies its stock effect exactly once
//! - Inbound stock lands in the unassigned component and survives reconciliation
//! - Outbound stock is drawn from unassigned first, then oldest rows

mod common;

use common::{movement, Harness};
use serde_json::json;
use shared::{
    CreateShipmentInput, Pagination, Shipment, ShipmentFilter, ShipmentStatus, ShipmentType,
    StockAction, UpdateShipmentStatusInput,
};
use stock_ledger::error::{AppError, ErrorKind};
use uuid::Uuid;

async fn ship(h: &Harness, product_id: Uuid, shipment_type: ShipmentType, quantity: i64) -> Shipment {
    h.state
        .shipments()
        .create(
            h.user,
            CreateShipmentInput {
                shipment_type,
                product_id,
                quantity,
                notes: None,
            },
        )
        .await
        .unwrap()
}

fn to(status: ShipmentStatus) -> UpdateShipmentStatusInput {
    UpdateShipmentStatusInput { status }
}

#[tokio::test]
async fn test_inbound_delivery_adds_unassigned_stock() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 40).await;
    assert_eq!(shipment.status, ShipmentStatus::Pending);

    let service = h.state.shipments();
    let (in_transit, receipt) = service
        .update_status(h.user, shipment.id, to(ShipmentStatus::InTransit))
        .await
        .unwrap();
    assert_eq!(in_transit.status, ShipmentStatus::InTransit);
    assert!(receipt.is_none());
    assert_eq!(h.current(product.id).await.total_quantity, 0);

    let (delivered, receipt) = service
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    let receipt = receipt.unwrap();

    assert_eq!(delivered.status, ShipmentStatus::Delivered);
    assert_eq!(receipt.product.total_quantity, 40);
    assert_eq!(receipt.product.unassigned_quantity, 40);
    assert_eq!(receipt.history.action, StockAction::ShipmentInbound);
    assert_eq!(receipt.history.from_location_id, None);
    assert_eq!(receipt.history.to_location_id, None);
    assert_eq!(receipt.history.metadata["shipment_id"], json!(shipment.id));
}

#[tokio::test]
async fn test_delivery_is_applied_once() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 15).await;
    let service = h.state.shipments();

    service
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    let err = service
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert_eq!(h.current(product.id).await.total_quantity, 15);
    assert_eq!(h.history(product.id).await.len(), 1);
}

#[tokio::test]
async fn test_delivered_cannot_move_back() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 5).await;
    let service = h.state.shipments();
    service
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();

    for status in [ShipmentStatus::Pending, ShipmentStatus::InTransit] {
        let err = service.update_status(h.user, shipment.id, to(status)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }
}

#[tokio::test]
async fn test_reconcile_keeps_delivered_stock() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 30).await;
    h.state
        .shipments()
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();

    // A location-based movement reconciles the total from its parts
    let receipt = h
        .state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 5))
        .await
        .unwrap();
    assert_eq!(receipt.product.total_quantity, 35);

    let reconciliation = h.state.ledger().reconcile_product(h.user, product.id).await.unwrap();
    assert!(!reconciliation.drifted());
    assert_eq!(reconciliation.product.total_quantity, 35);
}

#[tokio::test]
async fn test_put_away_moves_unassigned_into_location() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let a = slots[0].id;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 10).await;
    h.state
        .shipments()
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();

    let receipt = h.state.ledger().put_away(h.user, movement(product.id, a, 6)).await.unwrap();

    assert_eq!(receipt.product.unassigned_quantity, 4);
    assert_eq!(receipt.product.total_quantity, 10);
    assert_eq!(h.stock_at(product.id, a).await, Some(6));
    assert_eq!(receipt.history.action, StockAction::Transfer);
    assert_eq!(receipt.history.from_location_id, None);
    assert_eq!(receipt.history.to_location_id, Some(a));
    assert_eq!(receipt.history.metadata["source"], json!("unassigned"));

    let err = h
        .state
        .ledger()
        .put_away(h.user, movement(product.id, a, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 4, requested: 5 }));
}

#[tokio::test]
async fn test_outbound_draws_unassigned_then_oldest_rows() {
    let h = Harness::new();
    let (product, slots) = h.fixture(0, 2).await;
    let (a, b) = (slots[0].id, slots[1].id);
    let service = h.state.shipments();
    let ledger = h.state.ledger();

    let inbound = ship(&h, product.id, ShipmentType::Inbound, 10).await;
    service
        .update_status(h.user, inbound.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    ledger.assign(h.user, movement(product.id, a, 5)).await.unwrap();
    ledger.assign(h.user, movement(product.id, b, 8)).await.unwrap();

    let outbound = ship(&h, product.id, ShipmentType::Outbound, 18).await;
    let (_, receipt) = service
        .update_status(h.user, outbound.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    let receipt = receipt.unwrap();

    assert_eq!(receipt.product.unassigned_quantity, 0);
    assert_eq!(receipt.product.total_quantity, 5);
    assert_eq!(h.stock_at(product.id, a).await, None);
    assert_eq!(h.stock_at(product.id, b).await, Some(5));
    assert_eq!(receipt.history.action, StockAction::ShipmentOutbound);
    assert_eq!(receipt.history.quantity, 18);
    assert_eq!(receipt.history.metadata["from_unassigned"], json!(10));
    assert_eq!(
        receipt.history.metadata["draws"],
        json!([
            { "location_id": a, "quantity": 5 },
            { "location_id": b, "quantity": 3 }
        ])
    );
}

#[tokio::test]
async fn test_outbound_creation_checks_stock() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 7))
        .await
        .unwrap();

    let err = h
        .state
        .shipments()
        .create(
            h.user,
            CreateShipmentInput {
                shipment_type: ShipmentType::Outbound,
                product_id: product.id,
                quantity: 8,
                notes: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { available: 7, requested: 8 }));
}

#[tokio::test]
async fn test_outbound_delivery_rolls_back_when_stock_is_gone() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let a = slots[0].id;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, a, 10)).await.unwrap();

    let outbound = ship(&h, product.id, ShipmentType::Outbound, 10).await;
    ledger.pick(h.user, movement(product.id, a, 6)).await.unwrap();

    let err = h
        .state
        .shipments()
        .update_status(h.user, outbound.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { available: 4, requested: 10 }));
    let shipment = h.state.shipments().get(h.user, outbound.id).await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert_eq!(h.stock_at(product.id, a).await, Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_reads_alongside_status_changes() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    let shipment = ship(&h, product.id, ShipmentType::Inbound, 15).await;

    let reader = {
        let service = h.state.shipments();
        let (user, id) = (h.user, shipment.id);
        tokio::spawn(async move {
            for _ in 0..20 {
                service.get(user, id).await.unwrap();
            }
        })
    };
    let service = h.state.shipments();
    service
        .update_status(h.user, shipment.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    reader.await.unwrap();

    let read = service.get(h.user, shipment.id).await.unwrap();
    assert_eq!(read.status, ShipmentStatus::Delivered);
    assert_eq!(h.current(product.id).await.total_quantity, 15);

    let err = service.get(Uuid::new_v4(), shipment.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_oversized_shipment_quantity_is_invalid() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;

    let err = h
        .state
        .shipments()
        .create(
            h.user,
            CreateShipmentInput {
                shipment_type: ShipmentType::Inbound,
                product_id: product.id,
                quantity: i64::MAX,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_delete_only_before_delivery() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    let service = h.state.shipments();

    let pending = ship(&h, product.id, ShipmentType::Inbound, 3).await;
    service.delete(h.user, pending.id).await.unwrap();
    let err = service.get(h.user, pending.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let delivered = ship(&h, product.id, ShipmentType::Inbound, 3).await;
    service
        .update_status(h.user, delivered.id, to(ShipmentStatus::Delivered))
        .await
        .unwrap();
    let err = service.delete(h.user, delivered.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_inactive_product_cannot_ship() {
    let h = Harness::new();
    let (product, _) = h.fixture(10, 0).await;
    h.state.products().deactivate(h.user, product.id).await.unwrap();

    let err = h
        .state
        .shipments()
        .create(
            h.user,
            CreateShipmentInput {
                shipment_type: ShipmentType::Inbound,
                product_id: product.id,
                quantity: 3,
                notes: None,
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_list_filters_by_type() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 50))
        .await
        .unwrap();
    ship(&h, product.id, ShipmentType::Inbound, 3).await;
    ship(&h, product.id, ShipmentType::Inbound, 4).await;
    ship(&h, product.id, ShipmentType::Outbound, 5).await;

    let filter = ShipmentFilter {
        shipment_type: Some(ShipmentType::Inbound),
        product_id: None,
    };
    let page = h
        .state
        .shipments()
        .list(h.user, &filter, &Pagination::default())
        .await
        .unwrap();

    assert_eq!(page.pagination.total_items, 2);
    assert!(page.data.iter().all(|s| s.shipment_type == ShipmentType::Inbound));
}
