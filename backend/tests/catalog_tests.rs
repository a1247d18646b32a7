//! Catalog tests: products, warehouses and storage locations
//!
//! - Uniqueness per owner (SKU, warehouse name, rack/bin slot)
//! - Soft delete of products
//! - Cascading deletes reconcile the products that lost stock

mod common;

use common::{movement, Harness};
use rust_decimal::Decimal;
use shared::{
    CreateLocationInput, CreateProductInput, CreateWarehouseInput, EntityKind, Pagination,
    ProductFilter, ReorderOutcome, StockAction, UpdateProductInput, UpdateWarehouseInput,
    DEFAULT_LOCATION_CAPACITY, DEFAULT_ZONE,
};
use stock_ledger::error::ErrorKind;
use uuid::Uuid;

fn product_input(sku: &str) -> CreateProductInput {
    CreateProductInput {
        name: format!("Widget {}", sku),
        sku: sku.to_string(),
        category: None,
        price: Decimal::new(500, 2),
        reorder_threshold: None,
    }
}

fn location_input(warehouse_id: Uuid, rack: &str, bin: &str) -> CreateLocationInput {
    CreateLocationInput {
        warehouse_id,
        rack: rack.to_string(),
        bin: bin.to_string(),
        zone: None,
        capacity: None,
    }
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
async fn test_create_product_defaults() {
    let h = Harness::new();
    let product = h.state.products().create(h.user, product_input("W-1")).await.unwrap();

    assert_eq!(product.reorder_threshold, 10);
    assert_eq!(product.total_quantity, 0);
    assert_eq!(product.unassigned_quantity, 0);
    assert!(product.is_active());
    // Creation does not evaluate reorder
    assert!(h.pending(product.id).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_sku_conflicts_per_owner() {
    let h = Harness::new();
    let service = h.state.products();
    service.create(h.user, product_input("W-1")).await.unwrap();

    let err = service.create(h.user, product_input("W-1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("W-1"));

    // Another owner may reuse the SKU
    service.create(Uuid::new_v4(), product_input("W-1")).await.unwrap();
}

#[tokio::test]
async fn test_invalid_product_input() {
    let h = Harness::new();
    let service = h.state.products();

    let err = service.create(h.user, product_input("HAS SPACE")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let mut negative = product_input("W-2");
    negative.price = Decimal::new(-1, 0);
    let err = service.create(h.user, negative).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let mut threshold = product_input("W-3");
    threshold.reorder_threshold = Some(-5);
    let err = service.create(h.user, threshold).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_update_evaluates_reorder() {
    let h = Harness::new();
    let product = h.product("W-1", 10).await;

    let (updated, reorder) = h
        .state
        .products()
        .update(
            h.user,
            product.id,
            UpdateProductInput {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert!(matches!(reorder, ReorderOutcome::Created(_)));
    assert_eq!(h.pending(product.id).await.len(), 1);
}

#[tokio::test]
async fn test_update_to_taken_sku_conflicts() {
    let h = Harness::new();
    h.product("W-1", 10).await;
    let second = h.product("W-2", 10).await;

    let err = h
        .state
        .products()
        .update(
            h.user,
            second.id,
            UpdateProductInput {
                sku: Some("W-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.current(second.id).await.sku, "W-2");
}

#[tokio::test]
async fn test_deactivate_hides_product_and_is_not_repeatable() {
    let h = Harness::new();
    let product = h.product("W-1", 10).await;
    let service = h.state.products();

    let outcome = service.deactivate(h.user, product.id).await.unwrap();
    assert_eq!(outcome.affected_entities[0].entity, EntityKind::Product);

    let listed = service
        .list(h.user, &ProductFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert!(listed.data.is_empty());

    let err = service.deactivate(h.user, product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_list_filters_low_stock_and_query() {
    let h = Harness::new();
    let (stocked, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(stocked.id, slots[0].id, 50))
        .await
        .unwrap();
    let empty = h.product("EMPTY-1", 10).await;
    let service = h.state.products();

    let low = service
        .list(
            h.user,
            &ProductFilter { query: None, low_stock: true },
            &Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(low.data.len(), 1);
    assert_eq!(low.data[0].id, empty.id);

    let found = service
        .list(
            h.user,
            &ProductFilter { query: Some("empty".to_string()), low_stock: false },
            &Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.pagination.total_items, 1);
}

#[tokio::test]
async fn test_stock_breakdown_by_location() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 2).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 4)).await.unwrap();
    ledger.assign(h.user, movement(product.id, slots[1].id, 6)).await.unwrap();

    let stock = h.state.products().stock(h.user, product.id).await.unwrap();

    assert_eq!(stock.total_quantity, 10);
    assert_eq!(stock.unassigned_quantity, 0);
    assert_eq!(stock.locations.len(), 2);
}

// ============================================================================
// Warehouses and locations
// ============================================================================

#[tokio::test]
async fn test_duplicate_warehouse_name_conflicts() {
    let h = Harness::new();
    h.warehouse("Main").await;

    let err = h
        .state
        .warehouses()
        .create_warehouse(
            h.user,
            CreateWarehouseInput {
                name: "Main".to_string(),
                address: "Elsewhere".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_update_warehouse_fields() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;

    let updated = h
        .state
        .warehouses()
        .update_warehouse(
            h.user,
            warehouse.id,
            UpdateWarehouseInput {
                address: Some("2 Harbour Lane".to_string()),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Main");
    assert_eq!(updated.address, "2 Harbour Lane");
    assert!(!updated.is_active);
}

#[tokio::test]
async fn test_location_defaults_and_normalization() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;

    let location = h
        .state
        .warehouses()
        .create_location(h.user, location_input(warehouse.id, " a1 ", "b-02"))
        .await
        .unwrap();

    assert_eq!(location.rack, "A1");
    assert_eq!(location.bin, "B-02");
    assert_eq!(location.zone, DEFAULT_ZONE);
    assert_eq!(location.capacity, DEFAULT_LOCATION_CAPACITY);
}

#[tokio::test]
async fn test_duplicate_slot_conflicts() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;
    let service = h.state.warehouses();
    service
        .create_location(h.user, location_input(warehouse.id, "A", "01"))
        .await
        .unwrap();

    let err = service
        .create_location(h.user, location_input(warehouse.id, "a", "01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Same slot in another warehouse is fine
    let other = h.warehouse("Annex").await;
    service
        .create_location(h.user, location_input(other.id, "A", "01"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_location_validation() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;
    let service = h.state.warehouses();

    let err = service
        .create_location(h.user, location_input(warehouse.id, "A 1", "01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = service
        .create_location(h.user, location_input(Uuid::new_v4(), "A", "01"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_locations_sorted_by_rack_then_bin() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;
    for (rack, bin) in [("B", "01"), ("A", "02"), ("A", "01")] {
        h.location(warehouse.id, rack, bin).await;
    }

    let labels: Vec<String> = h
        .state
        .warehouses()
        .list_locations(h.user, warehouse.id)
        .await
        .unwrap()
        .iter()
        .map(|l| l.label())
        .collect();

    assert_eq!(labels, ["A-01", "A-02", "B-01"]);
}

#[tokio::test]
async fn test_location_detail_shows_stock() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 9))
        .await
        .unwrap();

    let detail = h
        .state
        .warehouses()
        .location_detail(h.user, slots[0].id)
        .await
        .unwrap();

    assert_eq!(detail.location.id, slots[0].id);
    assert_eq!(detail.stock.len(), 1);
    assert_eq!(detail.stock[0].quantity, 9);
}

#[tokio::test]
async fn test_delete_location_reconciles_products() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 2).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 30)).await.unwrap();
    ledger.assign(h.user, movement(product.id, slots[1].id, 5)).await.unwrap();

    let outcome = h
        .state
        .warehouses()
        .delete_location(h.user, slots[0].id)
        .await
        .unwrap();

    assert!(outcome
        .affected_entities
        .iter()
        .any(|e| e.entity == EntityKind::Product && e.id == product.id));
    let current = h.current(product.id).await;
    assert_eq!(current.total_quantity, 5);
    assert_eq!(h.located_sum(product.id).await, 5);
    // Dropped to the threshold: a suggestion is raised
    assert_eq!(h.pending(product.id).await.len(), 1);
    // History survives the location
    assert_eq!(h.history(product.id).await.len(), 2);
}

#[tokio::test]
async fn test_delete_warehouse_cascades() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 2).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 12)).await.unwrap();
    ledger.assign(h.user, movement(product.id, slots[1].id, 8)).await.unwrap();
    let warehouse_id = slots[0].warehouse_id;
    let service = h.state.warehouses();

    service.delete_warehouse(h.user, warehouse_id).await.unwrap();

    assert_eq!(service.get_warehouse(h.user, warehouse_id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service.location_detail(h.user, slots[0].id).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(h.current(product.id).await.total_quantity, 0);
    assert_eq!(h.pending(product.id).await.len(), 1);
    let assigns = h
        .history(product.id)
        .await
        .into_iter()
        .filter(|e| e.action == StockAction::Assign)
        .count();
    assert_eq!(assigns, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_racing_assign_keeps_totals_reconciled() {
    let h = Harness::new();
    for round in 0..10 {
        let (product, slots) = h.fixture(5, 1).await;
        let elsewhere = h.warehouse(&format!("Overflow {}", round)).await;
        let spare = h.location(elsewhere.id, "Z", "01").await;
        h.state.ledger().assign(h.user, movement(product.id, spare.id, 7)).await.unwrap();

        let slot = slots[0].clone();
        let assign = {
            let ledger = h.state.ledger();
            let (user, product_id) = (h.user, product.id);
            tokio::spawn(async move { ledger.assign(user, movement(product_id, slot.id, 4)).await })
        };
        let delete = {
            let service = h.state.warehouses();
            let (user, warehouse_id) = (h.user, slots[0].warehouse_id);
            tokio::spawn(async move { service.delete_warehouse(user, warehouse_id).await })
        };
        let (assigned, deleted) = tokio::join!(assign, delete);
        deleted.unwrap().unwrap();
        if let Err(err) = assigned.unwrap() {
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }

        let current = h.current(product.id).await;
        assert_eq!(current.total_quantity, 7);
        assert_eq!(
            current.total_quantity,
            h.located_sum(product.id).await + current.unassigned_quantity
        );
    }
}

#[tokio::test]
async fn test_stock_report_sorted_by_product_rack_bin() {
    let h = Harness::new();
    let warehouse = h.warehouse("Main").await;
    let a2 = h.location(warehouse.id, "A", "02").await;
    let a1 = h.location(warehouse.id, "A", "01").await;
    let zebra = h.product("Z-1", 0).await;
    let apple = h.product("A-1", 0).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(zebra.id, a1.id, 1)).await.unwrap();
    ledger.assign(h.user, movement(apple.id, a2.id, 2)).await.unwrap();
    ledger.assign(h.user, movement(apple.id, a1.id, 3)).await.unwrap();

    let report = h.state.warehouses().stock_report(h.user, warehouse.id).await.unwrap();

    let rows: Vec<(String, String, i64)> = report
        .rows
        .iter()
        .map(|r| (r.product_sku.clone(), r.bin.clone(), r.quantity))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("A-1".to_string(), "01".to_string(), 3),
            ("A-1".to_string(), "02".to_string(), 2),
            ("Z-1".to_string(), "01".to_string(), 1),
        ]
    );
    assert_eq!(report.warehouse_name, "Main");
}
