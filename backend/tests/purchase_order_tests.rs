//! Draft purchase order tests
//!
//! - Draft -> Pending_Approval -> Approved | Rejected, Approved -> Ordered
//! - One open draft per suggestion, only for pending suggestions
//! - Approval marks the suggestion Ordered
//! - Activity entries can be read back by entity

mod common;

use common::{movement, Harness};
use rust_decimal::Decimal;
use shared::{
    ActivityFilter, CreatePurchaseOrderInput, EntityKind, Pagination, PurchaseOrderFilter,
    PurchaseOrderStatus, ReorderSuggestion, RejectPurchaseOrderInput, SuggestionStatus,
    UpdatePurchaseOrderInput, UpdateSuggestionInput,
};
use stock_ledger::error::ErrorKind;
use stock_ledger::services::SuggestionScope;

fn draft_for(suggestion: &ReorderSuggestion) -> CreatePurchaseOrderInput {
    CreatePurchaseOrderInput {
        suggestion_id: suggestion.id,
        approved_quantity: None,
        supplier: Some("  Acme Supply ".to_string()),
        estimated_cost: Some(Decimal::new(12500, 2)),
        notes: None,
    }
}

/// A product below its threshold, with its pending suggestion
async fn low_stock(h: &Harness) -> ReorderSuggestion {
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 2))
        .await
        .unwrap();
    h.pending(product.id).await.remove(0)
}

#[tokio::test]
async fn test_draft_defaults_to_suggested_quantity() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;

    let order = h.state.purchase_orders().create(h.user, draft_for(&suggestion)).await.unwrap();

    assert_eq!(order.status, PurchaseOrderStatus::Draft);
    assert_eq!(order.approved_quantity, suggestion.suggested_quantity);
    assert_eq!(order.product_id, suggestion.product_id);
    assert_eq!(order.supplier.as_deref(), Some("Acme Supply"));
    assert_eq!(order.created_by, h.user);
    assert!(order.approved_by.is_none());
}

#[tokio::test]
async fn test_full_approval_marks_suggestion_ordered() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();

    let submitted = service.submit(h.user, order.id).await.unwrap();
    assert_eq!(submitted.status, PurchaseOrderStatus::PendingApproval);
    assert_eq!(h.pending(suggestion.product_id).await.len(), 1);

    let approved = service.approve(h.user, order.id).await.unwrap();
    assert_eq!(approved.status, PurchaseOrderStatus::Approved);
    assert_eq!(approved.approved_by, Some(h.user));
    assert!(approved.approved_at.is_some());

    assert!(h.pending(suggestion.product_id).await.is_empty());
    let ordered = h
        .suggestions(SuggestionScope::Status(SuggestionStatus::Ordered), suggestion.product_id)
        .await;
    assert_eq!(ordered.len(), 1);

    let placed = service.mark_ordered(h.user, order.id).await.unwrap();
    assert_eq!(placed.status, PurchaseOrderStatus::Ordered);
}

#[tokio::test]
async fn test_draft_cannot_be_approved_directly() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();

    let err = service.approve(h.user, order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    let err = service.mark_ordered(h.user, order.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    assert_eq!(service.get(h.user, order.id).await.unwrap().status, PurchaseOrderStatus::Draft);
    assert_eq!(h.pending(suggestion.product_id).await.len(), 1);
}

#[tokio::test]
async fn test_reject_keeps_reason_and_frees_suggestion() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();
    service.submit(h.user, order.id).await.unwrap();

    let rejected = service
        .reject(
            h.user,
            order.id,
            RejectPurchaseOrderInput { reason: "Over budget".to_string() },
        )
        .await
        .unwrap();

    assert_eq!(rejected.status, PurchaseOrderStatus::Rejected);
    assert_eq!(rejected.notes.as_deref(), Some("Over budget"));
    assert_eq!(rejected.approved_by, Some(h.user));
    // Suggestion stays pending and can be drafted again
    assert_eq!(h.pending(suggestion.product_id).await.len(), 1);
    let again = service.create(h.user, draft_for(&suggestion)).await.unwrap();
    assert_eq!(again.status, PurchaseOrderStatus::Draft);

    let err = service.submit(h.user, rejected.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_blank_rejection_reason_is_invalid() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();
    service.submit(h.user, order.id).await.unwrap();

    let err = service
        .reject(h.user, order.id, RejectPurchaseOrderInput { reason: "   ".to_string() })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(
        service.get(h.user, order.id).await.unwrap().status,
        PurchaseOrderStatus::PendingApproval
    );
}

#[tokio::test]
async fn test_one_open_draft_per_suggestion() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let first = service.create(h.user, draft_for(&suggestion)).await.unwrap();

    let err = service.create(h.user, draft_for(&suggestion)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    service.submit(h.user, first.id).await.unwrap();
    let err = service.create(h.user, draft_for(&suggestion)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let filter = PurchaseOrderFilter {
        status: None,
        suggestion_id: Some(suggestion.id),
    };
    let listed = service.list(h.user, &filter, &Pagination::new(1, 20)).await.unwrap();
    assert_eq!(listed.pagination.total_items, 1);
}

#[tokio::test]
async fn test_only_pending_suggestions_get_drafts() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    h.state
        .reorder()
        .update_status(h.user, suggestion.id, UpdateSuggestionInput { status: SuggestionStatus::Ignored })
        .await
        .unwrap();

    let err = h
        .state
        .purchase_orders()
        .create(h.user, draft_for(&suggestion))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_update_only_while_open() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();

    let edited = service
        .update(
            h.user,
            order.id,
            UpdatePurchaseOrderInput {
                approved_quantity: Some(80),
                notes: Some("Split delivery".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.approved_quantity, 80);
    assert_eq!(edited.notes.as_deref(), Some("Split delivery"));
    assert_eq!(edited.supplier.as_deref(), Some("Acme Supply"));

    let err = service
        .update(
            h.user,
            order.id,
            UpdatePurchaseOrderInput {
                estimated_cost: Some(Decimal::new(-1, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    service.submit(h.user, order.id).await.unwrap();
    service.approve(h.user, order.id).await.unwrap();
    let err = service
        .update(
            h.user,
            order.id,
            UpdatePurchaseOrderInput {
                approved_quantity: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_approval_leaves_resolved_suggestion_alone() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 2)).await.unwrap();
    let suggestion = h.pending(product.id).await.remove(0);
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();
    service.submit(h.user, order.id).await.unwrap();

    // Restock resolves the suggestion before the manager decides
    ledger.assign(h.user, movement(product.id, slots[0].id, 40)).await.unwrap();
    let approved = service.approve(h.user, order.id).await.unwrap();

    assert_eq!(approved.status, PurchaseOrderStatus::Approved);
    let resolved = h
        .suggestions(SuggestionScope::Status(SuggestionStatus::Resolved), product.id)
        .await;
    assert_eq!(resolved.len(), 1);
}

#[tokio::test]
async fn test_activity_lists_order_history_newest_first() {
    let h = Harness::new();
    let suggestion = low_stock(&h).await;
    let service = h.state.purchase_orders();
    let order = service.create(h.user, draft_for(&suggestion)).await.unwrap();
    service.submit(h.user, order.id).await.unwrap();

    let filter = ActivityFilter {
        entity: Some(EntityKind::PurchaseOrder),
        entity_id: Some(order.id),
    };
    let page = h
        .state
        .activity()
        .list(h.user, &filter, &Pagination::new(1, 20))
        .await
        .unwrap();

    assert_eq!(page.pagination.total_items, 2);
    assert_eq!(page.data[0].action, "Update Purchase Order Status");
    assert_eq!(page.data[1].action, "Create Purchase Order");

    let other_owner = h
        .state
        .activity()
        .list(uuid::Uuid::new_v4(), &ActivityFilter::default(), &Pagination::new(1, 20))
        .await
        .unwrap();
    assert!(other_owner.data.is_empty());
}
