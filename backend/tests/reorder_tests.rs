//! Reorder suggestion and stock history tests
//!
//! - At most one pending suggestion per product
//! - Only pending suggestions can be marked Ordered or Ignored
//! - History filters and per-action summary

mod common;

use chrono::{Duration, Utc};
use common::{movement, Harness};
use proptest::prelude::*;
use shared::{
    HistoryFilter, Pagination, StockAction, SuggestionStatus, TransferStockInput,
    UpdateSuggestionInput,
};
use stock_ledger::error::ErrorKind;
use stock_ledger::services::SuggestionScope;
use uuid::Uuid;

fn mark(status: SuggestionStatus) -> UpdateSuggestionInput {
    UpdateSuggestionInput { status }
}

// ============================================================================
// Reorder suggestions
// ============================================================================

#[tokio::test]
async fn test_low_stock_keeps_single_pending_suggestion() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let ledger = h.state.ledger();

    for _ in 0..3 {
        ledger.assign(h.user, movement(product.id, slots[0].id, 1)).await.unwrap();
    }

    let pending = h.pending(product.id).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].suggested_quantity, shared::DEFAULT_REORDER_QUANTITY);
    assert_eq!(pending[0].status, SuggestionStatus::Pending);
}

#[tokio::test]
async fn test_mark_ordered() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 2))
        .await
        .unwrap();
    let suggestion = h.pending(product.id).await.remove(0);

    let updated = h
        .state
        .reorder()
        .update_status(h.user, suggestion.id, mark(SuggestionStatus::Ordered))
        .await
        .unwrap();

    assert_eq!(updated.status, SuggestionStatus::Ordered);
    assert!(h.pending(product.id).await.is_empty());
    let ordered = h
        .suggestions(SuggestionScope::Status(SuggestionStatus::Ordered), product.id)
        .await;
    assert_eq!(ordered.len(), 1);
}

#[tokio::test]
async fn test_closed_suggestion_cannot_change_again() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 2))
        .await
        .unwrap();
    let suggestion = h.pending(product.id).await.remove(0);
    let service = h.state.reorder();

    service
        .update_status(h.user, suggestion.id, mark(SuggestionStatus::Ignored))
        .await
        .unwrap();
    let err = service
        .update_status(h.user, suggestion.id, mark(SuggestionStatus::Ordered))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn test_user_cannot_set_pending_or_resolved() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 2))
        .await
        .unwrap();
    let suggestion = h.pending(product.id).await.remove(0);
    let service = h.state.reorder();

    for status in [SuggestionStatus::Pending, SuggestionStatus::Resolved] {
        let err = service
            .update_status(h.user, suggestion.id, mark(status))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }
}

#[tokio::test]
async fn test_new_suggestion_after_ignored_one() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 2)).await.unwrap();
    let first = h.pending(product.id).await.remove(0);
    h.state
        .reorder()
        .update_status(h.user, first.id, mark(SuggestionStatus::Ignored))
        .await
        .unwrap();

    ledger.assign(h.user, movement(product.id, slots[0].id, 1)).await.unwrap();

    let pending = h.pending(product.id).await;
    assert_eq!(pending.len(), 1);
    assert_ne!(pending[0].id, first.id);
}

#[tokio::test]
async fn test_unknown_suggestion_is_not_found() {
    let h = Harness::new();
    let err = h
        .state
        .reorder()
        .update_status(h.user, Uuid::new_v4(), mark(SuggestionStatus::Ordered))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_history_filter_and_summary() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 2).await;
    let ledger = h.state.ledger();
    ledger.assign(h.user, movement(product.id, slots[0].id, 20)).await.unwrap();
    ledger.assign(h.user, movement(product.id, slots[0].id, 5)).await.unwrap();
    ledger.pick(h.user, movement(product.id, slots[0].id, 4)).await.unwrap();
    ledger
        .transfer(
            h.user,
            TransferStockInput {
                product_id: product.id,
                from_location_id: slots[0].id,
                to_location_id: slots[1].id,
                quantity: 6,
                note: None,
            },
        )
        .await
        .unwrap();

    let filter = HistoryFilter {
        product_id: Some(product.id),
        action: Some(StockAction::Assign),
        ..Default::default()
    };
    let assigns = h
        .state
        .history()
        .list(h.user, &filter, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(assigns.pagination.total_items, 2);

    let summary = h.state.history().summary(h.user, product.id).await.unwrap();
    let assign = summary.iter().find(|s| s.action == StockAction::Assign).unwrap();
    assert_eq!((assign.total_quantity, assign.count), (25, 2));
    let pick = summary.iter().find(|s| s.action == StockAction::Pick).unwrap();
    assert_eq!((pick.total_quantity, pick.count), (4, 1));
    assert_eq!(summary.len(), 3);
}

#[tokio::test]
async fn test_history_date_range() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 3))
        .await
        .unwrap();
    let service = h.state.history();

    let past = HistoryFilter {
        end: Some(Utc::now() - Duration::hours(1)),
        ..Default::default()
    };
    let none = service.list(h.user, &past, &Pagination::default()).await.unwrap();
    assert!(none.data.is_empty());

    let inverted = HistoryFilter {
        start: Some(Utc::now()),
        end: Some(Utc::now() - Duration::days(1)),
        ..Default::default()
    };
    let err = service.list(h.user, &inverted, &Pagination::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_history_is_scoped_to_owner() {
    let h = Harness::new();
    let (product, slots) = h.fixture(10, 1).await;
    h.state
        .ledger()
        .assign(h.user, movement(product.id, slots[0].id, 3))
        .await
        .unwrap();

    let stranger = h
        .state
        .history()
        .list(Uuid::new_v4(), &HistoryFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert!(stranger.data.is_empty());

    let err = h.state.history().summary(Uuid::new_v4(), product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Whatever the sequence of receipts and picks, a product never has more
    /// than one pending suggestion, and has one exactly when low on stock.
    #[test]
    fn prop_single_pending_suggestion(
        threshold in 0..30i64,
        moves in prop::collection::vec((any::<bool>(), 1..20i64), 1..15)
    ) {
        tokio_test::block_on(async {
            let h = Harness::new();
            let (product, slots) = h.fixture(threshold, 1).await;
            let ledger = h.state.ledger();
            let location = slots[0].id;

            for (inbound, quantity) in moves {
                let input = movement(product.id, location, quantity);
                let _ = if inbound {
                    ledger.receive(h.user, input).await
                } else {
                    ledger.pick(h.user, input).await
                };

                let total = h.current(product.id).await.total_quantity;
                let pending = h.pending(product.id).await.len();
                prop_assert!(pending <= 1);
                if !h.history(product.id).await.is_empty() {
                    prop_assert_eq!(pending == 1, total <= threshold);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
