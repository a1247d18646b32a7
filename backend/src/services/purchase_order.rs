//! Draft purchase orders
//!
//! An order is drafted from a pending reorder suggestion, submitted for
//! approval, then approved or rejected by a manager. Approval marks the
//! suggestion Ordered in the same transaction.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    ActivityEntry, CreatePurchaseOrderInput, DraftPurchaseOrder, EntityKind, PaginatedResponse,
    Pagination, PurchaseOrderFilter, PurchaseOrderStatus, RejectPurchaseOrderInput,
    SuggestionStatus, UpdatePurchaseOrderInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::store::{LedgerStore, StoreTx};

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

fn check_cost(cost: Option<Decimal>) -> AppResult<()> {
    match cost {
        Some(cost) if cost.is_sign_negative() => Err(AppError::InvalidArgument(
            "Estimated cost cannot be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn lock_order(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    order_id: Uuid,
) -> AppResult<DraftPurchaseOrder> {
    tx.lock_purchase_order(user_id, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Purchase order"))
}

impl PurchaseOrderService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Draft an order for a pending suggestion. One open draft per suggestion.
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<DraftPurchaseOrder> {
        input.validate()?;
        check_cost(input.estimated_cost)?;

        let mut tx = self.store.begin().await?;
        let suggestion = tx
            .lock_suggestion(user_id, input.suggestion_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reorder suggestion"))?;

        if !suggestion.status.is_pending() {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase orders can only be drafted for pending suggestions; this one is '{}'",
                suggestion.status
            )));
        }
        if let Some(open) = tx.find_open_purchase_order(user_id, suggestion.id).await? {
            return Err(AppError::Conflict(format!(
                "Purchase order {} is already open for this suggestion",
                open.id
            )));
        }

        let now = Utc::now();
        let order = DraftPurchaseOrder {
            id: Uuid::new_v4(),
            owner_id: user_id,
            suggestion_id: suggestion.id,
            product_id: suggestion.product_id,
            approved_quantity: input.approved_quantity.unwrap_or(suggestion.suggested_quantity),
            supplier: shared::normalize_text(input.supplier.as_deref()),
            estimated_cost: input.estimated_cost,
            status: PurchaseOrderStatus::Draft,
            created_by: user_id,
            approved_by: None,
            approved_at: None,
            notes: shared::normalize_text(input.notes.as_deref()),
            created_at: now,
            updated_at: now,
        };
        tx.insert_purchase_order(&order).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Create Purchase Order",
            EntityKind::PurchaseOrder,
            order.id,
            format!(
                "Drafted order of {} for product {}",
                order.approved_quantity, order.product_id
            ),
        ));

        Ok(order)
    }

    pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> AppResult<DraftPurchaseOrder> {
        let mut tx = self.store.begin().await?;
        tx.get_purchase_order(user_id, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order"))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &PurchaseOrderFilter,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<DraftPurchaseOrder>> {
        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_purchase_orders(user_id, filter, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    /// Orders waiting for a manager
    pub async fn pending_approvals(
        &self,
        user_id: Uuid,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<DraftPurchaseOrder>> {
        let filter = PurchaseOrderFilter {
            status: Some(PurchaseOrderStatus::PendingApproval),
            suggestion_id: None,
        };
        self.list(user_id, &filter, page).await
    }

    /// Edit an order that has not been decided yet
    pub async fn update(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> AppResult<DraftPurchaseOrder> {
        input.validate()?;
        check_cost(input.estimated_cost)?;

        let mut tx = self.store.begin().await?;
        let mut order = lock_order(tx.as_mut(), user_id, order_id).await?;
        if !order.status.is_open() {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase order is '{}' and can no longer be edited",
                order.status
            )));
        }

        if let Some(quantity) = input.approved_quantity {
            order.approved_quantity = quantity;
        }
        if input.supplier.is_some() {
            order.supplier = shared::normalize_text(input.supplier.as_deref());
        }
        if input.estimated_cost.is_some() {
            order.estimated_cost = input.estimated_cost;
        }
        if input.notes.is_some() {
            order.notes = shared::normalize_text(input.notes.as_deref());
        }
        order.updated_at = Utc::now();
        tx.update_purchase_order(&order).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Purchase Order",
            EntityKind::PurchaseOrder,
            order.id,
            format!("Updated order for product {}", order.product_id),
        ));

        Ok(order)
    }

    /// Draft -> Pending_Approval
    pub async fn submit(&self, user_id: Uuid, order_id: Uuid) -> AppResult<DraftPurchaseOrder> {
        self.advance(user_id, order_id, PurchaseOrderStatus::PendingApproval, None)
            .await
    }

    /// Pending_Approval -> Approved. The suggestion, if still pending, becomes Ordered.
    pub async fn approve(&self, user_id: Uuid, order_id: Uuid) -> AppResult<DraftPurchaseOrder> {
        self.advance(user_id, order_id, PurchaseOrderStatus::Approved, None)
            .await
    }

    /// Pending_Approval -> Rejected, keeping the reason as the order's notes
    pub async fn reject(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: RejectPurchaseOrderInput,
    ) -> AppResult<DraftPurchaseOrder> {
        input.validate()?;
        let reason = shared::normalize_text(Some(input.reason.as_str())).ok_or_else(|| {
            AppError::InvalidArgument("A rejection reason is required".to_string())
        })?;
        self.advance(user_id, order_id, PurchaseOrderStatus::Rejected, Some(reason))
            .await
    }

    /// Approved -> Ordered, once the order has been placed with the supplier
    pub async fn mark_ordered(&self, user_id: Uuid, order_id: Uuid) -> AppResult<DraftPurchaseOrder> {
        self.advance(user_id, order_id, PurchaseOrderStatus::Ordered, None)
            .await
    }

    async fn advance(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        next: PurchaseOrderStatus,
        reason: Option<String>,
    ) -> AppResult<DraftPurchaseOrder> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(tx.as_mut(), user_id, order_id).await?;

        let previous = order.status;
        order.status = previous.transition(next)?;
        order.updated_at = now;

        match next {
            PurchaseOrderStatus::Approved | PurchaseOrderStatus::Rejected => {
                order.approved_by = Some(user_id);
                order.approved_at = Some(now);
            }
            _ => {}
        }
        if reason.is_some() {
            order.notes = reason;
        }
        tx.update_purchase_order(&order).await?;

        if next == PurchaseOrderStatus::Approved {
            if let Some(mut suggestion) = tx.lock_suggestion(user_id, order.suggestion_id).await? {
                // A suggestion resolved by a restock meanwhile stays Resolved
                if suggestion.status.is_pending() {
                    suggestion.status = SuggestionStatus::Ordered;
                    suggestion.updated_at = now;
                    tx.update_suggestion(&suggestion).await?;
                }
            }
        }
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %order.status,
            "purchase order status changed"
        );
        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Purchase Order Status",
            EntityKind::PurchaseOrder,
            order.id,
            format!("Moved order from {} to {}", previous, order.status),
        ));

        Ok(order)
    }
}
