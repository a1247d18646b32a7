//! Stock ledger
//!
//! Every operation is one transaction: lock the product row, change stock,
//! record exactly one history row, reconcile the product total, evaluate
//! reorder, commit. Any error before the commit drops the transaction and
//! nothing is kept. Audit entries are emitted only after the commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use shared::{
    add_quantities, plan_outbound, validate_counted_quantity, validate_quantity,
    validate_transfer_locations,
    ActivityEntry, AdjustStockInput, EntityKind, OperationOutcome, Product, ReorderOutcome,
    Shipment, ShipmentType, StockAction, StockHistory, StockMovementInput, StorageLocation,
    TransferStockInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::services::history::{Movement, MovementRecorder};
use crate::services::reconciler::reconcile;
use crate::services::reorder::ReorderEvaluator;
use crate::store::{Debit, LedgerStore, StoreTx};

/// What a committed ledger operation did
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    /// Product state after reconciliation
    pub product: Product,
    pub history: StockHistory,
    pub reorder: ReorderOutcome,
}

impl LedgerReceipt {
    pub fn outcome(&self) -> OperationOutcome {
        let mut outcome = OperationOutcome::new(self.history.reference.clone())
            .with(EntityKind::Product, self.product.id);
        for location_id in [self.history.from_location_id, self.history.to_location_id]
            .into_iter()
            .flatten()
        {
            outcome = outcome.with(EntityKind::StorageLocation, location_id);
        }
        if let ReorderOutcome::Created(suggestion) = &self.reorder {
            outcome = outcome.with(EntityKind::ReorderSuggestion, suggestion.id);
        }
        outcome
    }
}

/// Result of an explicit reconciliation
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub product: Product,
    pub previous_total: i64,
    pub reorder: Option<ReorderOutcome>,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.previous_total != self.product.total_quantity
    }
}

fn activity_name(action: StockAction) -> &'static str {
    match action {
        StockAction::Receive => "Receive Stock",
        StockAction::Pick => "Pick Stock",
        StockAction::Transfer => "Transfer Stock",
        StockAction::Assign => "Assign Stock",
        StockAction::ShipmentInbound => "Deliver Inbound Shipment",
        StockAction::ShipmentOutbound => "Deliver Outbound Shipment",
        StockAction::Adjustment => "Adjust Stock",
    }
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidArgument(message.to_string())
}

/// Lock a product for the rest of the transaction and require it to be active
pub(crate) async fn lock_active_product(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<Product> {
    let product = tx
        .lock_product(user_id, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    if !product.is_active() {
        return Err(AppError::InvalidStateTransition(format!(
            "Product '{}' is inactive",
            product.sku
        )));
    }
    Ok(product)
}

async fn require_location(
    tx: &mut dyn StoreTx,
    user_id: Uuid,
    location_id: Uuid,
) -> AppResult<StorageLocation> {
    tx.get_location(user_id, location_id)
        .await?
        .ok_or_else(|| AppError::not_found("Storage location"))
}

/// Turn a debit result into the quantity left, or the matching error
fn expect_debit(debit: Debit, requested: i64, location: &str) -> AppResult<i64> {
    match debit {
        Debit::Applied { remaining } => Ok(remaining),
        Debit::Insufficient { available } => Err(AppError::InsufficientStock { available, requested }),
        Debit::Missing => Err(AppError::NotFound(format!("Stock at location {}", location))),
    }
}

/// Orchestrates stock movements
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn LedgerStore>,
    evaluator: ReorderEvaluator,
    audit: Arc<dyn AuditSink>,
}

impl StockLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        evaluator: ReorderEvaluator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, evaluator, audit }
    }

    /// Place stock at a location, adding to what is already there
    pub async fn assign(&self, user_id: Uuid, input: StockMovementInput) -> AppResult<LedgerReceipt> {
        self.place(user_id, input, StockAction::Assign).await
    }

    /// Same effect as [`assign`](Self::assign), recorded as replenishment
    pub async fn receive(&self, user_id: Uuid, input: StockMovementInput) -> AppResult<LedgerReceipt> {
        self.place(user_id, input, StockAction::Receive).await
    }

    async fn place(
        &self,
        user_id: Uuid,
        input: StockMovementInput,
        action: StockAction,
    ) -> AppResult<LedgerReceipt> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(invalid)?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let product = lock_active_product(tx.as_mut(), user_id, input.product_id).await?;
        let location = require_location(tx.as_mut(), user_id, input.location_id).await?;

        tx.credit_stock(user_id, product.id, location.id, input.quantity, now)
            .await?;

        let movement = Movement::new(user_id, product.id, action, input.quantity)
            .to_location(location.id)
            .reference(format!(
                "{} {} units to {}",
                action.verb(),
                input.quantity,
                location.label()
            ))
            .note(input.note.as_deref());

        self.settle(tx, user_id, product, movement, now).await
    }

    /// Remove stock from one location
    pub async fn pick(&self, user_id: Uuid, input: StockMovementInput) -> AppResult<LedgerReceipt> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(invalid)?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let product = lock_active_product(tx.as_mut(), user_id, input.product_id).await?;
        let location = require_location(tx.as_mut(), user_id, input.location_id).await?;

        let debit = tx
            .debit_stock(user_id, product.id, location.id, input.quantity, now)
            .await?;
        expect_debit(debit, input.quantity, &location.label())?;

        let movement = Movement::new(user_id, product.id, StockAction::Pick, input.quantity)
            .from_location(location.id)
            .reference(format!(
                "Picked {} units from {}",
                input.quantity,
                location.label()
            ))
            .note(input.note.as_deref());

        self.settle(tx, user_id, product, movement, now).await
    }

    /// Move stock between two locations of the same product
    pub async fn transfer(&self, user_id: Uuid, input: TransferStockInput) -> AppResult<LedgerReceipt> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(invalid)?;
        validate_transfer_locations(input.from_location_id, input.to_location_id).map_err(invalid)?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let product = lock_active_product(tx.as_mut(), user_id, input.product_id).await?;
        let source = require_location(tx.as_mut(), user_id, input.from_location_id).await?;
        let destination = require_location(tx.as_mut(), user_id, input.to_location_id).await?;

        let debit = tx
            .debit_stock(user_id, product.id, source.id, input.quantity, now)
            .await?;
        expect_debit(debit, input.quantity, &source.label())?;
        tx.credit_stock(user_id, product.id, destination.id, input.quantity, now)
            .await?;

        let movement = Movement::new(user_id, product.id, StockAction::Transfer, input.quantity)
            .from_location(source.id)
            .to_location(destination.id)
            .reference(format!(
                "Transferred {} units from {} to {}",
                input.quantity,
                source.label(),
                destination.label()
            ))
            .note(input.note.as_deref());

        self.settle(tx, user_id, product, movement, now).await
    }

    /// Move unassigned stock (delivered inbound) into a location
    pub async fn put_away(&self, user_id: Uuid, input: StockMovementInput) -> AppResult<LedgerReceipt> {
        input.validate()?;
        validate_quantity(input.quantity).map_err(invalid)?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut product = lock_active_product(tx.as_mut(), user_id, input.product_id).await?;
        let location = require_location(tx.as_mut(), user_id, input.location_id).await?;

        if product.unassigned_quantity < input.quantity {
            return Err(AppError::InsufficientStock {
                available: product.unassigned_quantity,
                requested: input.quantity,
            });
        }
        product.unassigned_quantity -= input.quantity;
        tx.credit_stock(user_id, product.id, location.id, input.quantity, now)
            .await?;

        let movement = Movement::new(user_id, product.id, StockAction::Transfer, input.quantity)
            .to_location(location.id)
            .reference(format!(
                "Put away {} units to {}",
                input.quantity,
                location.label()
            ))
            .meta("source", json!("unassigned"))
            .note(input.note.as_deref());

        self.settle(tx, user_id, product, movement, now).await
    }

    /// Cycle-count correction: set a location's quantity to what was counted
    pub async fn adjust(&self, user_id: Uuid, input: AdjustStockInput) -> AppResult<LedgerReceipt> {
        input.validate()?;
        validate_counted_quantity(input.counted_quantity).map_err(invalid)?;
        let reason = shared::normalize_text(Some(&input.reason))
            .ok_or_else(|| invalid("A reason is required for stock adjustments"))?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let product = lock_active_product(tx.as_mut(), user_id, input.product_id).await?;
        let location = require_location(tx.as_mut(), user_id, input.location_id).await?;

        let previous = tx
            .get_stock(user_id, product.id, location.id)
            .await?
            .map_or(0, |s| s.quantity);
        let delta = input.counted_quantity - previous;

        let mut movement = Movement::new(user_id, product.id, StockAction::Adjustment, delta.abs())
            .reference(reason)
            .meta("previous", json!(previous))
            .meta("counted", json!(input.counted_quantity))
            .meta("delta", json!(delta));

        if delta > 0 {
            tx.credit_stock(user_id, product.id, location.id, delta, now)
                .await?;
            movement = movement.to_location(location.id);
        } else if delta < 0 {
            let debit = tx
                .debit_stock(user_id, product.id, location.id, -delta, now)
                .await?;
            expect_debit(debit, -delta, &location.label())?;
            movement = movement.from_location(location.id);
        } else {
            movement = movement.to_location(location.id);
        }

        self.settle(tx, user_id, product, movement, now).await
    }

    /// Apply the stock effect of a shipment reaching Delivered.
    ///
    /// Runs inside the shipment's transaction; the caller commits and then
    /// calls [`announce`](Self::announce).
    pub async fn apply_delivery(
        &self,
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        shipment: &Shipment,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerReceipt> {
        let mut product = lock_active_product(tx, user_id, shipment.product_id).await?;
        let quantity = shipment.quantity;

        let movement = match shipment.shipment_type {
            ShipmentType::Inbound => {
                product.unassigned_quantity =
                    add_quantities(product.unassigned_quantity, quantity).map_err(invalid)?;
                Movement::new(user_id, product.id, StockAction::ShipmentInbound, quantity)
                    .reference(format!("Inbound shipment delivered: {} units", quantity))
                    .meta("shipment_id", json!(shipment.id))
            }
            ShipmentType::Outbound => {
                let located: Vec<(Uuid, i64)> = tx
                    .list_product_stock(user_id, product.id)
                    .await?
                    .into_iter()
                    .map(|s| (s.location_id, s.quantity))
                    .collect();

                let plan = plan_outbound(product.unassigned_quantity, &located, quantity)
                    .map_err(|available| AppError::InsufficientStock { available, requested: quantity })?;

                product.unassigned_quantity -= plan.from_unassigned;
                for draw in &plan.draws {
                    let debit = tx
                        .debit_stock(user_id, product.id, draw.location_id, draw.quantity, now)
                        .await?;
                    expect_debit(debit, draw.quantity, &draw.location_id.to_string())?;
                }

                let draws: Vec<serde_json::Value> = plan
                    .draws
                    .iter()
                    .map(|d| json!({ "location_id": d.location_id, "quantity": d.quantity }))
                    .collect();

                Movement::new(user_id, product.id, StockAction::ShipmentOutbound, quantity)
                    .reference(format!("Outbound shipment delivered: {} units", quantity))
                    .meta("shipment_id", json!(shipment.id))
                    .meta("from_unassigned", json!(plan.from_unassigned))
                    .meta("draws", serde_json::Value::Array(draws))
            }
        };

        let movement = movement.note(Some(&shipment.notes));
        self.settle_in(tx, user_id, product, movement, now).await
    }

    /// Recompute a product's total from its parts and re-run reorder evaluation
    pub async fn reconcile_product(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Reconciliation> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_product(user_id, product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;

        let previous_total = product.total_quantity;
        reconcile(tx.as_mut(), &mut product, now).await?;
        let reorder = if product.is_active() {
            Some(self.evaluator.evaluate(tx.as_mut(), &product, now).await?)
        } else {
            None
        };
        tx.commit().await?;

        let result = Reconciliation { product, previous_total, reorder };
        if result.drifted() {
            tracing::warn!(
                product_id = %product_id,
                previous = previous_total,
                total = result.product.total_quantity,
                "product total drift corrected"
            );
        }
        Ok(result)
    }

    /// Record, reconcile and evaluate inside an open transaction
    async fn settle_in(
        &self,
        tx: &mut dyn StoreTx,
        user_id: Uuid,
        mut product: Product,
        movement: Movement,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerReceipt> {
        let history = MovementRecorder::record(tx, user_id, movement, now).await?;
        reconcile(tx, &mut product, now).await?;
        let reorder = self.evaluator.evaluate(tx, &product, now).await?;
        Ok(LedgerReceipt { product, history, reorder })
    }

    async fn settle(
        &self,
        mut tx: Box<dyn StoreTx>,
        user_id: Uuid,
        product: Product,
        movement: Movement,
        now: DateTime<Utc>,
    ) -> AppResult<LedgerReceipt> {
        let receipt = self
            .settle_in(tx.as_mut(), user_id, product, movement, now)
            .await?;
        tx.commit().await?;
        self.announce(user_id, &receipt);
        Ok(receipt)
    }

    /// Log and audit a committed movement
    pub fn announce(&self, user_id: Uuid, receipt: &LedgerReceipt) {
        let history = &receipt.history;
        tracing::info!(
            product_id = %receipt.product.id,
            action = %history.action,
            quantity = history.quantity,
            total = receipt.product.total_quantity,
            "stock movement committed"
        );

        self.audit.emit(ActivityEntry::new(
            user_id,
            activity_name(history.action),
            EntityKind::Product,
            receipt.product.id,
            format!("{} ({})", history.reference, receipt.product.sku),
        ));
    }
}
