//! Shipment lifecycle
//!
//! The move into Delivered and its stock effect share one transaction, and
//! the shipment row stays locked throughout, so a delivery is applied once.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    ActivityEntry, CreateShipmentInput, EntityKind, OperationOutcome, PaginatedResponse,
    Pagination, Shipment, ShipmentFilter, ShipmentStatus, ShipmentType, UpdateShipmentStatusInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::audit::AuditSink;
use crate::services::ledger::{LedgerReceipt, StockLedger};
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn LedgerStore>,
    ledger: StockLedger,
    audit: Arc<dyn AuditSink>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn LedgerStore>, ledger: StockLedger, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, ledger, audit }
    }

    pub async fn create(&self, user_id: Uuid, input: CreateShipmentInput) -> AppResult<Shipment> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .get_product(user_id, input.product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;

        if !product.is_active() {
            return Err(AppError::InvalidStateTransition(format!(
                "Product '{}' is inactive",
                product.sku
            )));
        }
        if input.shipment_type == ShipmentType::Outbound && product.total_quantity < input.quantity {
            return Err(AppError::InsufficientStock {
                available: product.total_quantity,
                requested: input.quantity,
            });
        }

        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4(),
            owner_id: user_id,
            shipment_type: input.shipment_type,
            product_id: product.id,
            quantity: input.quantity,
            status: ShipmentStatus::Pending,
            handled_by: user_id,
            notes: shared::normalize_text(input.notes.as_deref()).unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        tx.insert_shipment(&shipment).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Create Shipment",
            EntityKind::Shipment,
            shipment.id,
            format!(
                "Created {} shipment of {} units for {}",
                shipment.shipment_type.as_str(),
                shipment.quantity,
                product.sku
            ),
        ));

        Ok(shipment)
    }

    pub async fn get(&self, user_id: Uuid, shipment_id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.store.begin().await?;
        tx.get_shipment(user_id, shipment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shipment"))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ShipmentFilter,
        page: &Pagination,
    ) -> AppResult<PaginatedResponse<Shipment>> {
        let mut tx = self.store.begin().await?;
        let (rows, total) = tx.list_shipments(user_id, filter, page).await?;
        Ok(PaginatedResponse::new(rows, page, total))
    }

    /// Advance the shipment. Reaching Delivered applies the stock effect.
    pub async fn update_status(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
        input: UpdateShipmentStatusInput,
    ) -> AppResult<(Shipment, Option<LedgerReceipt>)> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut shipment = tx
            .lock_shipment(user_id, shipment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shipment"))?;

        let previous = shipment.status;
        shipment.status = previous.transition(input.status)?;
        shipment.handled_by = user_id;
        shipment.updated_at = now;

        let receipt = if shipment.status == ShipmentStatus::Delivered {
            Some(
                self.ledger
                    .apply_delivery(tx.as_mut(), user_id, &shipment, now)
                    .await?,
            )
        } else {
            None
        };

        tx.update_shipment(&shipment).await?;
        tx.commit().await?;

        if let Some(receipt) = &receipt {
            self.ledger.announce(user_id, receipt);
        }
        self.audit.emit(ActivityEntry::new(
            user_id,
            "Update Shipment",
            EntityKind::Shipment,
            shipment.id,
            format!("Shipment moved from {} to {}", previous, shipment.status),
        ));

        Ok((shipment, receipt))
    }

    /// Delete a shipment that has not been delivered
    pub async fn delete(&self, user_id: Uuid, shipment_id: Uuid) -> AppResult<OperationOutcome> {
        let mut tx = self.store.begin().await?;
        let shipment = tx
            .lock_shipment(user_id, shipment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shipment"))?;

        if shipment.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(
                "Delivered shipments cannot be deleted".to_string(),
            ));
        }

        tx.delete_shipment(user_id, shipment_id).await?;
        tx.commit().await?;

        self.audit.emit(ActivityEntry::new(
            user_id,
            "Delete Shipment",
            EntityKind::Shipment,
            shipment.id,
            format!("Deleted {} shipment", shipment.shipment_type.as_str()),
        ));

        Ok(OperationOutcome::new("Shipment deleted").with(EntityKind::Shipment, shipment.id))
    }
}
