//! Quantity reconciler
//!
//! A product's on-hand total is always recomputed from its parts, never
//! patched: the sum of its stock rows plus its unassigned quantity.

use chrono::{DateTime, Utc};
use shared::Product;

use crate::error::{AppError, AppResult};
use crate::store::StoreTx;

/// Recompute `product.total_quantity`, persist the product and return the total.
///
/// Writes the whole product row, so unassigned-quantity changes made by the
/// caller are saved in the same step.
pub async fn reconcile(
    tx: &mut dyn StoreTx,
    product: &mut Product,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    let located = tx.sum_product_stock(product.owner_id, product.id).await?;
    if located < 0 || product.unassigned_quantity < 0 {
        return Err(AppError::Internal(format!(
            "negative stock for product {}: located {}, unassigned {}",
            product.id, located, product.unassigned_quantity
        )));
    }

    let total = shared::add_quantities(located, product.unassigned_quantity)
        .map_err(|e| AppError::InvalidArgument(e.to_string()))?;

    if product.total_quantity != total {
        tracing::debug!(
            product_id = %product.id,
            cached = product.total_quantity,
            computed = total,
            "product total corrected"
        );
    }

    product.total_quantity = total;
    product.updated_at = now;
    tx.update_product(product).await?;
    Ok(total)
}
