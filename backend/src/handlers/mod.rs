//! HTTP handlers
//!
//! Handlers stay thin: extract the caller, build a service from state and
//! hand over. All ledger rules live in [`crate::services`].

mod activity;
mod health;
mod history;
mod ledger;
mod products;
mod purchase_orders;
mod reorder;
mod shipments;
mod warehouses;

pub use activity::*;
pub use health::*;
pub use history::*;
pub use ledger::*;
pub use products::*;
pub use purchase_orders::*;
pub use reorder::*;
pub use shipments::*;
pub use warehouses::*;

use shared::Pagination;

use crate::AppState;

/// Page request, falling back to the configured page size
pub(crate) fn page_request(state: &AppState, page: Option<u32>, per_page: Option<u32>) -> Pagination {
    Pagination::new(
        page.unwrap_or(1),
        per_page.unwrap_or(state.config.ledger.page_size),
    )
}
