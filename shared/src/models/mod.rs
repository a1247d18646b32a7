//! Domain models for the stock ledger

mod activity;
mod product;
mod purchase_order;
mod reorder;
mod shipment;
mod stock;
mod warehouse;

pub use activity::*;
pub use product::*;
pub use purchase_order::*;
pub use reorder::*;
pub use shipment::*;
pub use stock::*;
pub use warehouse::*;
