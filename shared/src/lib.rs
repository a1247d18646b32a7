//! Shared types and models for the stock ledger
//!
//! This crate holds the entity models, request inputs and the pure decision
//! logic (reorder thresholds, shipment transitions, outbound draw planning)
//! used by the backend.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
