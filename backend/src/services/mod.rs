//! Ledger services
//!
//! Services own no connections of their own: each call opens one store
//! transaction and commits it before returning.

pub mod activity;
pub mod audit;
pub mod history;
pub mod ledger;
pub mod product;
pub mod purchase_order;
pub mod reconciler;
pub mod reorder;
pub mod shipment;
pub mod warehouse;

pub use activity::ActivityService;
pub use audit::{AuditSink, MemoryAuditSink, NullAuditSink, PgAuditSink, TracingAuditSink};
pub use history::{HistoryService, Movement, MovementRecorder};
pub use ledger::{LedgerReceipt, Reconciliation, StockLedger};
pub use product::ProductService;
pub use purchase_order::PurchaseOrderService;
pub use reorder::{ReorderEvaluator, ReorderService, SuggestionScope};
pub use shipment::ShipmentService;
pub use warehouse::WarehouseService;
