//! Business logic services for the B2B Ordering Platform

pub mod consolidation;
pub mod order;
pub mod stock;

pub use consolidation::ConsolidationService;
pub use order::{OrderService, ReadyOrder};
pub use stock::StockLedger;
