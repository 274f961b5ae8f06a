//! Shared domain core for the B2B Ordering Platform
//!
//! This crate holds the pure ordering logic shared between the backend and
//! the browser (via WASM): the order lifecycle, preparation gap
//! reconciliation, the stock ledger arithmetic and multi-store consolidation.
//! Nothing here performs I/O.

pub mod consolidation;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use consolidation::*;
pub use error::*;
pub use ledger::*;
pub use lifecycle::*;
pub use models::*;
pub use reconciliation::*;
pub use types::*;
pub use validation::*;
