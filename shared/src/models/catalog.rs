//! Product catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product of the shared supplier catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    /// Supplier reference code
    pub reference: String,
    pub name: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub is_active: bool,
}
