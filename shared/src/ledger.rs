//! Stock ledger arithmetic
//!
//! Decrements floor at zero instead of failing: preparing more than the
//! recorded stock is allowed, and the difference shows up in the returned
//! [`StockDecrement`] and in low-stock reporting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::{StockAdjustment, StockDecrement, StockRecord};

impl StockRecord {
    /// Take `amount` out of the record, never going below zero
    pub fn decrement(&mut self, amount: Decimal, at: DateTime<Utc>) -> DomainResult<StockDecrement> {
        if amount < Decimal::ZERO {
            return Err(DomainError::invalid_quantity("amount", amount));
        }

        let before = self.quantity;
        let applied = amount.min(before);
        self.quantity = before - applied;
        self.updated_at = at;

        Ok(StockDecrement {
            store_id: self.store_id,
            product_id: self.product_id,
            requested: amount,
            applied,
            quantity_before: before,
            quantity_after: self.quantity,
        })
    }

    /// Apply a direct operator write; all values must be non-negative
    pub fn apply_adjustment(&mut self, adjustment: &StockAdjustment, at: DateTime<Utc>) -> DomainResult<()> {
        validate_stock_values(adjustment)?;

        if let Some(quantity) = adjustment.quantity {
            self.quantity = quantity;
        }
        if let Some(min_stock) = adjustment.min_stock {
            self.min_stock = min_stock;
        }
        if let Some(max_stock) = adjustment.max_stock {
            self.max_stock = max_stock;
        }
        self.updated_at = at;
        Ok(())
    }
}

pub fn validate_stock_values(adjustment: &StockAdjustment) -> DomainResult<()> {
    let fields = [
        ("quantity", adjustment.quantity),
        ("min_stock", adjustment.min_stock),
        ("max_stock", adjustment.max_stock),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if value < Decimal::ZERO {
                return Err(DomainError::invalid_quantity(field, value));
            }
        }
    }
    Ok(())
}
