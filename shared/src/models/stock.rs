//! Store stock models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantity of one product held at one store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockRecord {
    pub store_id: Uuid,
    pub product_id: Uuid,
    /// Never negative
    pub quantity: Decimal,
    pub min_stock: Decimal,
    /// Advisory only, used for fill-level display
    pub max_stock: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn new(
        store_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        min_stock: Decimal,
        max_stock: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store_id,
            product_id,
            quantity,
            min_stock,
            max_stock,
            updated_at,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity.is_zero()
    }
}

/// A request to take a quantity out of one store's stock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockDecrementRequest {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub amount: Decimal,
}

/// Outcome of a floor-at-zero decrement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockDecrement {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub requested: Decimal,
    /// `min(requested, quantity_before)`
    pub applied: Decimal,
    pub quantity_before: Decimal,
    pub quantity_after: Decimal,
}

impl StockDecrement {
    /// Part of the request that could not be taken from stock
    pub fn shortfall(&self) -> Decimal {
        self.requested - self.applied
    }

    pub fn was_floored(&self) -> bool {
        self.applied < self.requested
    }
}

/// Direct operator write to a stock record; unset fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StockAdjustment {
    pub quantity: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub max_stock: Option<Decimal>,
}

/// Kinds of entries in the stock movement journal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    /// Taken out when an order was marked ready
    Preparation,
    ManualDecrement,
    Adjustment,
}

impl StockMovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovementKind::Preparation => "preparation",
            StockMovementKind::ManualDecrement => "manual_decrement",
            StockMovementKind::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preparation" => Some(StockMovementKind::Preparation),
            "manual_decrement" => Some(StockMovementKind::ManualDecrement),
            "adjustment" => Some(StockMovementKind::Adjustment),
            _ => None,
        }
    }
}

/// Journal entry recording a change to a stock record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub kind: StockMovementKind,
    /// Signed change requested by the caller (negative for decrements)
    pub requested: Decimal,
    /// Signed change actually applied
    pub applied: Decimal,
    pub quantity_after: Decimal,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn from_decrement(
        decrement: &StockDecrement,
        kind: StockMovementKind,
        order_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id: decrement.store_id,
            product_id: decrement.product_id,
            kind,
            requested: -decrement.requested,
            applied: -decrement.applied,
            quantity_after: decrement.quantity_after,
            order_id,
            created_at,
        }
    }

    pub fn from_adjustment(before: Decimal, record: &StockRecord) -> Self {
        let delta = record.quantity - before;
        Self {
            id: Uuid::new_v4(),
            store_id: record.store_id,
            product_id: record.product_id,
            kind: StockMovementKind::Adjustment,
            requested: delta,
            applied: delta,
            quantity_after: record.quantity,
            order_id: None,
            created_at: record.updated_at,
        }
    }
}

/// Per-product rollup of stock across a set of stores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolidatedStockEntry {
    pub product_id: Uuid,
    /// Filled from the catalog when available; display only
    pub product_name: Option<String>,
    pub total_quantity: Decimal,
    pub average_quantity: Decimal,
    pub min_quantity: Decimal,
    pub max_quantity: Decimal,
    pub store_count: usize,
    pub low_stock_store_count: usize,
    /// Drill-down rows, sorted by store id
    pub stores: Vec<StoreStockDetail>,
}

/// Per-store drill-down row of a consolidated entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStockDetail {
    pub store_id: Uuid,
    pub quantity: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Decimal,
    pub is_low_stock: bool,
}

impl From<&StockRecord> for StoreStockDetail {
    fn from(record: &StockRecord) -> Self {
        Self {
            store_id: record.store_id,
            quantity: record.quantity,
            min_stock: record.min_stock,
            max_stock: record.max_stock,
            is_low_stock: record.is_low_stock(),
        }
    }
}
