//! Stock ledger service for per-store product quantities

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    low_stock_records, validate_stock_values, DomainError, StockAdjustment, StockDecrement,
    StockMovement, StockRecord,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::StockRepository;

/// Default page size for the movement journal
pub const DEFAULT_MOVEMENT_LIMIT: usize = 100;

/// Stock ledger: reads, floor-at-zero decrements and operator adjustments
#[derive(Clone)]
pub struct StockLedger {
    repo: Arc<dyn StockRepository>,
}

impl StockLedger {
    /// Create a new StockLedger instance
    pub fn new(repo: Arc<dyn StockRepository>) -> Self {
        Self { repo }
    }

    /// Current record for a (store, product) pair
    pub async fn get_stock(&self, store_id: Uuid, product_id: Uuid) -> AppResult<StockRecord> {
        debug!(store_id = %store_id, product_id = %product_id, "Loading stock record");
        self.repo
            .find_record(store_id, product_id)
            .await?
            .ok_or_else(|| DomainError::StockRecordNotFound { store_id, product_id }.into())
    }

    pub async fn list_store_stock(&self, store_id: Uuid) -> AppResult<Vec<StockRecord>> {
        self.repo.list_for_store(store_id).await
    }

    /// Take `amount` out of a record; the quantity never drops below zero
    pub async fn decrement_stock(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
    ) -> AppResult<StockDecrement> {
        if amount < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "amount".to_string(),
                message: "Decrement amount cannot be negative".to_string(),
                message_fr: "La quantité à retirer ne peut pas être négative".to_string(),
            });
        }

        let outcome = self.repo.decrement(store_id, product_id, amount).await?;

        if outcome.was_floored() {
            warn!(
                store_id = %store_id,
                product_id = %product_id,
                requested = %outcome.requested,
                applied = %outcome.applied,
                "Stock decrement floored at zero"
            );
        } else {
            info!(
                store_id = %store_id,
                product_id = %product_id,
                applied = %outcome.applied,
                quantity = %outcome.quantity_after,
                "Stock decremented"
            );
        }
        Ok(outcome)
    }

    /// Operator write: create or update a record
    pub async fn adjust_stock(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        adjustment: StockAdjustment,
    ) -> AppResult<StockRecord> {
        validate_stock_values(&adjustment)?;

        let record = self.repo.adjust(store_id, product_id, &adjustment).await?;

        info!(
            store_id = %store_id,
            product_id = %product_id,
            quantity = %record.quantity,
            min_stock = %record.min_stock,
            "Stock adjusted"
        );
        Ok(record)
    }

    /// Records at or below their minimum across the given stores
    pub async fn list_low_stock(&self, store_ids: &[Uuid]) -> AppResult<Vec<StockRecord>> {
        if store_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = self.repo.list_for_stores(store_ids).await?;
        Ok(low_stock_records(&records))
    }

    pub async fn list_movements(&self, store_id: Uuid, limit: Option<usize>) -> AppResult<Vec<StockMovement>> {
        let limit = limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT).clamp(1, 1000);
        self.repo.list_movements(store_id, limit).await
    }
}
