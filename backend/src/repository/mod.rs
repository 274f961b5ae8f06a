//! Persistence boundary for orders, store stock and the product catalog
//!
//! Services only talk to these traits. Two implementations ship with the
//! server: [`PgRepository`] for PostgreSQL and [`InMemoryRepository`] for
//! development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    Order, OrderFilter, Pagination, Product, StockAdjustment, StockDecrement,
    StockDecrementRequest, StockMovement, StockRecord,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

/// Order storage with optimistic concurrency on `Order::version`
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> AppResult<()>;

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Page of matching orders, newest first, with the total match count
    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)>;

    /// Next value of the per-year order number sequence, starting at 1
    async fn next_order_sequence(&self, year: i32) -> AppResult<i64>;

    /// Store `order` only if the stored version still equals
    /// `expected_version`. The stored copy gets `expected_version + 1`.
    ///
    /// Returns `false` when another writer got there first.
    async fn save_if_version(&self, order: &Order, expected_version: i64) -> AppResult<bool>;

    /// Store a ready order together with its stock decrements as one unit.
    ///
    /// Returns `None` when the version check fails; nothing is written in
    /// that case. A missing stock record aborts the whole unit with
    /// `DomainError::StockRecordNotFound`.
    async fn save_ready_with_stock(
        &self,
        order: &Order,
        expected_version: i64,
        decrements: &[StockDecrementRequest],
    ) -> AppResult<Option<Vec<StockDecrement>>>;
}

/// Per-store stock records and their movement journal
#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn find_record(&self, store_id: Uuid, product_id: Uuid) -> AppResult<Option<StockRecord>>;

    async fn list_for_store(&self, store_id: Uuid) -> AppResult<Vec<StockRecord>>;

    async fn list_for_stores(&self, store_ids: &[Uuid]) -> AppResult<Vec<StockRecord>>;

    /// Atomic floor-at-zero decrement of one record
    async fn decrement(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
    ) -> AppResult<StockDecrement>;

    /// Create or update a record from an operator write
    async fn adjust(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        adjustment: &StockAdjustment,
    ) -> AppResult<StockRecord>;

    /// Journal entries of a store, newest first
    async fn list_movements(&self, store_id: Uuid, limit: usize) -> AppResult<Vec<StockMovement>>;
}

/// Read access to the product catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>>;
}
