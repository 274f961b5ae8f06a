//! Process-local repository backed by a single async mutex

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    DomainError, Order, OrderFilter, Pagination, Product, StockAdjustment, StockDecrement,
    StockDecrementRequest, StockMovement, StockMovementKind, StockRecord,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderRepository, ProductCatalog, StockRepository};
use crate::error::AppResult;

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    /// Keyed by (store_id, product_id)
    stock: BTreeMap<(Uuid, Uuid), StockRecord>,
    movements: Vec<StockMovement>,
    sequences: HashMap<i32, i64>,
    products: HashMap<Uuid, Product>,
}

impl Inner {
    fn apply_decrement(
        &mut self,
        store_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
        kind: StockMovementKind,
        order_id: Option<Uuid>,
    ) -> AppResult<StockDecrement> {
        let now = Utc::now();
        let record = self
            .stock
            .get_mut(&(store_id, product_id))
            .ok_or(DomainError::StockRecordNotFound { store_id, product_id })?;
        let outcome = record.decrement(amount, now)?;
        self.movements
            .push(StockMovement::from_decrement(&outcome, kind, order_id, now));
        Ok(outcome)
    }
}

/// All state lives behind one lock, so every trait call is atomic with
/// respect to every other.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a stock record without journaling it
    pub async fn put_stock_record(&self, record: StockRecord) {
        let mut inner = self.inner.lock().await;
        inner
            .stock
            .insert((record.store_id, record.product_id), record);
    }

    pub async fn put_product(&self, product: Product) {
        let mut inner = self.inner.lock().await;
        inner.products.insert(product.id, product);
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepository {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).cloned())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<&Order> = inner
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.per_page as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn next_order_sequence(&self, year: i32) -> AppResult<i64> {
        let mut inner = self.inner.lock().await;
        let value = inner.sequences.entry(year).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn save_if_version(&self, order: &Order, expected_version: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.orders.get_mut(&order.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = Order {
                    version: expected_version + 1,
                    ..order.clone()
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_ready_with_stock(
        &self,
        order: &Order,
        expected_version: i64,
        decrements: &[StockDecrementRequest],
    ) -> AppResult<Option<Vec<StockDecrement>>> {
        let mut inner = self.inner.lock().await;

        let current = inner.orders.get(&order.id).map(|stored| stored.version);
        if current != Some(expected_version) {
            return Ok(None);
        }

        // Check every record before touching any so a miss leaves no trace
        if let Some(missing) = decrements
            .iter()
            .find(|req| !inner.stock.contains_key(&(req.store_id, req.product_id)))
        {
            return Err(DomainError::StockRecordNotFound {
                store_id: missing.store_id,
                product_id: missing.product_id,
            }
            .into());
        }

        let mut outcomes = Vec::with_capacity(decrements.len());
        for req in decrements {
            outcomes.push(inner.apply_decrement(
                req.store_id,
                req.product_id,
                req.amount,
                StockMovementKind::Preparation,
                Some(order.id),
            )?);
        }

        inner.orders.insert(
            order.id,
            Order {
                version: expected_version + 1,
                ..order.clone()
            },
        );
        Ok(Some(outcomes))
    }
}

#[async_trait]
impl StockRepository for InMemoryRepository {
    async fn find_record(&self, store_id: Uuid, product_id: Uuid) -> AppResult<Option<StockRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.stock.get(&(store_id, product_id)).cloned())
    }

    async fn list_for_store(&self, store_id: Uuid) -> AppResult<Vec<StockRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .stock
            .values()
            .filter(|record| record.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn list_for_stores(&self, store_ids: &[Uuid]) -> AppResult<Vec<StockRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .stock
            .values()
            .filter(|record| store_ids.contains(&record.store_id))
            .cloned()
            .collect())
    }

    async fn decrement(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
    ) -> AppResult<StockDecrement> {
        let mut inner = self.inner.lock().await;
        inner.apply_decrement(
            store_id,
            product_id,
            amount,
            StockMovementKind::ManualDecrement,
            None,
        )
    }

    async fn adjust(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        adjustment: &StockAdjustment,
    ) -> AppResult<StockRecord> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let mut record = inner
            .stock
            .get(&(store_id, product_id))
            .cloned()
            .unwrap_or_else(|| {
                StockRecord::new(store_id, product_id, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, now)
            });
        let before = record.quantity;
        record.apply_adjustment(adjustment, now)?;

        inner
            .movements
            .push(StockMovement::from_adjustment(before, &record));
        inner.stock.insert((store_id, product_id), record.clone());
        Ok(record)
    }

    async fn list_movements(&self, store_id: Uuid, limit: usize) -> AppResult<Vec<StockMovement>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .movements
            .iter()
            .rev()
            .filter(|movement| movement.store_id == store_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryRepository {
    async fn find_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
        let inner = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).map(|product| (*id, product.clone())))
            .collect())
    }
}
