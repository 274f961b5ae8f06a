//! PostgreSQL repository
//!
//! Order lines, delivery details and history are stored as JSONB next to the
//! scalar columns; stock records are plain rows locked with `FOR UPDATE`
//! whenever they are decremented or adjusted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    DeliveryDetails, DomainError, Order, OrderFilter, OrderLineItem, OrderStatusChange, Pagination,
    Product, StockAdjustment, StockDecrement, StockDecrementRequest, StockMovement,
    StockMovementKind, StockRecord,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{OrderRepository, ProductCatalog, StockRepository};
use crate::error::{AppError, AppResult};

const ORDER_COLUMNS: &str = "id, order_number, client_id, store_id, status, lines, \
    requested_delivery_date, delivery, vat_rate, total_ht, total_ttc, reconciled, \
    stock_committed, cancellation_reason, history, version, created_at, updated_at, \
    ready_at, cancelled_at";

const STOCK_COLUMNS: &str = "store_id, product_id, quantity, min_stock, max_stock, updated_at";

/// Repository over a PostgreSQL pool
#[derive(Clone)]
pub struct PgRepository {
    db: PgPool,
}

impl PgRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    client_id: Uuid,
    store_id: Uuid,
    status: String,
    lines: Json<Vec<OrderLineItem>>,
    requested_delivery_date: Option<NaiveDate>,
    delivery: Json<DeliveryDetails>,
    vat_rate: Decimal,
    total_ht: Decimal,
    total_ttc: Decimal,
    reconciled: bool,
    stock_committed: bool,
    cancellation_reason: Option<String>,
    history: Json<Vec<OrderStatusChange>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    ready_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            client_id: row.client_id,
            store_id: row.store_id,
            status: row.status.parse().map_err(AppError::Internal)?,
            lines: row.lines.0,
            requested_delivery_date: row.requested_delivery_date,
            delivery: row.delivery.0,
            vat_rate: row.vat_rate,
            total_ht: row.total_ht,
            total_ttc: row.total_ttc,
            reconciled: row.reconciled,
            stock_committed: row.stock_committed,
            cancellation_reason: row.cancellation_reason,
            history: row.history.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            ready_at: row.ready_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StockRow {
    store_id: Uuid,
    product_id: Uuid,
    quantity: Decimal,
    min_stock: Decimal,
    max_stock: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockRecord {
    fn from(row: StockRow) -> Self {
        StockRecord::new(
            row.store_id,
            row.product_id,
            row.quantity,
            row.min_stock,
            row.max_stock,
            row.updated_at,
        )
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    store_id: Uuid,
    product_id: Uuid,
    kind: String,
    requested: Decimal,
    applied: Decimal,
    quantity_after: Decimal,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = StockMovementKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown stock movement kind: {}", row.kind)))?;
        Ok(StockMovement {
            id: row.id,
            store_id: row.store_id,
            product_id: row.product_id,
            kind,
            requested: row.requested,
            applied: row.applied,
            quantity_after: row.quantity_after,
            order_id: row.order_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    reference: String,
    name: String,
    unit: String,
    unit_price: Decimal,
    is_active: bool,
}

// ============================================================================
// Statement helpers
// ============================================================================

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    builder.push(" WHERE TRUE");
    if let Some(client_id) = filter.client_id {
        builder.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(store_id) = filter.store_id {
        builder.push(" AND store_id = ").push_bind(store_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(range) = &filter.delivery_dates {
        builder
            .push(" AND requested_delivery_date BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
    }
}

/// Compare-and-set update of every mutable order column
async fn update_order<'c, E>(executor: E, order: &Order, expected_version: i64) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = $3, lines = $4, requested_delivery_date = $5, delivery = $6,
            total_ht = $7, total_ttc = $8, reconciled = $9, stock_committed = $10,
            cancellation_reason = $11, history = $12, version = $2 + 1,
            updated_at = $13, ready_at = $14, cancelled_at = $15
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(order.id)
    .bind(expected_version)
    .bind(order.status.as_str())
    .bind(Json(&order.lines))
    .bind(order.requested_delivery_date)
    .bind(Json(&order.delivery))
    .bind(order.total_ht)
    .bind(order.total_ttc)
    .bind(order.reconciled)
    .bind(order.stock_committed)
    .bind(&order.cancellation_reason)
    .bind(Json(&order.history))
    .bind(order.updated_at)
    .bind(order.ready_at)
    .bind(order.cancelled_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn lock_stock_row(
    conn: &mut PgConnection,
    store_id: Uuid,
    product_id: Uuid,
) -> Result<Option<StockRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {} FROM stock_records WHERE store_id = $1 AND product_id = $2 FOR UPDATE",
        STOCK_COLUMNS
    ))
    .bind(store_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(StockRecord::from))
}

async fn create_stock_row_if_missing(
    conn: &mut PgConnection,
    store_id: Uuid,
    product_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_records (store_id, product_id, quantity, min_stock, max_stock, updated_at)
        VALUES ($1, $2, 0, 0, 0, $3)
        ON CONFLICT (store_id, product_id) DO NOTHING
        "#,
    )
    .bind(store_id)
    .bind(product_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_stock_row(conn: &mut PgConnection, record: &StockRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_records (store_id, product_id, quantity, min_stock, max_stock, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (store_id, product_id) DO UPDATE
        SET quantity = EXCLUDED.quantity,
            min_stock = EXCLUDED.min_stock,
            max_stock = EXCLUDED.max_stock,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.store_id)
    .bind(record.product_id)
    .bind(record.quantity)
    .bind(record.min_stock)
    .bind(record.max_stock)
    .bind(record.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_movement(conn: &mut PgConnection, movement: &StockMovement) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, store_id, product_id, kind, requested, applied,
                                     quantity_after, order_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(movement.id)
    .bind(movement.store_id)
    .bind(movement.product_id)
    .bind(movement.kind.as_str())
    .bind(movement.requested)
    .bind(movement.applied)
    .bind(movement.quantity_after)
    .bind(movement.order_id)
    .bind(movement.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lock, decrement and journal one record inside an open transaction
async fn decrement_locked(
    conn: &mut PgConnection,
    store_id: Uuid,
    product_id: Uuid,
    amount: Decimal,
    kind: StockMovementKind,
    order_id: Option<Uuid>,
) -> AppResult<StockDecrement> {
    let now = Utc::now();
    let mut record = lock_stock_row(&mut *conn, store_id, product_id)
        .await?
        .ok_or(DomainError::StockRecordNotFound { store_id, product_id })?;

    let outcome = record.decrement(amount, now)?;
    upsert_stock_row(&mut *conn, &record).await?;
    insert_movement(
        &mut *conn,
        &StockMovement::from_decrement(&outcome, kind, order_id, now),
    )
    .await?;

    Ok(outcome)
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for PgRepository {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.client_id)
        .bind(order.store_id)
        .bind(order.status.as_str())
        .bind(Json(&order.lines))
        .bind(order.requested_delivery_date)
        .bind(Json(&order.delivery))
        .bind(order.vat_rate)
        .bind(order.total_ht)
        .bind(order.total_ttc)
        .bind(order.reconciled)
        .bind(order.stock_committed)
        .bind(&order.cancellation_reason)
        .bind(Json(&order.history))
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.ready_at)
        .bind(order.cancelled_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
        push_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(pagination.per_page as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset() as i64);

        let rows: Vec<OrderRow> = query.build_query_as().fetch_all(&self.db).await?;
        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total.max(0) as u64))
    }

    async fn next_order_sequence(&self, year: i32) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO order_sequences (year, last_value) VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET last_value = order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&self.db)
        .await?;
        Ok(value)
    }

    async fn save_if_version(&self, order: &Order, expected_version: i64) -> AppResult<bool> {
        Ok(update_order(&self.db, order, expected_version).await?)
    }

    async fn save_ready_with_stock(
        &self,
        order: &Order,
        expected_version: i64,
        decrements: &[StockDecrementRequest],
    ) -> AppResult<Option<Vec<StockDecrement>>> {
        let mut tx = self.db.begin().await?;

        if !update_order(&mut *tx, order, expected_version).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        // Fixed lock order across concurrent transactions
        let mut ordered: Vec<&StockDecrementRequest> = decrements.iter().collect();
        ordered.sort_by_key(|req| (req.store_id, req.product_id));

        let mut outcomes = Vec::with_capacity(ordered.len());
        for req in ordered {
            // Dropping `tx` on error rolls the status change back too
            outcomes.push(
                decrement_locked(
                    &mut *tx,
                    req.store_id,
                    req.product_id,
                    req.amount,
                    StockMovementKind::Preparation,
                    Some(order.id),
                )
                .await?,
            );
        }

        tx.commit().await?;
        Ok(Some(outcomes))
    }
}

// ============================================================================
// Stock
// ============================================================================

#[async_trait]
impl StockRepository for PgRepository {
    async fn find_record(&self, store_id: Uuid, product_id: Uuid) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock_records WHERE store_id = $1 AND product_id = $2",
            STOCK_COLUMNS
        ))
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn list_for_store(&self, store_id: Uuid) -> AppResult<Vec<StockRecord>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock_records WHERE store_id = $1 ORDER BY product_id",
            STOCK_COLUMNS
        ))
        .bind(store_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockRecord::from).collect())
    }

    async fn list_for_stores(&self, store_ids: &[Uuid]) -> AppResult<Vec<StockRecord>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock_records WHERE store_id = ANY($1) ORDER BY product_id, store_id",
            STOCK_COLUMNS
        ))
        .bind(store_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockRecord::from).collect())
    }

    async fn decrement(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        amount: Decimal,
    ) -> AppResult<StockDecrement> {
        let mut tx = self.db.begin().await?;
        let outcome = decrement_locked(
            &mut *tx,
            store_id,
            product_id,
            amount,
            StockMovementKind::ManualDecrement,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn adjust(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        adjustment: &StockAdjustment,
    ) -> AppResult<StockRecord> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // Concurrent first adjustments must serialize on the same row
        create_stock_row_if_missing(&mut *tx, store_id, product_id, now).await?;
        let mut record = lock_stock_row(&mut *tx, store_id, product_id)
            .await?
            .ok_or(DomainError::StockRecordNotFound { store_id, product_id })?;
        let before = record.quantity;
        record.apply_adjustment(adjustment, now)?;

        upsert_stock_row(&mut *tx, &record).await?;
        insert_movement(&mut *tx, &StockMovement::from_adjustment(before, &record)).await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn list_movements(&self, store_id: Uuid, limit: usize) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, store_id, product_id, kind, requested, applied, quantity_after,
                   order_id, created_at
            FROM stock_movements
            WHERE store_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(store_id)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl ProductCatalog for PgRepository {
    async fn find_products(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, reference, name, unit, unit_price, is_active FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    Product {
                        id: row.id,
                        reference: row.reference,
                        name: row.name,
                        unit: row.unit,
                        unit_price: row.unit_price,
                        is_active: row.is_active,
                    },
                )
            })
            .collect())
    }
}
