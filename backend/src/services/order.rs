//! Order service: lifecycle transitions with optimistic concurrency
//!
//! Every mutation loads the order, applies the domain operation to a copy
//! and stores it with a compare-and-set on `version`. A lost race reloads
//! and re-applies, so a repeated action from a concurrent caller fails its
//! transition check instead of being applied twice.

use std::sync::Arc;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    format_order_number, ActionContext, DeliveryConfirmation, DomainResult, NewOrder, NewOrderLine,
    Order, OrderAction, OrderFilter, OrderStatusChange, PaginatedResponse, Pagination, PaginationMeta,
    PreparedQuantity, StockDecrement,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::OrderRepository;

/// Attempts per operation before a version conflict is reported
const MAX_ATTEMPTS: usize = 3;

/// Result of marking an order ready
#[derive(Debug, Clone, Serialize)]
pub struct ReadyOrder {
    pub order: Order,
    /// Stock taken from the order's store, one entry per prepared line
    pub stock: Vec<StockDecrement>,
}

/// Order lifecycle service
#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    vat_rate: Decimal,
    number_prefix: String,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(repo: Arc<dyn OrderRepository>, vat_rate: Decimal, number_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            vat_rate,
            number_prefix: number_prefix.into(),
        }
    }

    /// Create a draft order with the next number of the current year
    pub async fn create_order(&self, input: NewOrder, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);

        // Validate before allocating a number so rejected input leaves no hole
        let mut order = Order::create(Uuid::new_v4(), String::new(), input, self.vat_rate, ctx)?;

        let year = ctx.at.year();
        let sequence = self.repo.next_order_sequence(year).await?;
        order.order_number = format_order_number(&self.number_prefix, year, sequence);

        self.repo.insert_order(&order).await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            lines = order.lines.len(),
            "Order created"
        );
        Ok(order)
    }

    /// Get an order by id
    pub async fn get_order(&self, id: Uuid) -> AppResult<Order> {
        debug!(order_id = %id, "Loading order");
        self.repo
            .find_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        let (data, total) = self.repo.list_orders(filter, pagination).await?;
        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(pagination, total),
        })
    }

    /// Status changes of an order, oldest first
    pub async fn order_history(&self, id: Uuid) -> AppResult<Vec<OrderStatusChange>> {
        Ok(self.get_order(id).await?.history)
    }

    pub async fn update_order_lines(
        &self,
        id: Uuid,
        lines: Vec<NewOrderLine>,
        actor_id: Uuid,
    ) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::EditLines, |order| order.replace_lines(lines.clone(), ctx))
            .await
    }

    pub async fn submit(&self, id: Uuid, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::Submit, |order| order.submit(ctx)).await
    }

    pub async fn confirm(&self, id: Uuid, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::Confirm, |order| order.confirm(ctx)).await
    }

    pub async fn cancel(&self, id: Uuid, reason: Option<String>, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::Cancel, |order| order.cancel(reason.clone(), ctx))
            .await
    }

    pub async fn start_preparation(&self, id: Uuid, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::StartPreparation, |order| order.start_preparation(ctx))
            .await
    }

    /// Record prepared quantities; stock is untouched until the order is ready
    pub async fn adjust_prepared_quantities(
        &self,
        id: Uuid,
        updates: &[PreparedQuantity],
        actor_id: Uuid,
    ) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        let order = self
            .apply(id, OrderAction::AdjustPreparedQuantities, |order| {
                order.adjust_prepared_quantities(updates, ctx)
            })
            .await?;

        debug!(
            order_id = %id,
            lines_with_gap = order.lines_with_gap().count(),
            total_gap = %order.total_gap(),
            "Prepared quantities recorded"
        );
        Ok(order)
    }

    /// Move the order to ready and take its prepared quantities out of the
    /// store's stock, as one atomic unit.
    pub async fn mark_ready(&self, id: Uuid, actor_id: Uuid) -> AppResult<ReadyOrder> {
        let ctx = ActionContext::now(actor_id);

        for attempt in 1..=MAX_ATTEMPTS {
            let mut order = self.get_order(id).await?;
            let expected = order.version;
            let requests = order.mark_ready(ctx)?;

            let Some(stock) = self
                .repo
                .save_ready_with_stock(&order, expected, &requests)
                .await?
            else {
                debug!(order_id = %id, attempt, "Version conflict on mark_ready, retrying");
                continue;
            };

            order.version = expected + 1;
            for decrement in stock.iter().filter(|d| d.was_floored()) {
                warn!(
                    order_id = %id,
                    store_id = %decrement.store_id,
                    product_id = %decrement.product_id,
                    requested = %decrement.requested,
                    applied = %decrement.applied,
                    shortfall = %decrement.shortfall(),
                    "Prepared more than recorded stock, floored at zero"
                );
            }
            info!(
                order_id = %id,
                order_number = %order.order_number,
                decrements = stock.len(),
                "Order ready"
            );
            return Ok(ReadyOrder { order, stock });
        }

        Err(AppError::concurrent_update("Order"))
    }

    pub async fn start_delivery(&self, id: Uuid, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::StartDelivery, |order| order.start_delivery(ctx))
            .await
    }

    pub async fn cancel_delivery(&self, id: Uuid, actor_id: Uuid) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::CancelDelivery, |order| order.cancel_delivery(ctx))
            .await
    }

    pub async fn complete_delivery(
        &self,
        id: Uuid,
        confirmation: DeliveryConfirmation,
        actor_id: Uuid,
    ) -> AppResult<Order> {
        let ctx = ActionContext::now(actor_id);
        self.apply(id, OrderAction::CompleteDelivery, |order| {
            order.complete_delivery(confirmation.clone(), ctx)
        })
        .await
    }

    /// Load, mutate and compare-and-set, retrying on lost races
    async fn apply<F>(&self, id: Uuid, action: OrderAction, mut op: F) -> AppResult<Order>
    where
        F: FnMut(&mut Order) -> DomainResult<()> + Send,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut order = self.get_order(id).await?;
            let expected = order.version;
            let from = order.status;

            op(&mut order)?;
            if order.history.last().map(|change| change.action) != Some(action) {
                return Err(AppError::Internal(format!(
                    "order {} was not updated by {}",
                    id, action
                )));
            }

            if self.repo.save_if_version(&order, expected).await? {
                order.version = expected + 1;
                info!(
                    order_id = %id,
                    action = %action,
                    from = %from,
                    to = %order.status,
                    "Order updated"
                );
                return Ok(order);
            }

            debug!(order_id = %id, action = %action, attempt, "Version conflict, retrying");
        }

        Err(AppError::concurrent_update("Order"))
    }
}
