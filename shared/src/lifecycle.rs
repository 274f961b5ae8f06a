//! Order lifecycle state machine
//!
//! ```text
//! draft ──submit──▶ sent ──confirm──▶ confirmed ──start_preparation──▶ in_preparation
//!   │                │                    │                              │  ▲
//!   └─────cancel─────┴───────cancel───────┘                 adjust ──────┘  │
//!          ▼                                                     mark_ready │
//!      cancelled                                                         ▼  │
//!                           delivered ◀──complete── in_delivery ◀──start── ready
//!                                                        └────cancel_delivery──▶ ready
//! ```
//!
//! All legality lives in [`OrderAction::sources`] / [`OrderAction::target`].
//! The `Order` methods below validate first and mutate last, so a failed
//! call leaves the order exactly as it was.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{
    compute_totals, ActorRole, DeliveryConfirmation, DeliveryDetails, NewOrder, NewOrderLine, Order,
    OrderLineItem, OrderStatus, OrderStatusChange, StockDecrementRequest,
};
use crate::reconciliation::{reconcile, PreparedQuantity};

/// Actions that move an order through its lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Create,
    Submit,
    Confirm,
    Cancel,
    StartPreparation,
    AdjustPreparedQuantities,
    MarkReady,
    StartDelivery,
    CancelDelivery,
    CompleteDelivery,
    /// Client edit of the requested lines
    EditLines,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Create => "create",
            OrderAction::Submit => "submit",
            OrderAction::Confirm => "confirm",
            OrderAction::Cancel => "cancel",
            OrderAction::StartPreparation => "start_preparation",
            OrderAction::AdjustPreparedQuantities => "adjust_prepared_quantities",
            OrderAction::MarkReady => "mark_ready",
            OrderAction::StartDelivery => "start_delivery",
            OrderAction::CancelDelivery => "cancel_delivery",
            OrderAction::CompleteDelivery => "complete_delivery",
            OrderAction::EditLines => "edit_lines",
        }
    }

    /// Statuses from which the action may be applied
    pub fn sources(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            OrderAction::Create => &[],
            OrderAction::Submit => &[Draft],
            OrderAction::Confirm => &[Sent],
            OrderAction::Cancel => &[Draft, Sent, Confirmed],
            OrderAction::StartPreparation => &[Confirmed],
            OrderAction::AdjustPreparedQuantities => &[InPreparation],
            OrderAction::MarkReady => &[InPreparation],
            OrderAction::StartDelivery => &[Ready],
            OrderAction::CancelDelivery => &[InDelivery],
            OrderAction::CompleteDelivery => &[InDelivery],
            OrderAction::EditLines => &[Draft, Sent],
        }
    }

    /// Status the action leads to; `None` keeps the current status
    pub fn target(&self) -> Option<OrderStatus> {
        match self {
            OrderAction::Create => Some(OrderStatus::Draft),
            OrderAction::Submit => Some(OrderStatus::Sent),
            OrderAction::Confirm => Some(OrderStatus::Confirmed),
            OrderAction::Cancel => Some(OrderStatus::Cancelled),
            OrderAction::StartPreparation => Some(OrderStatus::InPreparation),
            OrderAction::AdjustPreparedQuantities => None,
            OrderAction::MarkReady => Some(OrderStatus::Ready),
            OrderAction::StartDelivery => Some(OrderStatus::InDelivery),
            OrderAction::CancelDelivery => Some(OrderStatus::Ready),
            OrderAction::CompleteDelivery => Some(OrderStatus::Delivered),
            OrderAction::EditLines => None,
        }
    }

    /// Roles the action is intended for. Admin is allowed everything.
    pub fn actors(&self) -> &'static [ActorRole] {
        use ActorRole::*;
        match self {
            OrderAction::Create | OrderAction::Submit | OrderAction::EditLines => &[Client],
            OrderAction::Cancel => &[Client, Store],
            OrderAction::Confirm
            | OrderAction::StartPreparation
            | OrderAction::AdjustPreparedQuantities
            | OrderAction::MarkReady => &[Store],
            OrderAction::StartDelivery
            | OrderAction::CancelDelivery
            | OrderAction::CompleteDelivery => &[Delivery],
        }
    }

    pub fn permits(&self, role: ActorRole) -> bool {
        role == ActorRole::Admin || self.actors().contains(&role)
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the status `action` leads to from `current`.
///
/// Repeating an already-applied action is rejected like any other illegal
/// source status.
pub fn transition(current: OrderStatus, action: OrderAction) -> DomainResult<OrderStatus> {
    if action.sources().contains(&current) {
        return Ok(action.target().unwrap_or(current));
    }

    if action == OrderAction::Cancel && current.is_preparation_or_later() {
        return Err(DomainError::CannotCancelAfterPreparation { current });
    }

    Err(DomainError::InvalidTransition {
        current,
        requested: action.target().unwrap_or(current),
        action,
    })
}

/// Who performs an action, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
}

impl ActionContext {
    pub fn new(actor_id: Uuid, at: DateTime<Utc>) -> Self {
        Self { actor_id, at }
    }

    pub fn now(actor_id: Uuid) -> Self {
        Self::new(actor_id, Utc::now())
    }
}

fn validate_lines(lines: &[NewOrderLine]) -> DomainResult<()> {
    let mut seen = std::collections::HashSet::with_capacity(lines.len());
    for line in lines {
        if line.ordered_quantity < Decimal::ZERO {
            return Err(DomainError::invalid_quantity("ordered_quantity", line.ordered_quantity));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(DomainError::invalid_quantity("unit_price", line.unit_price));
        }
        if !seen.insert(line.product_id) {
            return Err(DomainError::DuplicateProduct {
                product_id: line.product_id,
            });
        }
    }
    Ok(())
}

impl Order {
    /// Build a new draft order
    pub fn create(
        id: Uuid,
        order_number: String,
        input: NewOrder,
        vat_rate: Decimal,
        ctx: ActionContext,
    ) -> DomainResult<Order> {
        validate_lines(&input.lines)?;

        let lines: Vec<OrderLineItem> = input.lines.into_iter().map(Into::into).collect();
        let totals = compute_totals(&lines, vat_rate)?;

        Ok(Order {
            id,
            order_number,
            client_id: input.client_id,
            store_id: input.store_id,
            status: OrderStatus::Draft,
            lines,
            requested_delivery_date: input.requested_delivery_date,
            delivery: DeliveryDetails {
                address: input.delivery_address,
                ..Default::default()
            },
            vat_rate,
            total_ht: totals.total_ht,
            total_ttc: totals.total_ttc,
            reconciled: false,
            stock_committed: false,
            cancellation_reason: None,
            history: vec![OrderStatusChange {
                from: None,
                to: OrderStatus::Draft,
                action: OrderAction::Create,
                actor_id: ctx.actor_id,
                at: ctx.at,
            }],
            version: 0,
            created_at: ctx.at,
            updated_at: ctx.at,
            ready_at: None,
            cancelled_at: None,
        })
    }

    /// True if at least one line asks for a positive quantity
    pub fn has_orderable_line(&self) -> bool {
        self.lines
            .iter()
            .any(|line| line.ordered_quantity > Decimal::ZERO)
    }

    pub fn total_gap(&self) -> Decimal {
        self.lines
            .iter()
            .map(OrderLineItem::gap_or_zero)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    pub fn lines_with_gap(&self) -> impl Iterator<Item = &OrderLineItem> {
        self.lines.iter().filter(|line| line.has_gap())
    }

    fn record(&mut self, action: OrderAction, to: OrderStatus, ctx: ActionContext) {
        self.history.push(OrderStatusChange {
            from: Some(self.status),
            to,
            action,
            actor_id: ctx.actor_id,
            at: ctx.at,
        });
        self.status = to;
        self.updated_at = ctx.at;
    }

    /// Swap in new lines with their totals; leaves the order as it was if
    /// the totals cannot be represented.
    fn set_lines(&mut self, lines: Vec<OrderLineItem>) -> DomainResult<()> {
        let totals = compute_totals(&lines, self.vat_rate)?;
        self.lines = lines;
        self.total_ht = totals.total_ht;
        self.total_ttc = totals.total_ttc;
        Ok(())
    }

    /// Replace the requested lines (client edit while draft or sent)
    pub fn replace_lines(&mut self, lines: Vec<NewOrderLine>, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::EditLines)?;
        validate_lines(&lines)?;

        self.set_lines(lines.into_iter().map(Into::into).collect())?;
        self.record(OrderAction::EditLines, next, ctx);
        Ok(())
    }

    pub fn submit(&mut self, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::Submit)?;
        self.record(OrderAction::Submit, next, ctx);
        Ok(())
    }

    pub fn confirm(&mut self, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::Confirm)?;
        if !self.has_orderable_line() {
            return Err(DomainError::EmptyOrder);
        }
        self.record(OrderAction::Confirm, next, ctx);
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::Cancel)?;
        self.cancellation_reason = reason;
        self.cancelled_at = Some(ctx.at);
        self.record(OrderAction::Cancel, next, ctx);
        Ok(())
    }

    pub fn start_preparation(&mut self, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::StartPreparation)?;
        for line in &mut self.lines {
            line.clear_preparation();
        }
        self.reconciled = false;
        self.record(OrderAction::StartPreparation, next, ctx);
        Ok(())
    }

    /// Record what the preparer actually picked. May be called any number of
    /// times while in preparation; never touches stock.
    pub fn adjust_prepared_quantities(
        &mut self,
        updates: &[PreparedQuantity],
        ctx: ActionContext,
    ) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::AdjustPreparedQuantities)?;
        let lines = reconcile(&self.lines, updates)?;

        self.set_lines(lines)?;
        self.reconciled = true;
        self.record(OrderAction::AdjustPreparedQuantities, next, ctx);
        Ok(())
    }

    /// Freeze preparation and return the stock to take out of the order's
    /// store, one request per line with a positive prepared quantity.
    ///
    /// Lines never reconciled are prepared in full (no gap). The returned
    /// requests must be committed together with the status change; a second
    /// call on the same order fails the transition check.
    pub fn mark_ready(&mut self, ctx: ActionContext) -> DomainResult<Vec<StockDecrementRequest>> {
        let next = transition(self.status, OrderAction::MarkReady)?;

        if !self.reconciled {
            let updates: Vec<PreparedQuantity> = self
                .lines
                .iter()
                .map(PreparedQuantity::full)
                .collect();
            let lines = reconcile(&self.lines, &updates)?;
            self.set_lines(lines)?;
            self.reconciled = true;
        }

        let decrements = if self.stock_committed {
            Vec::new()
        } else {
            self.lines
                .iter()
                .filter(|line| line.effective_quantity() > Decimal::ZERO)
                .map(|line| StockDecrementRequest {
                    store_id: self.store_id,
                    product_id: line.product_id,
                    amount: line.effective_quantity(),
                })
                .collect()
        };

        self.stock_committed = true;
        self.ready_at = Some(ctx.at);
        self.record(OrderAction::MarkReady, next, ctx);
        Ok(decrements)
    }

    pub fn start_delivery(&mut self, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::StartDelivery)?;
        self.delivery.started_at = Some(ctx.at);
        self.record(OrderAction::StartDelivery, next, ctx);
        Ok(())
    }

    pub fn cancel_delivery(&mut self, ctx: ActionContext) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::CancelDelivery)?;
        self.delivery.started_at = None;
        self.record(OrderAction::CancelDelivery, next, ctx);
        Ok(())
    }

    pub fn complete_delivery(
        &mut self,
        confirmation: DeliveryConfirmation,
        ctx: ActionContext,
    ) -> DomainResult<()> {
        let next = transition(self.status, OrderAction::CompleteDelivery)?;
        self.delivery.signature = confirmation.signature;
        self.delivery.notes = confirmation.notes;
        self.delivery.delivered_at = Some(ctx.at);
        self.record(OrderAction::CompleteDelivery, next, ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ctx() -> ActionContext {
        ActionContext::now(Uuid::nil())
    }

    fn order_with(lines: Vec<NewOrderLine>) -> Order {
        let input = NewOrder {
            client_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            lines,
            requested_delivery_date: None,
            delivery_address: Some("12 rue des Halles".to_string()),
        };
        Order::create(Uuid::new_v4(), "CMD-2024-00001".to_string(), input, dec("0.20"), ctx()).unwrap()
    }

    fn line(quantity: &str) -> NewOrderLine {
        NewOrderLine {
            product_id: Uuid::new_v4(),
            unit: "kg".to_string(),
            ordered_quantity: dec(quantity),
            unit_price: dec("2.00"),
        }
    }

    #[test]
    fn test_forward_path_is_legal() {
        use OrderStatus::*;
        let path = [
            (Draft, OrderAction::Submit, Sent),
            (Sent, OrderAction::Confirm, Confirmed),
            (Confirmed, OrderAction::StartPreparation, InPreparation),
            (InPreparation, OrderAction::AdjustPreparedQuantities, InPreparation),
            (InPreparation, OrderAction::MarkReady, Ready),
            (Ready, OrderAction::StartDelivery, InDelivery),
            (InDelivery, OrderAction::CancelDelivery, Ready),
            (InDelivery, OrderAction::CompleteDelivery, Delivered),
        ];
        for (from, action, to) in path {
            assert_eq!(transition(from, action), Ok(to), "{} from {}", action, from);
        }
    }

    #[test]
    fn test_every_unlisted_pair_is_rejected() {
        let actions = [
            OrderAction::Create,
            OrderAction::Submit,
            OrderAction::Confirm,
            OrderAction::Cancel,
            OrderAction::StartPreparation,
            OrderAction::AdjustPreparedQuantities,
            OrderAction::MarkReady,
            OrderAction::StartDelivery,
            OrderAction::CancelDelivery,
            OrderAction::CompleteDelivery,
            OrderAction::EditLines,
        ];
        for action in actions {
            for status in OrderStatus::ALL {
                let result = transition(status, action);
                if action.sources().contains(&status) {
                    assert!(result.is_ok());
                } else {
                    assert!(result.is_err(), "{} from {} should fail", action, status);
                }
            }
        }
    }

    #[test]
    fn test_cancel_after_preparation_has_its_own_error() {
        for status in [
            OrderStatus::InPreparation,
            OrderStatus::Ready,
            OrderStatus::InDelivery,
            OrderStatus::Delivered,
        ] {
            assert_eq!(
                transition(status, OrderAction::Cancel),
                Err(DomainError::CannotCancelAfterPreparation { current: status })
            );
        }
        assert!(matches!(
            transition(OrderStatus::Cancelled, OrderAction::Cancel),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_invalid_transition_names_both_states() {
        let err = transition(OrderStatus::Ready, OrderAction::Confirm).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Ready,
                requested: OrderStatus::Confirmed,
                action: OrderAction::Confirm,
            }
        );
        assert_eq!(
            err.to_string(),
            "cannot confirm an order that is ready (requested confirmed)"
        );
    }

    #[test]
    fn test_repeated_submit_is_rejected() {
        let mut order = order_with(vec![line("1")]);
        order.submit(ctx()).unwrap();
        assert!(matches!(
            order.submit(ctx()),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(order.status, OrderStatus::Sent);
    }

    #[test]
    fn test_confirm_requires_positive_line() {
        let mut empty = order_with(vec![]);
        empty.submit(ctx()).unwrap();
        assert_eq!(empty.confirm(ctx()), Err(DomainError::EmptyOrder));
        assert_eq!(empty.status, OrderStatus::Sent);

        let mut zeros = order_with(vec![line("0")]);
        zeros.submit(ctx()).unwrap();
        assert_eq!(zeros.confirm(ctx()), Err(DomainError::EmptyOrder));

        let mut order = order_with(vec![line("0"), line("3")]);
        order.submit(ctx()).unwrap();
        order.confirm(ctx()).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_create_rejects_negative_and_duplicate_lines() {
        let input = |lines| NewOrder {
            client_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            lines,
            requested_delivery_date: None,
            delivery_address: None,
        };

        let negative = Order::create(Uuid::new_v4(), "n".into(), input(vec![line("-1")]), dec("0.2"), ctx());
        assert!(matches!(negative, Err(DomainError::InvalidQuantity { .. })));

        let repeated = line("1");
        let duplicate = Order::create(
            Uuid::new_v4(),
            "n".into(),
            input(vec![repeated.clone(), repeated]),
            dec("0.2"),
            ctx(),
        );
        assert!(matches!(duplicate, Err(DomainError::DuplicateProduct { .. })));
    }

    #[test]
    fn test_mark_ready_without_adjustment_prepares_in_full() {
        let mut order = order_with(vec![line("4"), line("0")]);
        order.submit(ctx()).unwrap();
        order.confirm(ctx()).unwrap();
        order.start_preparation(ctx()).unwrap();

        let decrements = order.mark_ready(ctx()).unwrap();

        assert_eq!(order.status, OrderStatus::Ready);
        assert_eq!(decrements.len(), 1);
        assert_eq!(decrements[0].amount, dec("4"));
        assert!(order.lines.iter().all(|l| l.gap == Some(Decimal::ZERO)));
        assert!(order.stock_committed);
        assert!(order.ready_at.is_some());
    }

    #[test]
    fn test_failed_edit_leaves_order_untouched() {
        let mut order = order_with(vec![line("2")]);
        let before = order.clone();

        assert!(order.replace_lines(vec![line("-3")], ctx()).is_err());
        assert_eq!(order, before);

        order.replace_lines(vec![line("5"), line("1")], ctx()).unwrap();
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.total_ht, dec("12.00"));
    }

    #[test]
    fn test_unrepresentable_totals_are_rejected() {
        let huge = NewOrderLine {
            unit_price: dec("1000000000000000"),
            ..line("1000000000000000")
        };
        let input = NewOrder {
            client_id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            lines: vec![huge.clone()],
            requested_delivery_date: None,
            delivery_address: None,
        };
        let created = Order::create(Uuid::new_v4(), "n".into(), input, dec("0.2"), ctx());
        assert!(matches!(created, Err(DomainError::InvalidQuantity { .. })));

        let mut order = order_with(vec![line("2")]);
        let before = order.clone();
        assert!(matches!(
            order.replace_lines(vec![huge], ctx()),
            Err(DomainError::InvalidQuantity { .. })
        ));
        assert_eq!(order, before);
    }

    #[test]
    fn test_history_tracks_every_step() {
        let mut order = order_with(vec![line("2")]);
        order.submit(ctx()).unwrap();
        order.cancel(Some("duplicate".to_string()), ctx()).unwrap();

        let steps: Vec<_> = order.history.iter().map(|h| (h.from, h.to)).collect();
        assert_eq!(
            steps,
            vec![
                (None, OrderStatus::Draft),
                (Some(OrderStatus::Draft), OrderStatus::Sent),
                (Some(OrderStatus::Sent), OrderStatus::Cancelled),
            ]
        );
        assert_eq!(order.cancellation_reason.as_deref(), Some("duplicate"));
    }

    #[test]
    fn test_complete_delivery_stamps_metadata() {
        let mut order = order_with(vec![line("1")]);
        order.submit(ctx()).unwrap();
        order.confirm(ctx()).unwrap();
        order.start_preparation(ctx()).unwrap();
        order.mark_ready(ctx()).unwrap();
        order.start_delivery(ctx()).unwrap();
        order.cancel_delivery(ctx()).unwrap();
        assert_eq!(order.status, OrderStatus::Ready);
        assert!(order.delivery.started_at.is_none());

        order.start_delivery(ctx()).unwrap();
        order
            .complete_delivery(
                DeliveryConfirmation {
                    signature: Some("J. Martin".to_string()),
                    notes: None,
                },
                ctx(),
            )
            .unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.delivery.delivered_at.is_some());
        assert_eq!(order.delivery.signature.as_deref(), Some("J. Martin"));
    }

    #[test]
    fn test_role_mapping() {
        assert!(OrderAction::Submit.permits(ActorRole::Client));
        assert!(!OrderAction::Submit.permits(ActorRole::Store));
        assert!(OrderAction::Cancel.permits(ActorRole::Store));
        assert!(!OrderAction::Cancel.permits(ActorRole::Delivery));
        assert!(OrderAction::CompleteDelivery.permits(ActorRole::Delivery));
        assert!(OrderAction::MarkReady.permits(ActorRole::Admin));
    }
}
