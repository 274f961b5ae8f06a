//! Order and order line models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::lifecycle::OrderAction;

/// A purchase request from one store to the supplier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// Human-readable number, sequential per year (e.g. "CMD-2024-00042")
    pub order_number: String,
    pub client_id: Uuid,
    pub store_id: Uuid,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineItem>,
    pub requested_delivery_date: Option<NaiveDate>,
    pub delivery: DeliveryDetails,
    /// VAT rate snapshot taken at creation (0.20 = 20%)
    pub vat_rate: Decimal,
    pub total_ht: Decimal,
    pub total_ttc: Decimal,
    /// Set once reconciliation has run since entering `in_preparation`
    pub reconciled: bool,
    /// Set once prepared quantities were taken out of store stock
    pub stock_committed: bool,
    pub cancellation_reason: Option<String>,
    pub history: Vec<OrderStatusChange>,
    /// Incremented on every persisted change; used for compare-and-set saves
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Sent,
    Confirmed,
    InPreparation,
    Ready,
    InDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Draft,
        OrderStatus::Sent,
        OrderStatus::Confirmed,
        OrderStatus::InPreparation,
        OrderStatus::Ready,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Sent => "sent",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InPreparation => "in_preparation",
            OrderStatus::Ready => "ready",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// True once stock has been (or is about to be) committed to the order
    pub fn is_preparation_or_later(&self) -> bool {
        matches!(
            self,
            OrderStatus::InPreparation
                | OrderStatus::Ready
                | OrderStatus::InDelivery
                | OrderStatus::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown order status: {}", s))
    }
}

/// One product requested within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    pub product_id: Uuid,
    /// Unit of measure (e.g. "kg", "carton")
    pub unit: String,
    pub ordered_quantity: Decimal,
    pub unit_price: Decimal,
    /// Unset until preparation reconciles the line
    pub prepared_quantity: Option<Decimal>,
    /// `ordered_quantity - prepared_quantity`, unset with it
    pub gap: Option<Decimal>,
    pub gap_reason: Option<String>,
}

impl OrderLineItem {
    pub fn new(product_id: Uuid, unit: impl Into<String>, ordered_quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            product_id,
            unit: unit.into(),
            ordered_quantity,
            unit_price,
            prepared_quantity: None,
            gap: None,
            gap_reason: None,
        }
    }

    /// Prepared quantity once reconciled, ordered quantity before that
    pub fn effective_quantity(&self) -> Decimal {
        self.prepared_quantity.unwrap_or(self.ordered_quantity)
    }

    pub fn gap_or_zero(&self) -> Decimal {
        self.gap.unwrap_or(Decimal::ZERO)
    }

    pub fn has_gap(&self) -> bool {
        !self.gap_or_zero().is_zero()
    }

    /// Effective quantity times unit price; fails instead of overflowing
    pub fn total_ht(&self) -> DomainResult<Decimal> {
        let quantity = self.effective_quantity();
        quantity.checked_mul(self.unit_price).ok_or_else(|| {
            DomainError::invalid_quantity(format!("line_total[{}]", self.product_id), quantity)
        })
    }

    pub(crate) fn clear_preparation(&mut self) {
        self.prepared_quantity = None;
        self.gap = None;
        self.gap_reason = None;
    }
}

/// Delivery metadata captured along the delivery steps
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryDetails {
    /// Address snapshot taken when the order was created
    pub address: Option<String>,
    pub notes: Option<String>,
    pub signature: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Proof of delivery supplied when completing a delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfirmation {
    pub signature: Option<String>,
    pub notes: Option<String>,
}

/// One entry of an order's status history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusChange {
    /// `None` for the creation entry
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub action: OrderAction,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
}

/// Input for creating an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub client_id: Uuid,
    pub store_id: Uuid,
    pub lines: Vec<NewOrderLine>,
    pub requested_delivery_date: Option<NaiveDate>,
    pub delivery_address: Option<String>,
}

/// Requested line of a new or edited order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub unit: String,
    pub ordered_quantity: Decimal,
    pub unit_price: Decimal,
}

impl From<NewOrderLine> for OrderLineItem {
    fn from(line: NewOrderLine) -> Self {
        OrderLineItem::new(line.product_id, line.unit, line.ordered_quantity, line.unit_price)
    }
}

/// Order amounts before tax (HT) and including tax (TTC)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_ht: Decimal,
    pub total_vat: Decimal,
    pub total_ttc: Decimal,
}

/// Compute HT/VAT/TTC totals for a set of lines, rounded to cents
pub fn compute_totals(lines: &[OrderLineItem], vat_rate: Decimal) -> DomainResult<OrderTotals> {
    let total_ht = lines.iter().try_fold(Decimal::ZERO, |total, line| {
        let line_total = line.total_ht()?;
        total
            .checked_add(line_total)
            .ok_or_else(|| DomainError::invalid_quantity("total_ht", line_total))
    })?;
    let total_ht = round_money(total_ht);

    let total_vat = total_ht
        .checked_mul(vat_rate)
        .map(round_money)
        .ok_or_else(|| DomainError::invalid_quantity("total_vat", total_ht))?;
    let total_ttc = total_ht
        .checked_add(total_vat)
        .ok_or_else(|| DomainError::invalid_quantity("total_ttc", total_ht))?;

    Ok(OrderTotals {
        total_ht,
        total_vat,
        total_ttc,
    })
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an order number: CMD-YYYY-NNNNN
pub fn format_order_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:05}", prefix, year, sequence)
}
