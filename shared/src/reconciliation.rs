//! Preparation gap reconciliation
//!
//! Matches what a store actually prepared against what the client ordered.
//! The result is a fresh set of lines; stock is never touched here.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::OrderLineItem;

/// Preparer-supplied quantity for one product of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreparedQuantity {
    pub product_id: Uuid,
    pub prepared_quantity: Decimal,
    #[serde(default)]
    pub gap_reason: Option<String>,
}

impl PreparedQuantity {
    pub fn new(product_id: Uuid, prepared_quantity: Decimal, gap_reason: Option<String>) -> Self {
        Self {
            product_id,
            prepared_quantity,
            gap_reason,
        }
    }

    /// Prepared exactly as ordered
    pub fn full(line: &OrderLineItem) -> Self {
        Self::new(line.product_id, line.ordered_quantity, None)
    }
}

/// Recompute prepared quantity, gap and gap reason for every line.
///
/// Every product of the order must be covered by exactly one update.
/// The gap reason is kept verbatim (empty strings included) on lines that
/// end up with a gap, and dropped on lines prepared exactly as ordered.
pub fn reconcile(
    lines: &[OrderLineItem],
    updates: &[PreparedQuantity],
) -> DomainResult<Vec<OrderLineItem>> {
    let mut by_product: HashMap<Uuid, &PreparedQuantity> = HashMap::with_capacity(updates.len());

    for update in updates {
        if update.prepared_quantity < Decimal::ZERO {
            return Err(DomainError::InvalidQuantity {
                field: format!("prepared_quantity[{}]", update.product_id),
                quantity: update.prepared_quantity,
            });
        }
        if !lines.iter().any(|line| line.product_id == update.product_id) {
            return Err(DomainError::UnknownProduct {
                product_id: update.product_id,
            });
        }
        if by_product.insert(update.product_id, update).is_some() {
            return Err(DomainError::DuplicateProduct {
                product_id: update.product_id,
            });
        }
    }

    let missing: Vec<Uuid> = lines
        .iter()
        .map(|line| line.product_id)
        .filter(|product_id| !by_product.contains_key(product_id))
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::IncompletePreparation { missing });
    }

    Ok(lines
        .iter()
        .map(|line| {
            let update = by_product[&line.product_id];
            let gap = line.ordered_quantity - update.prepared_quantity;
            OrderLineItem {
                prepared_quantity: Some(update.prepared_quantity),
                gap: Some(gap),
                gap_reason: if gap.is_zero() {
                    None
                } else {
                    update.gap_reason.clone()
                },
                ..line.clone()
            }
        })
        .collect())
}

/// Aggregate view of the gaps on an order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GapSummary {
    pub lines_with_gap: usize,
    /// Sum of positive gaps (prepared less than ordered)
    pub total_shortfall: Decimal,
    /// Sum of negative gaps, as a positive amount (prepared more than ordered)
    pub total_surplus: Decimal,
    pub unexplained_gaps: usize,
}

pub fn summarize_gaps(lines: &[OrderLineItem]) -> GapSummary {
    lines
        .iter()
        .filter(|line| line.has_gap())
        .fold(GapSummary::default(), |mut summary, line| {
            let gap = line.gap_or_zero();
            summary.lines_with_gap += 1;
            if gap > Decimal::ZERO {
                summary.total_shortfall = summary.total_shortfall.saturating_add(gap);
            } else {
                summary.total_surplus = summary.total_surplus.saturating_sub(gap);
            }
            if line.gap_reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
                summary.unexplained_gaps += 1;
            }
            summary
        })
}
