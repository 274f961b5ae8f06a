//! Domain failures raised by the ordering core

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::OrderAction;
use crate::models::OrderStatus;

/// Validation failures of the order lifecycle, reconciliation and ledger.
///
/// Every variant is raised before any state is touched, so a caller that
/// receives one can assume the entity it operated on is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("cannot {action} an order that is {current} (requested {requested})")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
        action: OrderAction,
    },

    #[error("order has no line with a positive ordered quantity")]
    EmptyOrder,

    #[error("order is {current}; it can no longer be cancelled once preparation has started")]
    CannotCancelAfterPreparation { current: OrderStatus },

    #[error("prepared quantity missing for {} product(s)", missing.len())]
    IncompletePreparation { missing: Vec<Uuid> },

    #[error("invalid quantity {quantity} for {field}")]
    InvalidQuantity { field: String, quantity: Decimal },

    #[error("product {product_id} is not part of this order")]
    UnknownProduct { product_id: Uuid },

    #[error("product {product_id} appears on more than one line")]
    DuplicateProduct { product_id: Uuid },

    #[error("no stock record for product {product_id} at store {store_id}")]
    StockRecordNotFound { store_id: Uuid, product_id: Uuid },
}

impl DomainError {
    /// Stable machine-readable code for the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DomainError::EmptyOrder => "EMPTY_ORDER",
            DomainError::CannotCancelAfterPreparation { .. } => "CANNOT_CANCEL_AFTER_PREPARATION",
            DomainError::IncompletePreparation { .. } => "INCOMPLETE_PREPARATION",
            DomainError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            DomainError::UnknownProduct { .. } => "UNKNOWN_PRODUCT",
            DomainError::DuplicateProduct { .. } => "DUPLICATE_PRODUCT",
            DomainError::StockRecordNotFound { .. } => "STOCK_RECORD_NOT_FOUND",
        }
    }

    pub(crate) fn invalid_quantity(field: impl Into<String>, quantity: Decimal) -> Self {
        DomainError::InvalidQuantity {
            field: field.into(),
            quantity,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
