//! HTTP handlers for order lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    ActorRole, DateRange, DeliveryConfirmation, NewOrder, NewOrderLine, Order, OrderAction,
    OrderFilter, OrderStatus, OrderStatusChange, PaginatedResponse, Pagination, PreparedQuantity,
};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::middleware::{require_action, require_order_access, AuthUser, CurrentUser};
use crate::services::ReadyOrder;
use crate::AppState;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(custom = "valid_unit")]
    pub unit: String,
    pub ordered_quantity: Decimal,
    pub unit_price: Decimal,
}

fn valid_unit(unit: &str) -> Result<(), ValidationError> {
    shared::validate_unit(unit).map_err(|message| {
        let mut error = ValidationError::new("unit");
        error.message = Some(message.into());
        error
    })
}

impl From<OrderLineRequest> for NewOrderLine {
    fn from(line: OrderLineRequest) -> Self {
        NewOrderLine {
            product_id: line.product_id,
            unit: line.unit,
            ordered_quantity: line.ordered_quantity,
            unit_price: line.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Required for admins; clients always order for their own company
    pub client_id: Option<Uuid>,
    pub store_id: Uuid,
    #[validate]
    pub lines: Vec<OrderLineRequest>,
    pub requested_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 500))]
    pub delivery_address: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLinesRequest {
    #[validate]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreparedLineRequest {
    pub product_id: Uuid,
    pub prepared_quantity: Decimal,
    #[validate(length(max = 500))]
    pub gap_reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustPreparationRequest {
    #[validate]
    pub lines: Vec<PreparedLineRequest>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteDeliveryRequest {
    #[validate(length(max = 200))]
    pub signature: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub delivery_from: Option<NaiveDate>,
    pub delivery_to: Option<NaiveDate>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Role and scope checks for an action on an existing order
async fn authorize(state: &AppState, user: &AuthUser, id: Uuid, action: OrderAction) -> AppResult<()> {
    require_action(user, action)?;
    let order = state.orders.get_order(id).await?;
    require_order_access(user, &order)
}

fn list_filter(user: &AuthUser, query: &ListOrdersQuery) -> AppResult<OrderFilter> {
    let delivery_dates = match (query.delivery_from, query.delivery_to) {
        (Some(start), Some(end)) if start <= end => Some(DateRange { start, end }),
        (Some(_), Some(_)) => {
            return Err(AppError::Validation {
                field: "delivery_from".to_string(),
                message: "delivery_from must not be after delivery_to".to_string(),
                message_fr: "delivery_from doit précéder delivery_to".to_string(),
            })
        }
        (Some(start), None) => Some(DateRange { start, end: NaiveDate::MAX }),
        (None, Some(end)) => Some(DateRange { start: NaiveDate::MIN, end }),
        (None, None) => None,
    };

    let mut filter = OrderFilter {
        client_id: query.client_id,
        store_id: query.store_id,
        status: query.status,
        delivery_dates,
    };

    // Clients and stores only ever see their own orders
    match user.role {
        ActorRole::Client => filter.client_id = user.client_id.or(Some(Uuid::nil())),
        ActorRole::Store => filter.store_id = user.store_id.or(Some(Uuid::nil())),
        ActorRole::Admin | ActorRole::Delivery => {}
    }
    Ok(filter)
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a draft order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let user = &current_user.0;
    require_action(user, OrderAction::Create)?;
    input.validate()?;

    let client_id = match user.role {
        ActorRole::Client => user.client_id,
        _ => input.client_id,
    }
    .ok_or_else(|| AppError::Validation {
        field: "client_id".to_string(),
        message: "Client is required".to_string(),
        message_fr: "Le client est obligatoire".to_string(),
    })?;

    let new_order = NewOrder {
        client_id,
        store_id: input.store_id,
        lines: input.lines.into_iter().map(Into::into).collect(),
        requested_delivery_date: input.requested_delivery_date,
        delivery_address: input.delivery_address,
    };

    let order = state.orders.create_order(new_order, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders visible to the caller
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    let filter = list_filter(&current_user.0, &query)?;
    let pagination = Pagination {
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(20).clamp(1, 100),
    };

    let orders = state.orders.list_orders(&filter, &pagination).await?;
    Ok(Json(orders))
}

/// Get an order by id
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get_order(order_id).await?;
    require_order_access(&current_user.0, &order)?;
    Ok(Json(order))
}

/// Get the status history of an order
pub async fn get_order_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Vec<OrderStatusChange>>> {
    let order = state.orders.get_order(order_id).await?;
    require_order_access(&current_user.0, &order)?;
    let history = state.orders.order_history(order_id).await?;
    Ok(Json(history))
}

/// Replace the lines of a draft or sent order
pub async fn update_order_lines(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateLinesRequest>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::EditLines).await?;
    input.validate()?;

    let lines = input.lines.into_iter().map(Into::into).collect();
    let order = state
        .orders
        .update_order_lines(order_id, lines, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

pub async fn submit_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::Submit).await?;
    let order = state.orders.submit(order_id, current_user.0.user_id).await?;
    Ok(Json(order))
}

pub async fn confirm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::Confirm).await?;
    let order = state.orders.confirm(order_id, current_user.0.user_id).await?;
    Ok(Json(order))
}

/// Cancel an order; the body with a reason is optional
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    input: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::Cancel).await?;
    let input = input.map(|Json(body)| body).unwrap_or_default();
    input.validate()?;

    let order = state
        .orders
        .cancel(order_id, input.reason, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

pub async fn start_preparation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::StartPreparation).await?;
    let order = state
        .orders
        .start_preparation(order_id, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

/// Record prepared quantities and gap reasons
pub async fn adjust_preparation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AdjustPreparationRequest>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::AdjustPreparedQuantities).await?;
    input.validate()?;

    let updates: Vec<PreparedQuantity> = input
        .lines
        .into_iter()
        .map(|line| PreparedQuantity::new(line.product_id, line.prepared_quantity, line.gap_reason))
        .collect();

    let order = state
        .orders
        .adjust_prepared_quantities(order_id, &updates, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

/// Mark an order ready and take its prepared quantities out of stock
pub async fn mark_ready(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ReadyOrder>> {
    authorize(&state, &current_user.0, order_id, OrderAction::MarkReady).await?;
    let ready = state
        .orders
        .mark_ready(order_id, current_user.0.user_id)
        .await?;
    Ok(Json(ready))
}

pub async fn start_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::StartDelivery).await?;
    let order = state
        .orders
        .start_delivery(order_id, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

pub async fn cancel_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::CancelDelivery).await?;
    let order = state
        .orders
        .cancel_delivery(order_id, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}

/// Complete a delivery with optional signature and notes
pub async fn complete_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    input: Option<Json<CompleteDeliveryRequest>>,
) -> AppResult<Json<Order>> {
    authorize(&state, &current_user.0, order_id, OrderAction::CompleteDelivery).await?;
    let input = input.map(|Json(body)| body).unwrap_or_default();
    input.validate()?;

    let confirmation = DeliveryConfirmation {
        signature: input.signature,
        notes: input.notes,
    };
    let order = state
        .orders
        .complete_delivery(order_id, confirmation, current_user.0.user_id)
        .await?;
    Ok(Json(order))
}
