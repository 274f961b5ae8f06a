//! HTTP handlers for store stock and consolidation endpoints

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{ConsolidatedStockEntry, StockAdjustment, StockDecrement, StockMovement, StockRecord};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::middleware::{require_store_access, AuthUser, CurrentUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StoreSetQuery {
    /// Comma-separated store ids
    pub store_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecrementRequest {
    #[validate(custom = "non_negative")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockRequest {
    #[validate(custom = "non_negative")]
    pub quantity: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub min_stock: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub max_stock: Option<Decimal>,
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    shared::validate_non_negative(*value).map_err(|_| ValidationError::new("non_negative"))
}

/// Parse `a,b,c` into store ids; blank entries are ignored
pub fn parse_store_ids(raw: Option<&str>) -> AppResult<Vec<Uuid>> {
    let mut ids = Vec::new();
    for part in raw.unwrap_or_default().split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        let id = Uuid::parse_str(part).map_err(|_| AppError::Validation {
            field: "store_ids".to_string(),
            message: format!("Invalid store id: {}", part),
            message_fr: format!("Identifiant de magasin invalide : {}", part),
        })?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Resolve the store set of a multi-store query; store users default to,
/// and are limited to, their own store
fn store_set(user: &AuthUser, query: &StoreSetQuery) -> AppResult<Vec<Uuid>> {
    let mut ids = parse_store_ids(query.store_ids.as_deref())?;
    if ids.is_empty() && !user.is_admin() {
        ids.extend(user.store_id);
    }
    for id in &ids {
        require_store_access(user, *id)?;
    }
    Ok(ids)
}

/// Per-product stock rollup across stores
pub async fn get_consolidated_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StoreSetQuery>,
) -> AppResult<Json<BTreeMap<Uuid, ConsolidatedStockEntry>>> {
    let store_ids = store_set(&current_user.0, &query)?;
    let entries = state.consolidation.get_consolidated_stock(&store_ids).await?;
    Ok(Json(entries))
}

/// Records at or below their minimum stock
pub async fn list_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<StoreSetQuery>,
) -> AppResult<Json<Vec<StockRecord>>> {
    let store_ids = store_set(&current_user.0, &query)?;
    let records = state.stock.list_low_stock(&store_ids).await?;
    Ok(Json(records))
}

pub async fn list_store_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockRecord>>> {
    require_store_access(&current_user.0, store_id)?;
    let records = state.stock.list_store_stock(store_id).await?;
    Ok(Json(records))
}

pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockRecord>> {
    require_store_access(&current_user.0, store_id)?;
    let record = state.stock.get_stock(store_id, product_id).await?;
    Ok(Json(record))
}

/// Operator write of quantity and thresholds
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<AdjustStockRequest>,
) -> AppResult<Json<StockRecord>> {
    require_store_access(&current_user.0, store_id)?;
    input.validate()?;

    let adjustment = StockAdjustment {
        quantity: input.quantity,
        min_stock: input.min_stock,
        max_stock: input.max_stock,
    };
    let record = state.stock.adjust_stock(store_id, product_id, adjustment).await?;
    Ok(Json(record))
}

/// Direct floor-at-zero decrement
pub async fn decrement_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<DecrementRequest>,
) -> AppResult<Json<StockDecrement>> {
    require_store_access(&current_user.0, store_id)?;
    input.validate()?;

    let outcome = state
        .stock
        .decrement_stock(store_id, product_id, input.amount)
        .await?;
    Ok(Json(outcome))
}

/// Stock movement journal of a store, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(store_id): Path<Uuid>,
    Query(query): Query<MovementsQuery>,
) -> AppResult<Json<Vec<StockMovement>>> {
    require_store_access(&current_user.0, store_id)?;
    let movements = state.stock.list_movements(store_id, query.limit).await?;
    Ok(Json(movements))
}
