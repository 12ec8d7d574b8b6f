//! HTTP handlers for stock-in endpoints
#![deny(missing_docs)]

use axum::{extract::State, http::StatusCode, Json};
use shared::{LedgerQuery, StockInInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::CurrentUser;
use crate::services::stock_in::{StockInRecord, StockInService};
use crate::AppState;

fn service(state: AppState) -> StockInService {
    let offset = state.config.ledger.local_offset();
    StockInService::new(state.db, offset)
}

/// List stock-in rows visible to the current user
pub async fn list_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<LedgerQuery>,
) -> AppResult<Json<Vec<StockInRecord>>> {
    let records = service(state)
        .list_stock_in(&current_user.0.actor(), &query)
        .await?;
    Ok(Json(records))
}

/// Record a stock-in
pub async fn record_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<StockInInput>,
) -> AppResult<(StatusCode, Json<StockInRecord>)> {
    let record = service(state)
        .record_stock_in(&current_user.0.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a single stock-in row
pub async fn get_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<StockInRecord>> {
    let record = service(state)
        .get_stock_in(&current_user.0.actor(), id)
        .await?;
    Ok(Json(record))
}

/// Edit a stock-in row; both the old and the new pair are resynced
pub async fn edit_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<StockInInput>,
) -> AppResult<Json<StockInRecord>> {
    let record = service(state)
        .edit_stock_in(&current_user.0.actor(), id, input)
        .await?;
    Ok(Json(record))
}

/// Soft-delete a stock-in row
pub async fn delete_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    service(state)
        .soft_delete_stock_in(&current_user.0.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
