//! HTTP handlers for stock-out endpoints
#![deny(missing_docs)]

use axum::{extract::State, http::StatusCode, Json};
use shared::{LedgerQuery, StockOutInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::CurrentUser;
use crate::services::stock_out::{StockOutRecord, StockOutService};
use crate::AppState;

fn service(state: AppState) -> StockOutService {
    let offset = state.config.ledger.local_offset();
    StockOutService::new(state.db, offset)
}

/// List stock-out rows visible to the current user
pub async fn list_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<LedgerQuery>,
) -> AppResult<Json<Vec<StockOutRecord>>> {
    let records = service(state)
        .list_stock_out(&current_user.0.actor(), &query)
        .await?;
    Ok(Json(records))
}

/// Record a stock-out
pub async fn record_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<StockOutInput>,
) -> AppResult<(StatusCode, Json<StockOutRecord>)> {
    let record = service(state)
        .record_stock_out(&current_user.0.actor(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get a single stock-out row
pub async fn get_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<StockOutRecord>> {
    let record = service(state)
        .get_stock_out(&current_user.0.actor(), id)
        .await?;
    Ok(Json(record))
}

/// Edit a stock-out row
pub async fn edit_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<StockOutInput>,
) -> AppResult<Json<StockOutRecord>> {
    let record = service(state)
        .edit_stock_out(&current_user.0.actor(), id, input)
        .await?;
    Ok(Json(record))
}

/// Soft-delete a stock-out row
pub async fn delete_stock_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    service(state)
        .soft_delete_stock_out(&current_user.0.actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
