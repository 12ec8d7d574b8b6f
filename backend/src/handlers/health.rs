//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Rows in the availability snapshot table, when the database answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_rows: Option<i64>,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot_rows = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM stock_availability WHERE is_deleted = FALSE",
    )
    .fetch_one(&state.db)
    .await;

    let (database, snapshot_rows) = match snapshot_rows {
        Ok(rows) => ("connected", Some(rows)),
        Err(e) => {
            tracing::warn!("Health check could not reach the database: {}", e);
            ("disconnected", None)
        }
    };

    Json(HealthResponse {
        status: "healthy",
        service: "kios-stock-ledger",
        version: env!("CARGO_PKG_VERSION"),
        database,
        snapshot_rows,
    })
}
