//! HTTP handlers for the availability dashboard

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use shared::{
    local_today, parse_limit, Availability, AvailabilityFilter, AvailabilityListing,
    AvailabilityQuery, ProductKiosPair, ProductRankingReport, RankingQuery, SalesWindow,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::AppQuery;
use crate::middleware::CurrentUser;
use crate::services::availability::{AvailabilityService, RebuildReport};
use crate::AppState;

/// Query parameters for a single pair
#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub product_id: Uuid,
    pub kios_id: Uuid,
}

/// List availability rows, optionally by kios and month
pub async fn list_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityListing>> {
    let filter = AvailabilityFilter::parse(&query)?;
    let service = AvailabilityService::new(state.db);
    let listing = service
        .list_availability(&current_user.0.actor(), &filter)
        .await?;
    Ok(Json(listing))
}

/// Availability of one (product, kios) pair
pub async fn get_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<ShowQuery>,
) -> AppResult<Json<Availability>> {
    let service = AvailabilityService::new(state.db);
    let availability = service
        .get_availability(
            &current_user.0.actor(),
            ProductKiosPair::new(query.product_id, query.kios_id),
        )
        .await?;
    Ok(Json(availability))
}

/// Products ranked by quantity sold in a month (default: the current one)
/// or a whole year
pub async fn product_ranking(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppQuery(query): AppQuery<RankingQuery>,
) -> AppResult<Json<ProductRankingReport>> {
    let today = local_today(Utc::now(), state.config.ledger.local_offset());
    let window = SalesWindow::parse(&query, today)?;
    let limit = parse_limit(query.limit.as_deref())?;

    let service = AvailabilityService::new(state.db);
    let report = service
        .ranking(&current_user.0.actor(), &window, limit)
        .await?;
    Ok(Json(report))
}

/// Recompute every snapshot row from the ledger
pub async fn rebuild_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<RebuildReport>> {
    let service = AvailabilityService::new(state.db);
    let report = service.rebuild_all(&current_user.0.actor()).await?;
    Ok(Json(report))
}
