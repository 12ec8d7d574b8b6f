//! Availability reads and snapshot maintenance
//!
//! The `stock_availability` table is only ever written by `resync`, which
//! recomputes a pair from the global ledger inside the caller's transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::{
    aggregate, aggregate_all_pairs, available_by_product, join_catalog, plan_resync,
    rank_products, AccessScope, ActiveRowFilter, Actor, Availability, AvailabilityFilter,
    AvailabilityListing, AvailabilityRow, AvailabilitySnapshot, LedgerError, MonthBucket,
    ProductKiosPair, ProductRankingReport, ResyncAction, SalesWindow,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{catalog, ledger, pair_lock};
use crate::error::AppResult;

const SNAPSHOT_COLUMNS: &str = "id, product_id, kios_id, last_in_date, quantity_in, \
    last_out_date, quantity_out, quantity_available, is_deleted, created_by, updated_by, \
    created_at, updated_at";

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: Uuid,
    product_id: Uuid,
    kios_id: Uuid,
    last_in_date: Option<NaiveDate>,
    quantity_in: i64,
    last_out_date: Option<NaiveDate>,
    quantity_out: i64,
    quantity_available: i64,
    is_deleted: bool,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SnapshotRow> for AvailabilitySnapshot {
    fn from(row: SnapshotRow) -> Self {
        AvailabilitySnapshot {
            id: row.id,
            product_id: row.product_id,
            kios_id: row.kios_id,
            last_in_date: row.last_in_date,
            quantity_in: row.quantity_in,
            last_out_date: row.last_out_date,
            quantity_out: row.quantity_out,
            quantity_available: row.quantity_available,
            is_deleted: row.is_deleted,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Aggregate one pair under `scope`, reading through `conn`
pub async fn aggregate_pair(
    conn: &mut PgConnection,
    scope: AccessScope,
    pair: ProductKiosPair,
) -> AppResult<Availability> {
    let filter = ActiveRowFilter::new(scope);
    let entries = ledger::load_pair_entries(&mut *conn, &filter, pair).await?;
    Ok(aggregate(&entries, &filter, pair))
}

/// Recompute the snapshot row of one pair from the global ledger.
///
/// Must run inside the transaction holding the pair lock.
pub async fn resync(
    conn: &mut PgConnection,
    pair: ProductKiosPair,
    actor_id: Uuid,
) -> AppResult<ResyncAction> {
    let fresh = aggregate_pair(&mut *conn, AccessScope::Global, pair).await?;

    let sql = format!(
        "SELECT {} FROM stock_availability \
         WHERE product_id = $1 AND kios_id = $2 AND is_deleted = FALSE \
         FOR UPDATE",
        SNAPSHOT_COLUMNS
    );
    let existing = sqlx::query_as::<_, SnapshotRow>(&sql)
        .bind(pair.product_id)
        .bind(pair.kios_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(AvailabilitySnapshot::from);

    let action = plan_resync(existing.as_ref(), fresh);
    match action {
        ResyncAction::Update { snapshot_id, fresh } => {
            sqlx::query(
                r#"
                UPDATE stock_availability SET
                    last_in_date = $2, quantity_in = $3,
                    last_out_date = $4, quantity_out = $5,
                    quantity_available = $6,
                    updated_by = $7, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(snapshot_id)
            .bind(fresh.last_in_date)
            .bind(fresh.total_in)
            .bind(fresh.last_out_date)
            .bind(fresh.total_out)
            .bind(fresh.available)
            .bind(actor_id)
            .execute(&mut *conn)
            .await?;
        }
        ResyncAction::Insert { fresh } => {
            sqlx::query(
                r#"
                INSERT INTO stock_availability (
                    id, product_id, kios_id, last_in_date, quantity_in,
                    last_out_date, quantity_out, quantity_available,
                    created_by, updated_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(pair.product_id)
            .bind(pair.kios_id)
            .bind(fresh.last_in_date)
            .bind(fresh.total_in)
            .bind(fresh.last_out_date)
            .bind(fresh.total_out)
            .bind(fresh.available)
            .bind(actor_id)
            .execute(&mut *conn)
            .await?;
        }
        ResyncAction::Skip => {}
    }

    tracing::debug!(%pair, ?action, "Availability snapshot resynced");
    Ok(action)
}

/// Outcome of a full snapshot rebuild
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RebuildReport {
    pub pairs: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Availability dashboard service
#[derive(Clone)]
pub struct AvailabilityService {
    db: PgPool,
}

impl AvailabilityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Availability of one pair for the actor.
    ///
    /// Restricted actors get a live aggregate of their own rows; everyone
    /// else reads the snapshot, where a missing row means zero.
    pub async fn get_availability(
        &self,
        actor: &Actor,
        pair: ProductKiosPair,
    ) -> AppResult<Availability> {
        match actor.read_scope() {
            scope @ AccessScope::Restricted(_) => {
                let mut conn = self.db.acquire().await?;
                aggregate_pair(&mut conn, scope, pair).await
            }
            AccessScope::Global => {
                let sql = format!(
                    "SELECT {} FROM stock_availability \
                     WHERE product_id = $1 AND kios_id = $2 AND is_deleted = FALSE",
                    SNAPSHOT_COLUMNS
                );
                let snapshot = sqlx::query_as::<_, SnapshotRow>(&sql)
                    .bind(pair.product_id)
                    .bind(pair.kios_id)
                    .fetch_optional(&self.db)
                    .await?
                    .map(AvailabilitySnapshot::from);

                Ok(snapshot
                    .map(|s| s.availability())
                    .unwrap_or_default())
            }
        }
    }

    /// Availability rows visible to the actor, filtered, with totals
    pub async fn list_availability(
        &self,
        actor: &Actor,
        filter: &AvailabilityFilter,
    ) -> AppResult<AvailabilityListing> {
        let products = catalog::load_products(&self.db).await?;
        let kiosks = catalog::load_kiosks(&self.db).await?;

        let rows = match actor.read_scope() {
            scope @ AccessScope::Restricted(_) => {
                let row_filter = ActiveRowFilter::new(scope);
                let entries = ledger::load_scope_entries(&self.db, &row_filter).await?;
                join_catalog(aggregate_all_pairs(&entries, &row_filter), &products, &kiosks)
            }
            AccessScope::Global => {
                let sql = format!(
                    "SELECT {} FROM stock_availability WHERE is_deleted = FALSE \
                     ORDER BY updated_at DESC",
                    SNAPSHOT_COLUMNS
                );
                let snapshots = sqlx::query_as::<_, SnapshotRow>(&sql)
                    .fetch_all(&self.db)
                    .await?;

                snapshots
                    .into_iter()
                    .map(AvailabilitySnapshot::from)
                    .filter_map(|snapshot| {
                        let product = products
                            .get(&snapshot.product_id)
                            .filter(|p| !p.is_deleted)?;
                        let kios = kiosks.get(&snapshot.kios_id).filter(|k| !k.is_deleted)?;
                        let touched = snapshot.last_touched();
                        Some(AvailabilityRow {
                            product_id: snapshot.product_id,
                            kios_id: snapshot.kios_id,
                            availability: snapshot.availability(),
                            latest_activity: Some(touched),
                            month: Some(MonthBucket::of_timestamp(touched)),
                            product: product.into(),
                            kios: kios.into(),
                        })
                    })
                    .collect()
            }
        };

        Ok(AvailabilityListing::new(filter.apply(rows)))
    }

    /// Products ranked by quantity sold in `window`, scoped to the actor.
    ///
    /// Stock on hand comes from the actor's own rows when restricted and
    /// from the snapshot otherwise.
    pub async fn ranking(
        &self,
        actor: &Actor,
        window: &SalesWindow,
        limit: usize,
    ) -> AppResult<ProductRankingReport> {
        let products = catalog::load_products(&self.db).await?;
        let row_filter = ActiveRowFilter::new(actor.read_scope());
        let entries = ledger::load_scope_entries(&self.db, &row_filter).await?;

        let current = match row_filter.scope {
            AccessScope::Restricted(_) => {
                available_by_product(&aggregate_all_pairs(&entries, &row_filter))
            }
            AccessScope::Global => self.snapshot_available_by_product().await?,
        };

        let report = rank_products(&entries, &row_filter, window, &current, &products, limit);
        tracing::debug!(
            user_id = %actor.user_id,
            products = report.meta.total_products,
            month = %report.meta.period.month,
            "Product ranking computed"
        );
        Ok(report)
    }

    async fn snapshot_available_by_product(&self) -> AppResult<HashMap<Uuid, i64>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT product_id, SUM(quantity_available)::BIGINT FROM stock_availability \
             WHERE is_deleted = FALSE GROUP BY product_id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Resync every pair either ledger has ever touched. Area managers only.
    pub async fn rebuild_all(&self, actor: &Actor) -> AppResult<RebuildReport> {
        if !actor.is_manager() {
            return Err(LedgerError::forbidden(
                "Only an area manager may rebuild stock availability",
            )
            .into());
        }

        let pairs = ledger::all_known_pairs(&self.db).await?;
        let mut report = RebuildReport {
            pairs: pairs.len(),
            ..Default::default()
        };

        for pair in pairs {
            let mut tx = self.db.begin().await?;
            pair_lock::lock_pairs(&mut tx, &[pair]).await?;
            match resync(&mut tx, pair, actor.user_id).await? {
                ResyncAction::Insert { .. } => report.inserted += 1,
                ResyncAction::Update { .. } => report.updated += 1,
                ResyncAction::Skip => {}
            }
            tx.commit().await?;
        }

        tracing::info!(
            user_id = %actor.user_id,
            pairs = report.pairs,
            inserted = report.inserted,
            updated = report.updated,
            "Availability snapshot rebuilt"
        );
        Ok(report)
    }
}
