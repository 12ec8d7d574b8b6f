//! Stock-in ledger service

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use shared::{
    local_today, validate_stock_in, ActiveRowFilter, Actor, LedgerError, LedgerListFilter,
    LedgerQuery, ProductKiosPair, StockInInput,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{availability, catalog, ledger, pair_lock};
use crate::error::AppResult;

const RECORD_COLUMNS: &str = "id, user_id, kios_id, product_id, quantity, date, photo_ref, \
    is_deleted, created_by, updated_by, created_at, updated_at";

/// A stock-in ledger row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockInRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kios_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub date: NaiveDate,
    /// Storage path of the delivery receipt photo
    pub photo_ref: Option<String>,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockInRecord {
    pub fn pair(&self) -> ProductKiosPair {
        ProductKiosPair::new(self.product_id, self.kios_id)
    }
}

/// Stock-in service
#[derive(Clone)]
pub struct StockInService {
    db: PgPool,
    offset: FixedOffset,
}

impl StockInService {
    pub fn new(db: PgPool, offset: FixedOffset) -> Self {
        Self { db, offset }
    }

    async fn fetch_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<StockInRecord> {
        let sql = format!(
            "SELECT {} FROM stock_in WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, StockInRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock in").into())
    }

    /// Record a delivery
    pub async fn record_stock_in(
        &self,
        actor: &Actor,
        input: StockInInput,
    ) -> AppResult<StockInRecord> {
        validate_stock_in(&input, local_today(Utc::now(), self.offset))?;
        actor.write_scope(input.user_id)?;
        let pair = input.movement().pair();

        let mut tx = self.db.begin().await?;
        pair_lock::lock_pairs(&mut tx, &[pair]).await?;
        catalog::ensure_references(&mut tx, input.user_id, pair).await?;

        let sql = format!(
            "INSERT INTO stock_in (id, user_id, kios_id, product_id, quantity, date, photo_ref, \
             created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockInRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.user_id)
            .bind(input.kios_id)
            .bind(input.product_id)
            .bind(input.quantity)
            .bind(input.date)
            .bind(input.photo_ref.as_deref())
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;

        availability::resync(&mut tx, pair, actor.user_id).await?;
        tx.commit().await?;

        tracing::info!(id = %record.id, %pair, quantity = record.quantity, "Stock in recorded");
        Ok(record)
    }

    /// Edit a delivery; both the old and the new pair are resynced
    pub async fn edit_stock_in(
        &self,
        actor: &Actor,
        id: Uuid,
        input: StockInInput,
    ) -> AppResult<StockInRecord> {
        validate_stock_in(&input, local_today(Utc::now(), self.offset))?;
        actor.ensure_can_write()?;

        let mut tx = self.db.begin().await?;
        let prior = Self::fetch_for_update(&mut tx, id).await?;
        actor.ensure_owns(prior.user_id)?;
        actor.write_scope(input.user_id)?;

        let old_pair = prior.pair();
        let new_pair = input.movement().pair();
        pair_lock::lock_pairs(&mut tx, &[old_pair, new_pair]).await?;
        catalog::ensure_references(&mut tx, input.user_id, new_pair).await?;

        let sql = format!(
            "UPDATE stock_in SET user_id = $2, kios_id = $3, product_id = $4, quantity = $5, \
             date = $6, photo_ref = COALESCE($7, photo_ref), updated_by = $8, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockInRecord>(&sql)
            .bind(id)
            .bind(input.user_id)
            .bind(input.kios_id)
            .bind(input.product_id)
            .bind(input.quantity)
            .bind(input.date)
            .bind(input.photo_ref.as_deref())
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;

        availability::resync(&mut tx, new_pair, actor.user_id).await?;
        if old_pair != new_pair {
            availability::resync(&mut tx, old_pair, actor.user_id).await?;
        }
        tx.commit().await?;

        tracing::info!(
            %id,
            %old_pair,
            %new_pair,
            quantity = record.quantity,
            "Stock in updated"
        );
        Ok(record)
    }

    /// Soft-delete a delivery
    pub async fn soft_delete_stock_in(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        actor.ensure_can_write()?;

        let mut tx = self.db.begin().await?;
        let record = Self::fetch_for_update(&mut tx, id).await?;
        actor.ensure_owns(record.user_id)?;

        let pair = record.pair();
        pair_lock::lock_pairs(&mut tx, &[pair]).await?;

        sqlx::query(
            "UPDATE stock_in SET is_deleted = TRUE, updated_by = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        availability::resync(&mut tx, pair, actor.user_id).await?;
        tx.commit().await?;

        tracing::info!(%id, %pair, "Stock in deleted");
        Ok(())
    }

    pub async fn get_stock_in(&self, actor: &Actor, id: Uuid) -> AppResult<StockInRecord> {
        let sql = format!(
            "SELECT {} FROM stock_in WHERE id = $1 AND is_deleted = FALSE",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockInRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock in"))?;

        actor.ensure_owns(record.user_id)?;
        Ok(record)
    }

    pub async fn list_stock_in(
        &self,
        actor: &Actor,
        query: &LedgerQuery,
    ) -> AppResult<Vec<StockInRecord>> {
        let filter = LedgerListFilter::parse(query)?;
        let scope = ActiveRowFilter::new(actor.read_scope());

        let sql = format!(
            "SELECT {} FROM stock_in WHERE {} ORDER BY date DESC, created_at DESC",
            RECORD_COLUMNS,
            ledger::LIST_PREDICATE
        );
        let records = ledger::bind_list_filter(sqlx::query_as::<_, StockInRecord>(&sql), &scope, &filter)
            .fetch_all(&self.db)
            .await?;

        Ok(records)
    }
}
