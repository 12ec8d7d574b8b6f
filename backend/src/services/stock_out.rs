//! Stock-out ledger service
//!
//! Every dispatch is gated on the availability the actor's scope sees. A
//! write runs in one transaction: pair locks, validation, the ledger write
//! and the snapshot resync of each affected pair all commit together.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use shared::{
    check_sufficiency, local_today, validate_movement, ActiveRowFilter, Actor, LedgerError,
    LedgerListFilter, LedgerQuery, PriorMovement, ProductKiosPair, StockOutInput,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{availability, catalog, ledger, pair_lock};
use crate::error::AppResult;

const RECORD_COLUMNS: &str = "id, user_id, kios_id, product_id, quantity, date, is_deleted, \
    created_by, updated_by, created_at, updated_at";

/// A stock-out ledger row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockOutRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kios_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub date: NaiveDate,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockOutRecord {
    pub fn pair(&self) -> ProductKiosPair {
        ProductKiosPair::new(self.product_id, self.kios_id)
    }

    fn prior(&self) -> PriorMovement {
        PriorMovement {
            pair: self.pair(),
            quantity: self.quantity,
        }
    }
}

/// Stock-out service
#[derive(Clone)]
pub struct StockOutService {
    db: PgPool,
    offset: FixedOffset,
}

impl StockOutService {
    pub fn new(db: PgPool, offset: FixedOffset) -> Self {
        Self { db, offset }
    }

    fn today(&self) -> NaiveDate {
        local_today(Utc::now(), self.offset)
    }

    /// Active row by id, locked for the rest of the transaction
    async fn fetch_for_update(conn: &mut PgConnection, id: Uuid) -> AppResult<StockOutRecord> {
        let sql = format!(
            "SELECT {} FROM stock_out WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
            RECORD_COLUMNS
        );
        sqlx::query_as::<_, StockOutRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock out").into())
    }

    /// Record a dispatch
    pub async fn record_stock_out(
        &self,
        actor: &Actor,
        input: StockOutInput,
    ) -> AppResult<StockOutRecord> {
        validate_movement(&input, self.today())?;
        let scope = actor.write_scope(input.user_id)?;
        let pair = input.pair();

        let mut tx = self.db.begin().await?;
        pair_lock::lock_pairs(&mut tx, &[pair]).await?;
        catalog::ensure_references(&mut tx, input.user_id, pair).await?;

        let available = availability::aggregate_pair(&mut tx, scope, pair).await?.available;
        check_sufficiency(available, input.quantity, pair, None)?;

        let sql = format!(
            "INSERT INTO stock_out (id, user_id, kios_id, product_id, quantity, date, \
             created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockOutRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.user_id)
            .bind(input.kios_id)
            .bind(input.product_id)
            .bind(input.quantity)
            .bind(input.date)
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;

        availability::resync(&mut tx, pair, actor.user_id).await?;
        tx.commit().await?;

        tracing::info!(
            id = %record.id,
            %pair,
            quantity = record.quantity,
            available_before = available,
            "Stock out recorded"
        );
        Ok(record)
    }

    /// Edit a dispatch. Keeping the same pair adds the row's own quantity
    /// back before the sufficiency check.
    pub async fn edit_stock_out(
        &self,
        actor: &Actor,
        id: Uuid,
        input: StockOutInput,
    ) -> AppResult<StockOutRecord> {
        validate_movement(&input, self.today())?;
        actor.ensure_can_write()?;

        let mut tx = self.db.begin().await?;
        let prior = Self::fetch_for_update(&mut tx, id).await?;
        actor.ensure_owns(prior.user_id)?;
        let scope = actor.write_scope(input.user_id)?;

        let old_pair = prior.pair();
        let new_pair = input.pair();
        pair_lock::lock_pairs(&mut tx, &[old_pair, new_pair]).await?;
        catalog::ensure_references(&mut tx, input.user_id, new_pair).await?;

        let available = availability::aggregate_pair(&mut tx, scope, new_pair)
            .await?
            .available;
        check_sufficiency(available, input.quantity, new_pair, Some(&prior.prior()))?;

        let sql = format!(
            "UPDATE stock_out SET user_id = $2, kios_id = $3, product_id = $4, quantity = $5, \
             date = $6, updated_by = $7, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockOutRecord>(&sql)
            .bind(id)
            .bind(input.user_id)
            .bind(input.kios_id)
            .bind(input.product_id)
            .bind(input.quantity)
            .bind(input.date)
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
            old_quantity = prior.quantity,
            new_quantity = record.quantity,
            "Stock out updated"
        );
        Ok(record)
    }

    /// Soft-delete a dispatch, returning its stock to the pair
    pub async fn soft_delete_stock_out(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        actor.ensure_can_write()?;

        let mut tx = self.db.begin().await?;
        let record = Self::fetch_for_update(&mut tx, id).await?;
        actor.ensure_owns(record.user_id)?;

        let pair = record.pair();
        pair_lock::lock_pairs(&mut tx, &[pair]).await?;

        sqlx::query(
            "UPDATE stock_out SET is_deleted = TRUE, updated_by = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        availability::resync(&mut tx, pair, actor.user_id).await?;
        tx.commit().await?;

        tracing::info!(%id, %pair, quantity = record.quantity, "Stock out deleted");
        Ok(())
    }

    /// One active dispatch; restricted actors only see their own
    pub async fn get_stock_out(&self, actor: &Actor, id: Uuid) -> AppResult<StockOutRecord> {
        let sql = format!(
            "SELECT {} FROM stock_out WHERE id = $1 AND is_deleted = FALSE",
            RECORD_COLUMNS
        );
        let record = sqlx::query_as::<_, StockOutRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock out"))?;

        actor.ensure_owns(record.user_id)?;
        Ok(record)
    }

    /// Active dispatches visible to the actor, newest business date first
    pub async fn list_stock_out(
        &self,
        actor: &Actor,
        query: &LedgerQuery,
    ) -> AppResult<Vec<StockOutRecord>> {
        let filter = LedgerListFilter::parse(query)?;
        let scope = ActiveRowFilter::new(actor.read_scope());

        let sql = format!(
            "SELECT {} FROM stock_out WHERE {} ORDER BY date DESC, created_at DESC",
            RECORD_COLUMNS,
            ledger::LIST_PREDICATE
        );
        let records = ledger::bind_list_filter(sqlx::query_as::<_, StockOutRecord>(&sql), &scope, &filter)
            .fetch_all(&self.db)
            .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_keeps_pair_and_quantity() {
        let now = Utc::now();
        let record = StockOutRecord {
            id: Uuid::from_u128(1),
            user_id: Uuid::from_u128(2),
            kios_id: Uuid::from_u128(20),
            product_id: Uuid::from_u128(10),
            quantity: 40,
            date: now.date_naive(),
            is_deleted: false,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        let prior = record.prior();
        assert_eq!(prior.pair, ProductKiosPair::new(Uuid::from_u128(10), Uuid::from_u128(20)));
        assert_eq!(prior.quantity, 40);
        // Same pair: the row's own 40 counts toward what the edit may take
        assert!(check_sufficiency(0, 40, prior.pair, Some(&prior)).is_ok());
    }
}
