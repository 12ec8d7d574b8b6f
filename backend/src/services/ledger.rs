//! Ledger reads shared by the stock-in and stock-out services
//!
//! Both ledgers are read through the same active-row predicate: soft-deleted
//! rows are never returned, and a restricted scope binds its user id.

use chrono::{DateTime, NaiveDate, Utc};
use shared::{ActiveRowFilter, LedgerEntry, LedgerListFilter, Movement, ProductKiosPair};
use sqlx::{
    postgres::{PgArguments, Postgres},
    query::QueryAs,
    Executor, FromRow,
};
use uuid::Uuid;

use crate::error::AppResult;

/// Table holding one side of the ledger
pub fn table(movement: Movement) -> &'static str {
    match movement {
        Movement::In => "stock_in",
        Movement::Out => "stock_out",
    }
}

/// Active-row and listing predicate over one ledger table.
///
/// $1 scope user, $2 kios, $3 exact date, $4..$5 month range, $6 year.
pub const LIST_PREDICATE: &str = "is_deleted = FALSE \
    AND ($1::uuid IS NULL OR user_id = $1) \
    AND ($2::uuid IS NULL OR kios_id = $2) \
    AND ($3::date IS NULL OR date = $3) \
    AND ($4::date IS NULL OR date BETWEEN $4 AND $5) \
    AND ($6::int IS NULL OR EXTRACT(YEAR FROM date)::int = $6)";

/// Bind the scope and listing filters in `LIST_PREDICATE` order
pub fn bind_list_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    scope: &ActiveRowFilter,
    filter: &LedgerListFilter,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(scope.scope.user_filter())
        .bind(filter.kios_id)
        .bind(filter.date)
        .bind(filter.month.map(|m| m.first_day()))
        .bind(filter.month.map(|m| m.last_day()))
        .bind(filter.year)
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: Uuid,
    movement: String,
    user_id: Uuid,
    product_id: Uuid,
    kios_id: Uuid,
    quantity: i64,
    date: NaiveDate,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EntryRow> for LedgerEntry {
    fn from(row: EntryRow) -> Self {
        LedgerEntry {
            id: row.id,
            movement: if row.movement == Movement::Out.as_str() {
                Movement::Out
            } else {
                Movement::In
            },
            user_id: row.user_id,
            product_id: row.product_id,
            kios_id: row.kios_id,
            quantity: row.quantity,
            date: row.date,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Both ledgers unioned under the active-row predicate, plus `extra`
fn entries_sql(extra: &str) -> String {
    let select = |movement: Movement| {
        format!(
            "SELECT id, '{}' AS movement, user_id, product_id, kios_id, quantity, date, \
             is_deleted, created_at, updated_at \
             FROM {} WHERE is_deleted = FALSE AND ($1::uuid IS NULL OR user_id = $1){}",
            movement.as_str(),
            table(movement),
            extra
        )
    };
    format!("{} UNION ALL {}", select(Movement::In), select(Movement::Out))
}

/// Active rows of one pair under the filter's scope
pub async fn load_pair_entries<'e, E>(
    executor: E,
    filter: &ActiveRowFilter,
    pair: ProductKiosPair,
) -> AppResult<Vec<LedgerEntry>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = entries_sql(" AND product_id = $2 AND kios_id = $3");
    let rows = sqlx::query_as::<_, EntryRow>(&sql)
        .bind(filter.scope.user_filter())
        .bind(pair.product_id)
        .bind(pair.kios_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(LedgerEntry::from).collect())
}

/// Every active row under the filter's scope
pub async fn load_scope_entries<'e, E>(
    executor: E,
    filter: &ActiveRowFilter,
) -> AppResult<Vec<LedgerEntry>>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = entries_sql("");
    let rows = sqlx::query_as::<_, EntryRow>(&sql)
        .bind(filter.scope.user_filter())
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(LedgerEntry::from).collect())
}

#[derive(Debug, FromRow)]
struct PairRow {
    product_id: Uuid,
    kios_id: Uuid,
}

/// Every pair that appears in either ledger, soft-deleted rows included
pub async fn all_known_pairs<'e, E>(executor: E) -> AppResult<Vec<ProductKiosPair>>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, PairRow>(
        "SELECT product_id, kios_id FROM stock_in \
         UNION \
         SELECT product_id, kios_id FROM stock_out",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ProductKiosPair::new(r.product_id, r.kios_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_sql_covers_both_ledgers() {
        let sql = entries_sql(" AND product_id = $2");
        assert!(sql.contains("FROM stock_in WHERE is_deleted = FALSE"));
        assert!(sql.contains("FROM stock_out WHERE is_deleted = FALSE"));
        assert!(sql.contains("'out' AS movement"));
        assert_eq!(sql.matches("AND product_id = $2").count(), 2);
    }

    #[test]
    fn test_tables() {
        assert_eq!(table(Movement::In), "stock_in");
        assert_eq!(table(Movement::Out), "stock_out");
    }
}
