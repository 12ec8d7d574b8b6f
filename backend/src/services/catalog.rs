//! Product, kios and user lookups used by the ledger

use std::collections::HashMap;

use shared::{Kios, LedgerError, Product, ProductKiosPair};
use sqlx::{Executor, FromRow, PgConnection, Postgres};
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    package_unit: String,
    unit: Option<String>,
    is_deleted: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            package_unit: row.package_unit,
            unit: row.unit,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(Debug, FromRow)]
struct KiosRow {
    id: Uuid,
    name: String,
    is_deleted: bool,
}

impl From<KiosRow> for Kios {
    fn from(row: KiosRow) -> Self {
        Kios {
            id: row.id,
            name: row.name,
            is_deleted: row.is_deleted,
        }
    }
}

async fn active_exists<'e, E>(executor: E, table: &str, id: Uuid) -> AppResult<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND is_deleted = FALSE)",
        table
    );
    let exists = sqlx::query_scalar::<_, bool>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await?;
    Ok(exists)
}

/// Reject movements that reference a missing or soft-deleted user, product or kios
pub async fn ensure_references(
    conn: &mut PgConnection,
    user_id: Uuid,
    pair: ProductKiosPair,
) -> AppResult<()> {
    let user_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if !user_exists {
        return Err(LedgerError::invalid("user_id", "Selected user does not exist").into());
    }
    if !active_exists(&mut *conn, "products", pair.product_id).await? {
        return Err(LedgerError::invalid("product_id", "Selected product does not exist").into());
    }
    if !active_exists(&mut *conn, "kiosks", pair.kios_id).await? {
        return Err(LedgerError::invalid("kios_id", "Selected kios does not exist").into());
    }
    Ok(())
}

/// Every product, soft-deleted ones included, keyed by id
pub async fn load_products<'e, E>(executor: E) -> AppResult<HashMap<Uuid, Product>>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, package_unit, unit, is_deleted FROM products",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| (r.id, Product::from(r))).collect())
}

/// Every kios, soft-deleted ones included, keyed by id
pub async fn load_kiosks<'e, E>(executor: E) -> AppResult<HashMap<Uuid, Kios>>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, KiosRow>("SELECT id, name, is_deleted FROM kiosks")
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(|r| (r.id, Kios::from(r))).collect())
}
