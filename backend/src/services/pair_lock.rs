//! Per-pair advisory locks
//!
//! Every movement write holds a transaction-scoped advisory lock on each
//! (product, kios) pair it touches, from validation through snapshot resync.
//! Locks are released by Postgres at commit or rollback.

use shared::ProductKiosPair;
use sqlx::PgConnection;

/// Pairs in the order their locks must be taken: sorted, without duplicates
pub fn lock_order(pairs: &[ProductKiosPair]) -> Vec<ProductKiosPair> {
    let mut ordered = pairs.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

/// Take the advisory lock for every pair, blocking until each is granted
pub async fn lock_pairs(
    conn: &mut PgConnection,
    pairs: &[ProductKiosPair],
) -> Result<(), sqlx::Error> {
    for pair in lock_order(pairs) {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(pair.lock_key())
            .execute(&mut *conn)
            .await?;
        tracing::trace!(%pair, "Pair lock acquired");
    }
    Ok(())
}
