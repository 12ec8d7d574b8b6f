//! Service tests against PostgreSQL
//!
//! Each test gets a fresh database with the crate's migrations applied
//! (`DATABASE_URL` must point at a server the test user may create
//! databases on). They drive the real services, so the SQL, the pair
//! locks and the snapshot resync are all exercised.

use chrono::{FixedOffset, NaiveDate, Utc};
use kios_stock_ledger_backend::error::AppError;
use kios_stock_ledger_backend::services::availability::AvailabilityService;
use kios_stock_ledger_backend::services::stock_in::StockInService;
use kios_stock_ledger_backend::services::stock_out::StockOutService;
use shared::{
    local_today, Actor, MonthBucket, MovementInput, ProductKiosPair, Role, SalesWindow,
    StockInInput,
};
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Fixtures
// ============================================================================

const FIELD_ASSISTANT_1: u128 = 1;
const FIELD_ASSISTANT_2: u128 = 2;
const AREA_MANAGER: u128 = 9;
const KOPI: u128 = 10;
const TEH: u128 = 11;
const KIOS_MAJU: u128 = 20;

fn uid(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn wib() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

/// A business date that is never in the future in WIB
fn today() -> NaiveDate {
    local_today(Utc::now(), wib())
}

fn manager() -> Actor {
    Actor::new(uid(AREA_MANAGER), Role::AreaManager)
}

fn field_assistant(n: u128) -> Actor {
    Actor::new(uid(n), Role::FieldAssistant)
}

fn pair(product: u128) -> ProductKiosPair {
    ProductKiosPair::new(uid(product), uid(KIOS_MAJU))
}

fn movement(user: u128, product: u128, quantity: i64) -> MovementInput {
    MovementInput {
        user_id: uid(user),
        kios_id: uid(KIOS_MAJU),
        product_id: uid(product),
        quantity,
        date: today(),
    }
}

fn delivery(user: u128, product: u128, quantity: i64) -> StockInInput {
    StockInInput {
        user_id: uid(user),
        kios_id: uid(KIOS_MAJU),
        product_id: uid(product),
        quantity,
        date: today(),
        photo_ref: Some("nota/test.jpg".to_string()),
    }
}

async fn seed(pool: &PgPool) {
    for (id, name, role) in [
        (FIELD_ASSISTANT_1, "Budi", "Field Assistant"),
        (FIELD_ASSISTANT_2, "Sari", "Field Assistant"),
        (AREA_MANAGER, "Andi", "Assistant Area Manager"),
    ] {
        sqlx::query("INSERT INTO users (id, name, role) VALUES ($1, $2, $3)")
            .bind(uid(id))
            .bind(name)
            .bind(role)
            .execute(pool)
            .await
            .unwrap();
    }
    for (id, name) in [(KOPI, "Kopi Sachet"), (TEH, "Teh Celup")] {
        sqlx::query("INSERT INTO products (id, name, package_unit, unit) VALUES ($1, $2, 'Renteng', 'pcs')")
            .bind(uid(id))
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO kiosks (id, name) VALUES ($1, 'Kios Maju')")
        .bind(uid(KIOS_MAJU))
        .execute(pool)
        .await
        .unwrap();
}

struct Services {
    stock_in: StockInService,
    stock_out: StockOutService,
    availability: AvailabilityService,
}

async fn services(pool: &PgPool) -> Services {
    seed(pool).await;
    Services {
        stock_in: StockInService::new(pool.clone(), wib()),
        stock_out: StockOutService::new(pool.clone(), wib()),
        availability: AvailabilityService::new(pool.clone()),
    }
}

/// Snapshot row of a pair as stored, `None` when there is no active row
async fn snapshot_available(pool: &PgPool, pair: ProductKiosPair) -> Option<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT quantity_available FROM stock_availability \
         WHERE product_id = $1 AND kios_id = $2 AND is_deleted = FALSE",
    )
    .bind(pair.product_id)
    .bind(pair.kios_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_dispatch_gated_on_availability(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 60)).await.unwrap();
    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 40)).await.unwrap();
    assert_eq!(s.availability.get_availability(&am, pair(KOPI)).await.unwrap().available, 100);

    let rejected = s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 150)).await;
    assert!(matches!(rejected, Err(AppError::InsufficientStock { available: 100 })));
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(100));

    s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 100)).await.unwrap();
    assert_eq!(s.availability.get_availability(&am, pair(KOPI)).await.unwrap().available, 0);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(0));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_soft_deleted_dispatch_returns_stock(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 100)).await.unwrap();
    let out = s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 100)).await.unwrap();
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(0));

    s.stock_out.soft_delete_stock_out(&am, out.id).await.unwrap();
    assert_eq!(s.availability.get_availability(&am, pair(KOPI)).await.unwrap().available, 100);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(100));

    let again = s.stock_out.soft_delete_stock_out(&am, out.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_restricted_and_global_availability(pool: PgPool) {
    let s = services(&pool).await;
    let u1 = field_assistant(FIELD_ASSISTANT_1);
    let u2 = field_assistant(FIELD_ASSISTANT_2);

    s.stock_in.record_stock_in(&u1, delivery(FIELD_ASSISTANT_1, KOPI, 50)).await.unwrap();
    s.stock_out.record_stock_out(&u1, movement(FIELD_ASSISTANT_1, KOPI, 20)).await.unwrap();
    s.stock_in.record_stock_in(&u2, delivery(FIELD_ASSISTANT_2, KOPI, 200)).await.unwrap();

    assert_eq!(s.availability.get_availability(&u1, pair(KOPI)).await.unwrap().available, 30);
    assert_eq!(s.availability.get_availability(&manager(), pair(KOPI)).await.unwrap().available, 230);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(230));

    // U1 may not dispatch stock U2 delivered
    let rejected = s.stock_out.record_stock_out(&u1, movement(FIELD_ASSISTANT_1, KOPI, 31)).await;
    assert!(matches!(rejected, Err(AppError::InsufficientStock { available: 30 })));

    // Nor write on U2's behalf
    let forbidden = s.stock_out.record_stock_out(&u1, movement(FIELD_ASSISTANT_2, KOPI, 1)).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

    let listing = s.stock_out.list_stock_out(&u2, &Default::default()).await.unwrap();
    assert!(listing.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_out_of_range_edit_rejected_before_sufficiency(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 110)).await.unwrap();
    let out = s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 10)).await.unwrap();
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(100));

    let result = s
        .stock_out
        .edit_stock_out(&am, out.id, movement(AREA_MANAGER, KOPI, 10_000_000))
        .await;
    match result {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "quantity"),
        other => panic!("expected a quantity validation error, got {:?}", other.map(|r| r.id)),
    }

    let stored = s.stock_out.get_stock_out(&am, out.id).await.unwrap();
    assert_eq!(stored.quantity, 10);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(100));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_same_pair_edit_adds_back_own_quantity(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 100)).await.unwrap();
    let out = s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 40)).await.unwrap();

    let edited = s
        .stock_out
        .edit_stock_out(&am, out.id, movement(AREA_MANAGER, KOPI, 100))
        .await
        .unwrap();
    assert_eq!(edited.quantity, 100);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(0));

    let too_much = s
        .stock_out
        .edit_stock_out(&am, out.id, movement(AREA_MANAGER, KOPI, 101))
        .await;
    assert!(matches!(too_much, Err(AppError::InsufficientStock { available: 100 })));
}

// ============================================================================
// Pair moves
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_moving_a_delivery_resyncs_both_pairs(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    let delivered = s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 70)).await.unwrap();
    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, TEH, 5)).await.unwrap();
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(70));
    assert_eq!(snapshot_available(&pool, pair(TEH)).await, Some(5));

    // Recorded against the wrong product: move it to TEH
    let mut corrected = delivery(AREA_MANAGER, TEH, 70);
    corrected.photo_ref = None;
    let moved = s.stock_in.edit_stock_in(&am, delivered.id, corrected).await.unwrap();
    assert_eq!(moved.product_id, uid(TEH));
    assert_eq!(moved.photo_ref.as_deref(), Some("nota/test.jpg"));

    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(0));
    assert_eq!(snapshot_available(&pool, pair(TEH)).await, Some(75));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_moving_a_dispatch_checks_the_new_pair_fresh(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 50)).await.unwrap();
    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, TEH, 10)).await.unwrap();
    let out = s.stock_out.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 30)).await.unwrap();

    // No add-back on a different pair: TEH only has 10
    let rejected = s.stock_out.edit_stock_out(&am, out.id, movement(AREA_MANAGER, TEH, 30)).await;
    assert!(matches!(rejected, Err(AppError::InsufficientStock { available: 10 })));
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(20));

    s.stock_out.edit_stock_out(&am, out.id, movement(AREA_MANAGER, TEH, 10)).await.unwrap();
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(50));
    assert_eq!(snapshot_available(&pool, pair(TEH)).await, Some(0));
}

// ============================================================================
// Concurrency
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_dispatches_cannot_oversell(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 100)).await.unwrap();

    let first = s.stock_out.clone();
    let second = s.stock_out.clone();
    let (a, b) = tokio::join!(
        first.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 60)),
        second.record_stock_out(&am, movement(AREA_MANAGER, KOPI, 60)),
    );

    let results = [a, b];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientStock { available: 40 })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(40));
}

// ============================================================================
// Snapshot maintenance and ranking
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_rebuild_restores_a_drifted_snapshot(pool: PgPool) {
    let s = services(&pool).await;
    let am = manager();

    s.stock_in.record_stock_in(&am, delivery(AREA_MANAGER, KOPI, 100)).await.unwrap();
    sqlx::query("UPDATE stock_availability SET quantity_available = 7")
        .execute(&pool)
        .await
        .unwrap();

    let forbidden = s.availability.rebuild_all(&field_assistant(FIELD_ASSISTANT_1)).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

    let report = s.availability.rebuild_all(&am).await.unwrap();
    assert_eq!(report.pairs, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(snapshot_available(&pool, pair(KOPI)).await, Some(100));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_ranking_is_scoped_to_the_actor(pool: PgPool) {
    let s = services(&pool).await;
    let u1 = field_assistant(FIELD_ASSISTANT_1);
    let u2 = field_assistant(FIELD_ASSISTANT_2);

    s.stock_in.record_stock_in(&u1, delivery(FIELD_ASSISTANT_1, KOPI, 50)).await.unwrap();
    s.stock_out.record_stock_out(&u1, movement(FIELD_ASSISTANT_1, KOPI, 20)).await.unwrap();
    s.stock_in.record_stock_in(&u2, delivery(FIELD_ASSISTANT_2, TEH, 80)).await.unwrap();
    s.stock_out.record_stock_out(&u2, movement(FIELD_ASSISTANT_2, TEH, 60)).await.unwrap();

    let window = SalesWindow::month(MonthBucket::of_date(today()));

    let global = s.availability.ranking(&manager(), &window, 10).await.unwrap();
    let order: Vec<Uuid> = global.data.iter().map(|r| r.product_id).collect();
    assert_eq!(order, vec![uid(TEH), uid(KOPI)]);
    assert_eq!(global.data[0].current_available, 20);
    assert_eq!(global.meta.total_qty_sold, 80);

    let own = s.availability.ranking(&u1, &window, 10).await.unwrap();
    assert_eq!(own.data.len(), 1);
    assert_eq!(own.data[0].product_id, uid(KOPI));
    assert_eq!(own.data[0].stock_in_period, 50);
    assert_eq!(own.data[0].current_available, 30);
    assert_eq!(own.data[0].percentage, 40.0);
}
