//! Resync planning for the availability snapshot table
//!
//! The snapshot is a derived index over the global ledger. It is never patched
//! incrementally: every resync recomputes the pair's aggregate and overwrites
//! the row, inserts it on first activity, or leaves the table untouched when
//! the pair has never seen any activity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Availability, AvailabilitySnapshot};
use crate::types::ProductKiosPair;

/// What a resync must do to the snapshot table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncAction {
    /// Overwrite the existing active row
    Update { snapshot_id: Uuid, fresh: Availability },
    /// First activity for this pair
    Insert { fresh: Availability },
    /// No row and no activity
    Skip,
}

/// Decide the resync action from the current active row and a fresh global
/// aggregate
pub fn plan_resync(existing: Option<&AvailabilitySnapshot>, fresh: Availability) -> ResyncAction {
    match existing {
        Some(snapshot) => ResyncAction::Update {
            snapshot_id: snapshot.id,
            fresh,
        },
        None if fresh.has_activity() => ResyncAction::Insert { fresh },
        None => ResyncAction::Skip,
    }
}

/// Apply a resync to an in-memory snapshot, mirroring what the SQL layer does
pub fn apply_resync(
    existing: Option<AvailabilitySnapshot>,
    pair: ProductKiosPair,
    fresh: Availability,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Option<AvailabilitySnapshot> {
    match plan_resync(existing.as_ref(), fresh) {
        ResyncAction::Update { fresh, .. } => existing.map(|snapshot| AvailabilitySnapshot {
            last_in_date: fresh.last_in_date,
            quantity_in: fresh.total_in,
            last_out_date: fresh.last_out_date,
            quantity_out: fresh.total_out,
            quantity_available: fresh.available,
            updated_by: Some(actor_id),
            updated_at: now,
            ..snapshot
        }),
        ResyncAction::Insert { fresh } => Some(AvailabilitySnapshot {
            id: Uuid::new_v4(),
            product_id: pair.product_id,
            kios_id: pair.kios_id,
            last_in_date: fresh.last_in_date,
            quantity_in: fresh.total_in,
            last_out_date: fresh.last_out_date,
            quantity_out: fresh.total_out,
            quantity_available: fresh.available,
            is_deleted: false,
            created_by: Some(actor_id),
            updated_by: Some(actor_id),
            created_at: now,
            updated_at: now,
        }),
        ResyncAction::Skip => None,
    }
}
