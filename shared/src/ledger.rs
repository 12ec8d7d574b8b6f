//! Availability aggregation over the stock-in and stock-out ledgers
//!
//! Everything here is pure: the backend loads the relevant ledger rows (with
//! the same active-row predicate applied in SQL) and folds them with these
//! functions, so the global and role-scoped figures come from one code path.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{AccessScope, Availability, AvailabilityRow, Kios, Product};
use crate::types::{filter_value, MonthBucket, ProductKiosPair};

/// Which ledger a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    In,
    Out,
}

impl Movement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Movement::In => "in",
            Movement::Out => "out",
        }
    }
}

/// The fields of a ledger row the aggregator needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub movement: Movement,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub kios_id: Uuid,
    pub quantity: i64,
    pub date: NaiveDate,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn pair(&self) -> ProductKiosPair {
        ProductKiosPair::new(self.product_id, self.kios_id)
    }

    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.max(self.created_at)
    }
}

/// Soft-delete and scope predicate applied to every ledger read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRowFilter {
    pub scope: AccessScope,
}

impl ActiveRowFilter {
    pub fn new(scope: AccessScope) -> Self {
        Self { scope }
    }

    pub fn global() -> Self {
        Self::new(AccessScope::Global)
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        !entry.is_deleted && self.scope.admits(entry.user_id)
    }
}

/// Aggregate of one pair plus the activity timestamp used for month grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairAggregate {
    pub pair: ProductKiosPair,
    pub availability: Availability,
    pub latest_activity: Option<DateTime<Utc>>,
}

impl PairAggregate {
    pub fn month(&self) -> Option<MonthBucket> {
        self.latest_activity.map(MonthBucket::of_timestamp)
    }
}

#[derive(Default)]
struct Accumulator {
    total_in: i64,
    total_out: i64,
    last_in: Option<NaiveDate>,
    last_out: Option<NaiveDate>,
    latest_activity: Option<DateTime<Utc>>,
}

impl Accumulator {
    fn push(&mut self, entry: &LedgerEntry) {
        match entry.movement {
            Movement::In => {
                self.total_in += entry.quantity;
                self.last_in = self.last_in.max(Some(entry.date));
            }
            Movement::Out => {
                self.total_out += entry.quantity;
                self.last_out = self.last_out.max(Some(entry.date));
            }
        }
        self.latest_activity = self.latest_activity.max(Some(entry.last_touched()));
    }

    fn finish(self) -> (Availability, Option<DateTime<Utc>>) {
        (
            Availability::from_totals(self.total_in, self.total_out, self.last_in, self.last_out),
            self.latest_activity,
        )
    }
}

/// Availability of one pair over the rows the filter admits
pub fn aggregate<'a, I>(entries: I, filter: &ActiveRowFilter, pair: ProductKiosPair) -> Availability
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut acc = Accumulator::default();
    for entry in entries {
        if entry.pair() == pair && filter.matches(entry) {
            acc.push(entry);
        }
    }
    acc.finish().0
}

/// One aggregate per pair with at least one admitted row, ordered by pair
pub fn aggregate_all_pairs<'a, I>(entries: I, filter: &ActiveRowFilter) -> Vec<PairAggregate>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut by_pair: BTreeMap<ProductKiosPair, Accumulator> = BTreeMap::new();
    for entry in entries {
        if filter.matches(entry) {
            by_pair.entry(entry.pair()).or_default().push(entry);
        }
    }

    by_pair
        .into_iter()
        .map(|(pair, acc)| {
            let (availability, latest_activity) = acc.finish();
            PairAggregate {
                pair,
                availability,
                latest_activity,
            }
        })
        .collect()
}

/// Attach product and kios data; pairs whose product or kios is missing or
/// soft-deleted are dropped
pub fn join_catalog(
    aggregates: Vec<PairAggregate>,
    products: &HashMap<Uuid, Product>,
    kiosks: &HashMap<Uuid, Kios>,
) -> Vec<AvailabilityRow> {
    aggregates
        .into_iter()
        .filter_map(|agg| {
            let product = products.get(&agg.pair.product_id).filter(|p| !p.is_deleted)?;
            let kios = kiosks.get(&agg.pair.kios_id).filter(|k| !k.is_deleted)?;
            Some(AvailabilityRow {
                product_id: agg.pair.product_id,
                kios_id: agg.pair.kios_id,
                availability: agg.availability,
                latest_activity: agg.latest_activity,
                month: agg.month(),
                product: product.into(),
                kios: kios.into(),
            })
        })
        .collect()
}

/// Raw query parameters accepted by ledger listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerQuery {
    pub kios_id: Option<String>,
    pub date: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
}

/// Parsed ledger listing filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerListFilter {
    pub kios_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub month: Option<MonthBucket>,
    pub year: Option<i32>,
}

impl LedgerListFilter {
    pub fn parse(query: &LedgerQuery) -> Result<Self, LedgerError> {
        let kios_id = filter_value(query.kios_id.as_deref())
            .map(|v| {
                Uuid::parse_str(v).map_err(|_| LedgerError::invalid("kios_id", "Invalid kios id"))
            })
            .transpose()?;

        let date = filter_value(query.date.as_deref())
            .map(|v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                    LedgerError::invalid(
                        "date",
                        "Invalid date format. Use YYYY-MM-DD (e.g. 2025-12-20)",
                    )
                })
            })
            .transpose()?;

        let month = filter_value(query.month.as_deref())
            .map(str::parse::<MonthBucket>)
            .transpose()?;

        let year = filter_value(query.year.as_deref())
            .map(|v| {
                v.parse::<i32>()
                    .ok()
                    .filter(|y| (1900..=9999).contains(y))
                    .ok_or_else(|| {
                        LedgerError::invalid("year", "Invalid year format. Use YYYY (e.g. 2025)")
                    })
            })
            .transpose()?;

        Ok(Self {
            kios_id,
            date,
            month,
            year,
        })
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.kios_id.map_or(true, |k| entry.kios_id == k)
            && self.date.map_or(true, |d| entry.date == d)
            && self.month.map_or(true, |m| m.contains(entry.date))
            && self.year.map_or(true, |y| entry.date.year() == y)
    }
}
