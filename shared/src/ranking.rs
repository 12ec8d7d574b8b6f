//! Product sales ranking over the stock-out ledger
//!
//! A sale is an active stock-out row. Products are ranked by the quantity
//! dispatched inside a reporting window, next to what was delivered in the
//! same window and what is still on hand.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::{ActiveRowFilter, LedgerEntry, LedgerListFilter, LedgerQuery, Movement, PairAggregate};
use crate::models::{Product, ProductSummary};
use crate::types::{filter_value, MonthBucket};

pub const DEFAULT_RANKING_LIMIT: usize = 100;
pub const MAX_RANKING_LIMIT: usize = 1000;

/// Raw query parameters of the ranking endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingQuery {
    pub month: Option<String>,
    pub year: Option<String>,
    pub limit: Option<String>,
}

/// Reporting window: one month, or a whole year when only `year` is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesWindow {
    filter: LedgerListFilter,
    start: NaiveDate,
    end: NaiveDate,
}

impl SalesWindow {
    pub fn month(month: MonthBucket) -> Self {
        Self {
            filter: LedgerListFilter {
                month: Some(month),
                ..Default::default()
            },
            start: month.first_day(),
            end: month.last_day(),
        }
    }

    pub fn year(year: i32) -> Self {
        let january = MonthBucket { year, month: 1 };
        let december = MonthBucket { year, month: 12 };
        Self {
            filter: LedgerListFilter {
                year: Some(year),
                ..Default::default()
            },
            start: january.first_day(),
            end: december.last_day(),
        }
    }

    /// `month` wins over `year`; with neither, the month containing `today`
    pub fn parse(query: &RankingQuery, today: NaiveDate) -> Result<Self, LedgerError> {
        let parsed = LedgerListFilter::parse(&LedgerQuery {
            month: query.month.clone(),
            year: query.year.clone(),
            ..Default::default()
        })?;

        Ok(match (parsed.month, parsed.year) {
            (Some(month), _) => Self::month(month),
            (None, Some(year)) => Self::year(year),
            (None, None) => Self::month(MonthBucket::of_date(today)),
        })
    }

    /// The month before the window starts; growth is measured against it
    pub fn previous_month(&self) -> Self {
        Self::month(MonthBucket::of_date(self.start).previous())
    }

    pub fn contains(&self, entry: &LedgerEntry) -> bool {
        self.filter.matches(entry)
    }

    pub fn period(&self) -> SalesPeriod {
        let month = MonthBucket::of_date(self.start);
        SalesPeriod {
            start: self.start,
            end: self.end,
            month,
            year: self.start.year(),
            month_name: self.start.format("%B %Y").to_string(),
        }
    }
}

/// How many ranking rows to return
pub fn parse_limit(raw: Option<&str>) -> Result<usize, LedgerError> {
    match filter_value(raw) {
        None => Ok(DEFAULT_RANKING_LIMIT),
        Some(v) => v
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_RANKING_LIMIT).contains(n))
            .ok_or_else(|| {
                LedgerError::invalid("limit", "Limit must be a number between 1 and 1000")
            }),
    }
}

/// Reporting window as echoed back to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub month: MonthBucket,
    pub year: i32,
    pub month_name: String,
}

/// One product's line in the ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRanking {
    pub product_id: Uuid,
    pub product: ProductSummary,
    pub qty_sold: i64,
    pub transactions: i64,
    pub stock_in_period: i64,
    pub current_available: i64,
    /// Sold as a share of what was delivered in the window
    pub percentage: f64,
    /// Growth of the sold quantity against the previous month
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingMeta {
    pub period: SalesPeriod,
    pub total_products: usize,
    pub total_qty_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRankingReport {
    pub data: Vec<ProductRanking>,
    pub meta: RankingMeta,
}

#[derive(Default)]
struct ProductTally {
    sold: i64,
    transactions: i64,
    delivered: i64,
    sold_previous: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(sold: i64, delivered: i64) -> f64 {
    if delivered > 0 {
        round2(sold as f64 / delivered as f64 * 100.0)
    } else {
        0.0
    }
}

fn change_percentage(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        round2((current - previous) as f64 / previous as f64 * 100.0)
    } else if current > 0 {
        100.0
    } else {
        0.0
    }
}

/// Stock on hand per product: the sum of its pairs' availability
pub fn available_by_product(aggregates: &[PairAggregate]) -> HashMap<Uuid, i64> {
    let mut by_product = HashMap::new();
    for agg in aggregates {
        *by_product.entry(agg.pair.product_id).or_insert(0) += agg.availability.available;
    }
    by_product
}

/// Rank products by quantity sold in `window`.
///
/// Only rows `filter` admits are counted. Products that are missing or
/// soft-deleted in the catalog are left out before `limit` applies. Ties
/// are broken by product id so the order is stable.
pub fn rank_products<'a, I>(
    entries: I,
    filter: &ActiveRowFilter,
    window: &SalesWindow,
    current_available: &HashMap<Uuid, i64>,
    products: &HashMap<Uuid, Product>,
    limit: usize,
) -> ProductRankingReport
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let previous = window.previous_month();
    let mut tallies: HashMap<Uuid, ProductTally> = HashMap::new();
    let mut delivered: HashMap<Uuid, i64> = HashMap::new();

    for entry in entries.into_iter().filter(|e| filter.matches(e)) {
        match entry.movement {
            Movement::Out => {
                if window.contains(entry) {
                    let tally = tallies.entry(entry.product_id).or_default();
                    tally.sold += entry.quantity;
                    tally.transactions += 1;
                }
                if previous.contains(entry) {
                    tallies.entry(entry.product_id).or_default().sold_previous += entry.quantity;
                }
            }
            Movement::In => {
                if window.contains(entry) {
                    *delivered.entry(entry.product_id).or_insert(0) += entry.quantity;
                }
            }
        }
    }

    let mut ranked: Vec<(Uuid, ProductTally)> = tallies
        .into_iter()
        .filter(|(_, tally)| tally.transactions > 0)
        .map(|(product_id, mut tally)| {
            tally.delivered = delivered.get(&product_id).copied().unwrap_or(0);
            (product_id, tally)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.sold.cmp(&a.1.sold).then(a.0.cmp(&b.0)));

    let data: Vec<ProductRanking> = ranked
        .into_iter()
        .filter_map(|(product_id, tally)| {
            let product = products.get(&product_id).filter(|p| !p.is_deleted)?;
            Some(ProductRanking {
                product_id,
                product: product.into(),
                qty_sold: tally.sold,
                transactions: tally.transactions,
                stock_in_period: tally.delivered,
                current_available: current_available.get(&product_id).copied().unwrap_or(0),
                percentage: percentage(tally.sold, tally.delivered),
                change_percentage: change_percentage(tally.sold, tally.sold_previous),
            })
        })
        .take(limit)
        .collect();

    let meta = RankingMeta {
        period: window.period(),
        total_products: data.len(),
        total_qty_sold: data.iter().map(|r| r.qty_sold).sum(),
    };
    ProductRankingReport { data, meta }
}
