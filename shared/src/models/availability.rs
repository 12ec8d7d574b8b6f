//! Availability figures, the persisted snapshot and listing rows

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{KiosSummary, ProductSummary};
use crate::error::LedgerError;
use crate::types::{filter_value, MonthBucket};

/// Stock totals for one (product, kios) pair under some scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Availability {
    pub total_in: i64,
    pub total_out: i64,
    /// Always `max(0, total_in - total_out)`
    pub available: i64,
    pub last_in_date: Option<NaiveDate>,
    pub last_out_date: Option<NaiveDate>,
}

impl Availability {
    pub fn from_totals(
        total_in: i64,
        total_out: i64,
        last_in_date: Option<NaiveDate>,
        last_out_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            total_in,
            total_out,
            available: (total_in - total_out).max(0),
            last_in_date,
            last_out_date,
        }
    }

    pub fn has_activity(&self) -> bool {
        self.total_in > 0 || self.total_out > 0
    }
}

/// Persisted global availability for one pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub id: Uuid,
    pub product_id: Uuid,
    pub kios_id: Uuid,
    pub last_in_date: Option<NaiveDate>,
    pub quantity_in: i64,
    pub last_out_date: Option<NaiveDate>,
    pub quantity_out: i64,
    pub quantity_available: i64,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    pub fn availability(&self) -> Availability {
        Availability {
            total_in: self.quantity_in,
            total_out: self.quantity_out,
            available: self.quantity_available,
            last_in_date: self.last_in_date,
            last_out_date: self.last_out_date,
        }
    }

    /// Later of creation and last update
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.max(self.created_at)
    }
}

/// One line of an availability listing, joined with catalog data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRow {
    pub product_id: Uuid,
    pub kios_id: Uuid,
    #[serde(flatten)]
    pub availability: Availability,
    pub latest_activity: Option<DateTime<Utc>>,
    pub month: Option<MonthBucket>,
    pub product: ProductSummary,
    pub kios: KiosSummary,
}

/// Raw query parameters of an availability listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub kios_id: Option<String>,
    pub month: Option<String>,
}

/// Optional filters on an availability listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityFilter {
    pub kios_id: Option<Uuid>,
    pub month: Option<MonthBucket>,
}

impl AvailabilityFilter {
    /// Empty values and `all` mean no filter
    pub fn parse(query: &AvailabilityQuery) -> Result<Self, LedgerError> {
        let kios_id = filter_value(query.kios_id.as_deref())
            .map(|v| {
                Uuid::parse_str(v).map_err(|_| LedgerError::invalid("kios_id", "Invalid kios id"))
            })
            .transpose()?;
        let month = filter_value(query.month.as_deref())
            .map(str::parse::<MonthBucket>)
            .transpose()?;
        Ok(Self { kios_id, month })
    }

    pub fn matches(&self, row: &AvailabilityRow) -> bool {
        if let Some(kios_id) = self.kios_id {
            if row.kios_id != kios_id {
                return false;
            }
        }
        match self.month {
            Some(month) => row.month == Some(month),
            None => true,
        }
    }

    pub fn apply(&self, rows: Vec<AvailabilityRow>) -> Vec<AvailabilityRow> {
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Totals over a (filtered) availability listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub total_products: usize,
    pub total_in: i64,
    pub total_out: i64,
    pub total_available: i64,
}

impl AvailabilitySummary {
    pub fn from_rows(rows: &[AvailabilityRow]) -> Self {
        rows.iter().fold(
            AvailabilitySummary {
                total_products: rows.len(),
                ..Default::default()
            },
            |acc, row| AvailabilitySummary {
                total_in: acc.total_in + row.availability.total_in,
                total_out: acc.total_out + row.availability.total_out,
                total_available: acc.total_available + row.availability.available,
                ..acc
            },
        )
    }
}

/// Listing response: rows plus their summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityListing {
    pub data: Vec<AvailabilityRow>,
    pub summary: AvailabilitySummary,
}

impl AvailabilityListing {
    pub fn new(data: Vec<AvailabilityRow>) -> Self {
        let summary = AvailabilitySummary::from_rows(&data);
        Self { data, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kios: u128, available: i64, month: Option<MonthBucket>) -> AvailabilityRow {
        AvailabilityRow {
            product_id: Uuid::from_u128(10),
            kios_id: Uuid::from_u128(kios),
            availability: Availability::from_totals(available + 5, 5, None, None),
            latest_activity: None,
            month,
            product: ProductSummary {
                id: Uuid::from_u128(10),
                name: "Kopi Sachet".to_string(),
                package_unit: "Renteng".to_string(),
                unit: None,
            },
            kios: KiosSummary {
                id: Uuid::from_u128(kios),
                name: format!("Kios {}", kios),
            },
        }
    }

    #[test]
    fn test_from_totals_clamps_at_zero() {
        assert_eq!(Availability::from_totals(5, 9, None, None).available, 0);
        assert_eq!(Availability::from_totals(9, 5, None, None).available, 4);
    }

    #[test]
    fn test_filter_parse_all_means_no_filter() {
        let query = AvailabilityQuery {
            kios_id: Some("all".to_string()),
            month: Some(String::new()),
        };
        assert_eq!(AvailabilityFilter::parse(&query).unwrap(), AvailabilityFilter::default());
    }

    #[test]
    fn test_filter_parse_rejects_bad_month() {
        let query = AvailabilityQuery {
            kios_id: None,
            month: Some("12-2025".to_string()),
        };
        assert!(matches!(
            AvailabilityFilter::parse(&query),
            Err(LedgerError::InvalidInput { ref field, .. }) if field == "month"
        ));
    }

    #[test]
    fn test_filter_and_summary() {
        let december = MonthBucket::new(2025, 12).unwrap();
        let rows = vec![
            row(20, 10, Some(december)),
            row(21, 7, Some(december)),
            row(20, 3, MonthBucket::new(2025, 11).ok()),
        ];
        let filter = AvailabilityFilter {
            kios_id: Some(Uuid::from_u128(20)),
            month: Some(december),
        };
        let listing = AvailabilityListing::new(filter.apply(rows));
        assert_eq!(listing.data.len(), 1);
        assert_eq!(listing.summary.total_products, 1);
        assert_eq!(listing.summary.total_available, 10);
        assert_eq!(listing.summary.total_in, 15);
        assert_eq!(listing.summary.total_out, 5);
    }
}
