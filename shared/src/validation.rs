//! Validation for stock movements
//!
//! Field-level checks (quantity bounds, non-future business dates) run first;
//! the sufficiency gate for stock-out writes runs last, against an
//! availability figure computed under the actor's scope.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::error::LedgerError;
use crate::types::ProductKiosPair;

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 999_999;

// ============================================================================
// Movement Inputs
// ============================================================================

/// Fields shared by stock-in and stock-out writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MovementInput {
    /// User the movement is attributed to
    pub user_id: Uuid,
    pub kios_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999999, message = "Quantity must be between 1 and 999999"))]
    pub quantity: i64,
    pub date: NaiveDate,
}

impl MovementInput {
    pub fn pair(&self) -> ProductKiosPair {
        ProductKiosPair::new(self.product_id, self.kios_id)
    }
}

/// Stock-in write: a movement plus an optional receipt photo reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StockInInput {
    pub user_id: Uuid,
    pub kios_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999999, message = "Quantity must be between 1 and 999999"))]
    pub quantity: i64,
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 255, message = "Photo reference must be 1-255 characters"))]
    pub photo_ref: Option<String>,
}

impl StockInInput {
    pub fn movement(&self) -> MovementInput {
        MovementInput {
            user_id: self.user_id,
            kios_id: self.kios_id,
            product_id: self.product_id,
            quantity: self.quantity,
            date: self.date,
        }
    }
}

/// Stock-out writes carry no extra fields
pub type StockOutInput = MovementInput;

/// Map the first field error into a `LedgerError`, by field name order
fn first_field_error(errors: ValidationErrors) -> LedgerError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    fields
        .into_iter()
        .next()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for {}", field));
            LedgerError::invalid(field, message)
        })
        .unwrap_or_else(|| LedgerError::invalid("input", "Invalid input"))
}

// ============================================================================
// Dates
// ============================================================================

/// Calendar day of `now` in the operator's local time
pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// Business dates may not lie in the future
pub fn validate_business_date(date: NaiveDate, today: NaiveDate) -> Result<(), LedgerError> {
    if date > today {
        return Err(LedgerError::invalid("date", "Date cannot be in the future"));
    }
    Ok(())
}

/// Validate quantity bounds and the business date of a movement
pub fn validate_movement(input: &MovementInput, today: NaiveDate) -> Result<(), LedgerError> {
    input.validate().map_err(first_field_error)?;
    validate_business_date(input.date, today)
}

/// Validate a stock-in write, including its photo reference
pub fn validate_stock_in(input: &StockInInput, today: NaiveDate) -> Result<(), LedgerError> {
    input.validate().map_err(first_field_error)?;
    validate_business_date(input.date, today)
}

// ============================================================================
// Sufficiency Gate
// ============================================================================

/// The stored version of a stock-out row being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorMovement {
    pub pair: ProductKiosPair,
    pub quantity: i64,
}

/// Available stock a stock-out may consume.
///
/// When an edit keeps the same pair, the row's own prior quantity is still
/// counted as dispatched in `available`, so it is added back. When the pair
/// changes the new pair is checked as a fresh create.
pub fn effective_available(
    available: i64,
    target: ProductKiosPair,
    prior: Option<&PriorMovement>,
) -> i64 {
    match prior {
        Some(prior) if prior.pair == target => available + prior.quantity,
        _ => available,
    }
}

/// Reject a stock-out whose quantity exceeds the effective availability
pub fn check_sufficiency(
    available: i64,
    requested: i64,
    target: ProductKiosPair,
    prior: Option<&PriorMovement>,
) -> Result<(), LedgerError> {
    let effective = effective_available(available, target, prior);
    if effective < requested {
        return Err(LedgerError::InsufficientStock {
            available: effective,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(quantity: i64, date: NaiveDate) -> MovementInput {
        MovementInput {
            user_id: Uuid::from_u128(1),
            kios_id: Uuid::from_u128(20),
            product_id: Uuid::from_u128(10),
            quantity,
            date,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 20).unwrap()
    }

    // ========================================================================
    // Field Validation Tests
    // ========================================================================

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_movement(&input(1, today()), today()).is_ok());
        assert!(validate_movement(&input(999_999, today()), today()).is_ok());

        for bad in [0, -5, 1_000_000, 10_000_000] {
            match validate_movement(&input(bad, today()), today()) {
                Err(LedgerError::InvalidInput { field, .. }) => assert_eq!(field, "quantity"),
                other => panic!("expected invalid quantity for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_future_date_rejected() {
        let tomorrow = today().succ_opt().unwrap();
        match validate_movement(&input(5, tomorrow), today()) {
            Err(LedgerError::InvalidInput { field, .. }) => assert_eq!(field, "date"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(validate_movement(&input(5, today()), today()).is_ok());
    }

    #[test]
    fn test_local_today_uses_offset() {
        // 2025-12-20 20:00 UTC is already 2025-12-21 in UTC+7
        let now = DateTime::parse_from_rfc3339("2025-12-20T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let wib = FixedOffset::east_opt(7 * 3600).unwrap();
        assert_eq!(local_today(now, wib), NaiveDate::from_ymd_opt(2025, 12, 21).unwrap());
        assert_eq!(local_today(now, FixedOffset::east_opt(0).unwrap()), today());
    }

    #[test]
    fn test_photo_ref_length() {
        let mut stock_in = StockInInput {
            user_id: Uuid::from_u128(1),
            kios_id: Uuid::from_u128(20),
            product_id: Uuid::from_u128(10),
            quantity: 3,
            date: today(),
            photo_ref: Some("nota/abc.jpg".to_string()),
        };
        assert!(validate_stock_in(&stock_in, today()).is_ok());

        stock_in.photo_ref = Some("x".repeat(300));
        assert!(matches!(
            validate_stock_in(&stock_in, today()),
            Err(LedgerError::InvalidInput { .. })
        ));
    }

    // ========================================================================
    // Sufficiency Tests
    // ========================================================================

    #[test]
    fn test_create_requires_full_availability() {
        let pair = ProductKiosPair::new(Uuid::from_u128(10), Uuid::from_u128(20));
        assert!(check_sufficiency(100, 100, pair, None).is_ok());
        assert_eq!(
            check_sufficiency(100, 150, pair, None),
            Err(LedgerError::InsufficientStock { available: 100 })
        );
    }

    #[test]
    fn test_edit_same_pair_adds_back_prior_quantity() {
        let pair = ProductKiosPair::new(Uuid::from_u128(10), Uuid::from_u128(20));
        let prior = PriorMovement {
            pair,
            quantity: 40,
        };
        // 60 left after the row's own 40 was dispatched
        assert!(check_sufficiency(60, 100, pair, Some(&prior)).is_ok());
        assert_eq!(
            check_sufficiency(60, 101, pair, Some(&prior)),
            Err(LedgerError::InsufficientStock { available: 100 })
        );
    }

    #[test]
    fn test_edit_changed_pair_has_no_add_back() {
        let old_pair = ProductKiosPair::new(Uuid::from_u128(10), Uuid::from_u128(20));
        let new_pair = ProductKiosPair::new(Uuid::from_u128(11), Uuid::from_u128(20));
        let prior = PriorMovement {
            pair: old_pair,
            quantity: 40,
        };
        assert_eq!(effective_available(10, new_pair, Some(&prior)), 10);
        assert!(check_sufficiency(10, 11, new_pair, Some(&prior)).is_err());
    }
}
