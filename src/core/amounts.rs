//! Money and points arithmetic.
//!
//! Bills arrive as rupee [`Decimal`]s and are stored as whole paise. Points are
//! earned at a fixed rate of one point per `points_divisor` rupees, truncated,
//! and spent at one point per rupee of discount.

use crate::{
    config::LedgerConfig,
    errors::{Error, Result},
};
use rust_decimal::{Decimal, prelude::ToPrimitive};

const PAISE_PER_RUPEE: i64 = 100;

/// Converts a rupee amount to paise.
///
/// Fails with [`Error::InvalidAmount`] for negative amounts or amounts with a
/// fractional paisa.
pub fn to_paise(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    let scaled = amount * Decimal::from(PAISE_PER_RUPEE);
    if !scaled.fract().is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    scaled.to_i64().ok_or(Error::InvalidAmount { amount })
}

/// Converts paise back to a rupee amount with two decimal places.
#[must_use]
pub fn from_paise(paise: i64) -> Decimal {
    Decimal::new(paise, 2)
}

/// Points earned on a bill: `floor(bill / divisor)`.
///
/// Uses integer division on paise, so the result is truncated, never rounded.
#[must_use]
pub fn points_for_paise(bill_paise: i64, config: &LedgerConfig) -> i64 {
    let divisor_paise = (config.points_divisor * Decimal::from(PAISE_PER_RUPEE))
        .to_i64()
        .unwrap_or(i64::MAX)
        .max(1);
    bill_paise.max(0) / divisor_paise
}

/// Checks a bill against the configured maximum and returns it in paise.
pub fn bounded_bill(amount: Decimal, config: &LedgerConfig) -> Result<i64> {
    if amount > config.maximum_bill {
        return Err(Error::AmountOutOfRange {
            amount,
            maximum: config.maximum_bill,
        });
    }
    to_paise(amount)
}

/// Validates a purchase bill: within `[minimum_bill, maximum_bill]` and
/// earning at least one point.
pub fn qualifying_purchase(amount: Decimal, config: &LedgerConfig) -> Result<(i64, i64)> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::InvalidAmount { amount });
    }
    if amount < config.minimum_bill {
        return Err(Error::BelowMinimumAmount {
            amount,
            minimum: config.minimum_bill,
        });
    }
    let paise = bounded_bill(amount, config)?;
    let points = points_for_paise(paise, config);
    // only reachable when minimum_bill is configured below the divisor
    if points == 0 {
        return Err(Error::BelowMinimumAmount {
            amount,
            minimum: config.points_divisor,
        });
    }
    Ok((paise, points))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    fn points(amount: Decimal) -> i64 {
        points_for_paise(to_paise(amount).unwrap(), &LedgerConfig::default())
    }

    #[test]
    fn test_points_exact_multiples() {
        assert_eq!(points(dec!(50)), 1);
        assert_eq!(points(dec!(100)), 2);
        assert_eq!(points(dec!(1000)), 20);
        assert_eq!(points(dec!(10000)), 200);
    }

    #[test]
    fn test_points_truncate() {
        assert_eq!(points(dec!(49.99)), 0);
        assert_eq!(points(dec!(99.99)), 1);
        assert_eq!(points(dec!(149.50)), 2);
        assert_eq!(points(dec!(249)), 4);
        assert_eq!(points(dec!(9500)), 190);
    }

    #[test]
    fn test_to_paise_rejects_fractional_paisa() {
        assert!(matches!(
            to_paise(dec!(10.005)),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(to_paise(dec!(-1)), Err(Error::InvalidAmount { .. })));
        assert_eq!(to_paise(dec!(10.50)).unwrap(), 1050);
        assert_eq!(from_paise(1050), dec!(10.50));
    }

    #[test]
    fn test_qualifying_purchase_bounds() {
        let config = LedgerConfig::default();
        assert!(matches!(
            qualifying_purchase(dec!(25), &config),
            Err(Error::BelowMinimumAmount { .. })
        ));
        assert!(matches!(
            qualifying_purchase(dec!(49.99), &config),
            Err(Error::BelowMinimumAmount { .. })
        ));
        assert!(matches!(
            qualifying_purchase(dec!(100000000), &config),
            Err(Error::AmountOutOfRange { .. })
        ));
        assert_eq!(
            qualifying_purchase(dec!(99999999.99), &config).unwrap(),
            (9_999_999_999, 1_999_999)
        );
        assert_eq!(qualifying_purchase(dec!(50), &config).unwrap(), (5000, 1));
    }
}
