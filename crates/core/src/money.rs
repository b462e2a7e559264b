//! Monetary amounts.
//!
//! Amounts are exact decimals. Arithmetic never rounds; rounding to two places
//! happens once, at the reporting boundary, via [`Money::round2`] / [`round2`].

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a decimal to two places, midpoints away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Signed monetary amount (no currency; one currency per tenant).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Two-decimal presentation value.
    pub fn round2(&self) -> Money {
        Money(round2(self.0))
    }

    /// `percentage` percent of this amount (unrounded).
    pub fn percent(&self, percentage: Decimal) -> Money {
        Money(self.0 * percentage / Decimal::ONE_HUNDRED)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round2_moves_midpoints_away_from_zero() {
        assert_eq!(round2(dec!(10.525)), dec!(10.53));
        assert_eq!(round2(dec!(-10.525)), dec!(-10.53));
        assert_eq!(round2(dec!(10.524)), dec!(10.52));
    }

    #[test]
    fn sums_do_not_round_intermediate_values() {
        let parts = vec![Money::new(dec!(0.005)); 3];
        let total: Money = parts.iter().sum();
        assert_eq!(total.amount(), dec!(0.015));
        assert_eq!(total.round2().amount(), dec!(0.02));
    }

    #[test]
    fn percent_is_exact() {
        let m = Money::new(dec!(1000));
        assert_eq!(m.percent(dec!(12.5)).amount(), dec!(125));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_value(Money::new(dec!(1500.50))).unwrap();
        assert_eq!(json, serde_json::json!("1500.50"));
        let back: Money = serde_json::from_value(serde_json::json!(1500.5)).unwrap();
        assert_eq!(back.amount(), dec!(1500.5));
    }

    proptest! {
        #[test]
        fn summing_mills_is_exact_and_rounds_once(mills in prop::collection::vec(-1_000_000i64..1_000_000, 0..50)) {
            let total: Money = mills.iter().map(|m| Money::new(Decimal::new(*m, 3))).sum();
            let expected: i64 = mills.iter().sum();
            prop_assert_eq!(total.amount(), Decimal::new(expected, 3));

            let rounded = total.round2().amount();
            prop_assert!((rounded - total.amount()).abs() <= dec!(0.005));
            prop_assert_eq!(round2(rounded), rounded);
        }
    }
}
