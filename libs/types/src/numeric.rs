//! Fixed-point decimal types for prices, quantities, and monetary amounts
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Every value is normalized to [`SCALE`] fractional digits with half-up
//! rounding before it is stored or compared, so intermediate results never
//! carry a different precision than the balances they affect.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Fractional digits carried by all monetary values
pub const SCALE: u32 = 8;

/// Normalize a decimal to [`SCALE`] digits, rounding half-up
pub fn normalize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Execution or limit price
///
/// Always strictly positive; market orders carry no price at all rather
/// than a zero price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, returning None unless strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        let value = normalize(value);
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from an integer number of quote units
    pub fn from_u64(value: u64) -> Self {
        Self(normalize(Decimal::from(value)))
    }

    /// Get the inner decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Price {
    type Err = crate::errors::NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)
            .map_err(|_| crate::errors::NumericError::Unparseable(s.to_string()))?;
        Self::try_new(value).ok_or(crate::errors::NumericError::NonPositivePrice(value))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order or fill quantity in base units
///
/// Never negative. Arithmetic that could go below zero uses `checked_sub`
/// so callers handle the violation explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a quantity, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        let value = normalize(value);
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The zero quantity
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the inner decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check for zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning None if the result would be negative
    pub fn checked_sub(&self, other: Quantity) -> Option<Self> {
        Self::try_new(self.0 - other.0)
    }

    /// The smaller of two quantities
    pub fn min(self, other: Quantity) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(normalize(self.0 + rhs.0))
    }
}

impl FromStr for Quantity {
    type Err = crate::errors::NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)
            .map_err(|_| crate::errors::NumericError::Unparseable(s.to_string()))?;
        Self::try_new(value).ok_or(crate::errors::NumericError::NegativeQuantity(value))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in a single currency
///
/// Non-negative magnitude; ledger rows attach the sign (credit/debit)
/// separately so an Amount in a message can never flip direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Create an amount, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        let value = normalize(value);
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Price × quantity, normalized
    pub fn from_price_quantity(price: Price, quantity: Quantity) -> Self {
        Self(normalize(price.as_decimal() * quantity.as_decimal()))
    }

    /// Get the inner decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check for zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, returning None if the result would be negative
    pub fn checked_sub(&self, other: Amount) -> Option<Self> {
        Self::try_new(self.0 - other.0)
    }

    /// Saturating subtraction, clamping at zero
    pub fn saturating_sub(&self, other: Amount) -> Self {
        self.checked_sub(other).unwrap_or_else(Amount::zero)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(normalize(self.0 + rhs.0))
    }
}

impl FromStr for Amount {
    type Err = crate::errors::NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)
            .map_err(|_| crate::errors::NumericError::Unparseable(s.to_string()))?;
        Self::try_new(value).ok_or(crate::errors::NumericError::NegativeAmount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_half_up() {
        let value = Decimal::from_str("1.234567895").unwrap();
        assert_eq!(normalize(value), Decimal::from_str("1.23456790").unwrap());

        let down = Decimal::from_str("1.234567894").unwrap();
        assert_eq!(normalize(down), Decimal::from_str("1.23456789").unwrap());
    }

    #[test]
    fn test_price_rejects_non_positive() {
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-5)).is_none());
        assert!(Price::try_new(Decimal::ONE).is_some());
    }

    #[test]
    fn test_price_from_str() {
        let price = Price::from_str("50000.5").unwrap();
        assert_eq!(price.as_decimal(), Decimal::from_str("50000.5").unwrap());
        assert!(Price::from_str("-1").is_err());
        assert!(Price::from_str("abc").is_err());
    }

    #[test]
    fn test_quantity_checked_sub() {
        let a = Quantity::from_str("1.5").unwrap();
        let b = Quantity::from_str("0.5").unwrap();
        assert_eq!(a.checked_sub(b), Some(Quantity::from_str("1.0").unwrap()));
        assert_eq!(b.checked_sub(a), None);
    }

    #[test]
    fn test_quantity_min() {
        let a = Quantity::from_str("2.0").unwrap();
        let b = Quantity::from_str("0.7").unwrap();
        assert_eq!(a.min(b), b);
        assert_eq!(b.min(a), b);
    }

    #[test]
    fn test_amount_from_price_quantity() {
        let price = Price::from_u64(10000);
        let qty = Quantity::from_str("0.1").unwrap();
        let amount = Amount::from_price_quantity(price, qty);
        assert_eq!(amount.as_decimal(), Decimal::from(1000));
    }

    #[test]
    fn test_amount_saturating_sub() {
        let a = Amount::from_str("1").unwrap();
        let b = Amount::from_str("3").unwrap();
        assert_eq!(a.saturating_sub(b), Amount::zero());
        assert_eq!(b.saturating_sub(a), Amount::from_str("2").unwrap());
    }

    #[test]
    fn test_scale_is_stable_through_serde() {
        let amount = Amount::from_str("0.00000001").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(amount, back);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_is_idempotent(raw in -1_000_000_000_000i64..1_000_000_000_000, scale in 0u32..16) {
                let value = Decimal::new(raw, scale);
                prop_assert_eq!(normalize(normalize(value)), normalize(value));
            }

            #[test]
            fn normalize_never_exceeds_scale(raw in -1_000_000_000_000i64..1_000_000_000_000, scale in 0u32..16) {
                let value = normalize(Decimal::new(raw, scale));
                prop_assert!(value.scale() <= SCALE);
            }

            #[test]
            fn amount_add_then_sub_round_trips(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
                let a = Amount::try_new(Decimal::from(a)).unwrap();
                let b = Amount::try_new(Decimal::from(b)).unwrap();
                prop_assert_eq!((a + b).checked_sub(b), Some(a));
            }
        }
    }
}
