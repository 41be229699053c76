//! Precision-safe decimal types for trading.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors in cash, cost basis and share counts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Decimal places kept when sizing fractional share counts.
pub const SHARE_SCALE: u32 = 4;

/// Price per share with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with share counts in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Calculate percentage difference from another price.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::ONE_HUNDRED)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Share count with exact decimal precision. Fractional shares are allowed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Shares(pub Decimal);

impl Shares {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Market value of this many shares: shares * price.
    #[inline]
    pub fn value_at(&self, price: Price) -> Decimal {
        self.0 * price.0
    }

    /// Round down to `SHARE_SCALE` decimal places.
    #[inline]
    pub fn round_down(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(SHARE_SCALE, RoundingStrategy::ToZero),
        )
    }

    /// Fraction `self / whole`, or `None` when `whole` is zero.
    #[inline]
    pub fn fraction_of(&self, whole: Shares) -> Option<Decimal> {
        if whole.is_zero() {
            return None;
        }
        Some(self.0 / whole.0)
    }

    /// Largest share count whose cost at `price` does not exceed `budget`.
    ///
    /// Returns zero when the price is not positive.
    pub fn affordable(budget: Decimal, price: Price) -> Self {
        if !price.is_positive() || budget <= Decimal::ZERO {
            return Self::ZERO;
        }
        Self(budget / price.0).round_down()
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Shares {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Shares {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Shares {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Shares {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Shares {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Shares {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}
