//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents (fixed point, 2 fraction digits)           │
//! │    Every amount is an i64 count of cents.                               │
//! │    Rounding happens in exactly two places: tax and percentage discount. │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use grocer_core::money::Money;
//!
//! let price: Money = "2.50".parse().unwrap();
//! assert_eq!(price.cents(), 250);
//!
//! let line = price * 4_i64;
//! assert_eq!(line.to_string(), "$10.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Basis points in 100%.
const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in cents.
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds are stored as negated sales
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► CartLine.unit_price ──► SaleItem.unit_price    │
/// │                                                                         │
/// │  Σ line subtotals ──► discount ──► tax ──► Sale.total                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from dollars and cents.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax using Bankers Rounding (round half to even).
    ///
    /// ## Bankers Rounding Explained
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  Standard rounding always rounds 0.5 UP, causing systematic bias:  │
    /// │    0.5 → 1, 1.5 → 2, 2.5 → 3, 3.5 → 4 (always up = +bias)         │
    /// │                                                                     │
    /// │  Bankers Rounding rounds 0.5 to nearest EVEN number:               │
    /// │    0.5 → 0, 1.5 → 2, 2.5 → 2, 3.5 → 4 (alternates = no bias)      │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ```rust
    /// use grocer_core::money::Money;
    /// use grocer_core::types::TaxRate;
    ///
    /// let amount = Money::from_cents(1000); // $10.00
    /// let tax = amount.calculate_tax(TaxRate::from_bps(800)); // 8%
    /// assert_eq!(tax.cents(), 80);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// Returns `bps / 10000` of this amount, rounded half-to-even to the cent.
    ///
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10000); // $100.00
    /// assert_eq!(subtotal.percentage(1000).cents(), 1000); // 10% = $10.00
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        // i128 so large totals cannot overflow before the division
        let cents = round_half_even(self.0 as i128 * bps as i128, BPS_SCALE);
        Money(cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Like [`Money::multiply_quantity`], `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `self + other`, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Scales this amount by `part / whole`, rounded half-to-even.
    ///
    /// Returns zero when `whole` is zero.
    ///
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let discount = Money::from_cents(300);
    /// let share = discount.prorate(Money::from_cents(500), Money::from_cents(1500));
    /// assert_eq!(share.cents(), 100);
    /// ```
    pub fn prorate(&self, part: Money, whole: Money) -> Money {
        if whole.0 == 0 {
            return Money::zero();
        }
        let mut numerator = self.0 as i128 * part.0 as i128;
        let mut denominator = whole.0 as i128;
        if denominator < 0 {
            numerator = -numerator;
            denominator = -denominator;
        }
        Money(round_half_even(numerator, denominator) as i64)
    }
}

/// Divides and rounds the quotient half-to-even. `denominator` must be positive.
fn round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = (numerator % denominator).abs();
    let twice = remainder * 2;

    if twice > denominator || (twice == denominator && quotient % 2 != 0) {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

/// Parses a decimal string with at most two fraction digits into hundredths.
///
/// `"2.5"` → 250, `"-0.05"` → -5, `"8"` → 800. Used for both money (cents)
/// and percentages (basis points).
pub(crate) fn parse_hundredths(field: &str, input: &str) -> Result<i64, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("expected a decimal number"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("expected a decimal number"));
    }
    if fraction.len() > 2 {
        return Err(invalid("at most 2 decimal places"));
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("number too large"))?
    };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
        _ => fraction.parse().map_err(|_| invalid("bad fraction"))?,
    };

    let magnitude = whole_value
        .checked_mul(100)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| invalid("number too large"))?;

    Ok(if negative { -magnitude } else { magnitude })
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money as `$12.34` / `-$5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    /// Parses `"12.34"`, `"12.3"`, `"12"` or `"-0.50"` exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths("amount", s).map(Money)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation, used to mirror a sale into a refund.
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
