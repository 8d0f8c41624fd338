//! # Money Module
//!
//! Provides the `Money` type for presenting monetary values.
//!
//! ## Why Exact Decimals?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE DRIFT PROBLEM                                                      │
//! │                                                                         │
//! │  Conversational editing recalculates the same document many times:     │
//! │    "add a line" → recompute, "change tax to 8.25%" → recompute, ...    │
//! │                                                                         │
//! │  If every recompute rounded to cents, each pass could move the total   │
//! │  by a cent. After enough edits the stored total no longer equals       │
//! │  (subtotal − discount) + tax.                                          │
//! │                                                                         │
//! │  OUR SOLUTION: keep full precision (rust_decimal), round ONLY here,    │
//! │  at presentation time.                                                 │
//! │    stored:    8.2500 tax on 100.00                                     │
//! │    displayed: $8.25                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use billwise_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let total = Money::new(Decimal::new(110005, 3)); // 110.005
//! assert_eq!(total.to_string(), "110.01");
//! assert_eq!(total.format_currency("USD"), "$110.01");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Decimal places shown to people.
pub const DISPLAY_DECIMALS: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount at full precision.
///
/// ## Design Decisions
/// - **Decimal (signed)**: discounts larger than the subtotal are allowed
///   to go negative instead of being silently clamped
/// - **Single field tuple struct**: zero-cost wrapper
/// - **Rounding on display only**: see module docs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Wraps an exact decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// The unrounded amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Rounds half away from zero to two places and pins the scale to two,
    /// so `110` becomes `110.00`.
    ///
    /// ## Example
    /// ```rust
    /// use billwise_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Money::new(Decimal::new(825, 3)).rounded(), Decimal::new(83, 2));
    /// ```
    pub fn rounded(&self) -> Decimal {
        let mut rounded = self
            .0
            .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(DISPLAY_DECIMALS);
        rounded
    }

    /// Formats with the currency symbol for `code` (ISO 4217).
    ///
    /// Unknown codes are printed as a prefix: `CHF 12.00`.
    pub fn format_currency(&self, code: &str) -> String {
        let rounded = self.rounded();
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let digits = rounded.abs();

        match currency_symbol(code) {
            Some(symbol) => format!("{sign}{symbol}{digits}"),
            None => format!("{sign}{} {digits}", code.to_uppercase()),
        }
    }
}

/// Symbol for the currencies the app ships with.
fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the two-decimal presentation value without a symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rounded())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
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

/// Multiplication by a quantity.
impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: Decimal) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_display_pins_two_decimals() {
        assert_eq!(Money::new(dec("110")).to_string(), "110.00");
        assert_eq!(Money::new(dec("10.5")).to_string(), "10.50");
        assert_eq!(Money::new(dec("0")).to_string(), "0.00");
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(Money::new(dec("0.825")).to_string(), "0.83");
        assert_eq!(Money::new(dec("0.824")).to_string(), "0.82");
        assert_eq!(Money::new(dec("-0.825")).to_string(), "-0.83");
    }

    #[test]
    fn test_format_currency() {
        let amount = Money::new(dec("1234.5"));
        assert_eq!(amount.format_currency("usd"), "$1234.50");
        assert_eq!(amount.format_currency("EUR"), "€1234.50");
        assert_eq!(amount.format_currency("CHF"), "CHF 1234.50");
        assert_eq!(Money::new(dec("-5")).format_currency("GBP"), "-£5.00");
    }

    #[test]
    fn test_arithmetic_keeps_precision() {
        let a = Money::new(dec("0.333"));
        let b = Money::new(dec("0.333"));
        let sum = a + b + Money::new(dec("0.334"));
        assert_eq!(sum.amount(), dec("1.000"));
        assert_eq!((a * dec("3")).amount(), dec("0.999"));
        assert!((a - Money::new(dec("1"))).is_negative());
        assert!(!Money::zero().is_negative());
    }
}
