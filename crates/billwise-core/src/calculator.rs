//! # Financial Calculator
//!
//! The one place document totals are computed.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line items ──► subtotal = Σ qty × unit price                           │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  discount ────► discount_amount = subtotal × v/100   (percentage)       │
//! │                                 = v                  (fixed)            │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │                taxable = subtotal − discount_amount                     │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  tax % ───────► tax_amount = taxable × tax%/100                         │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │                total = taxable + tax_amount                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount is applied before tax. The discount is not clamped to the
//! subtotal: an oversized fixed discount yields a negative taxable amount and
//! a negative tax. Nothing here rounds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Inputs
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `value` percent of the subtotal.
    Percentage,
    /// `value` in the document currency.
    Fixed,
}

impl DiscountType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" | "percent" | "%" => Ok(DiscountType::Percentage),
            "fixed" | "amount" | "flat" => Ok(DiscountType::Fixed),
            _ => Err(ValidationError::NotAllowed {
                field: "discount_type".to_string(),
                allowed: vec!["percentage".to_string(), "fixed".to_string()],
            }),
        }
    }
}

/// A discount applied to the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub kind: DiscountType,
    pub value: Decimal,
}

impl Discount {
    pub const fn new(kind: DiscountType, value: Decimal) -> Self {
        Discount { kind, value }
    }

    pub const fn percentage(value: Decimal) -> Self {
        Discount::new(DiscountType::Percentage, value)
    }

    pub const fn fixed(value: Decimal) -> Self {
        Discount::new(DiscountType::Fixed, value)
    }

    /// Amount taken off `subtotal`.
    pub fn amount_on(&self, subtotal: Decimal) -> Decimal {
        match self.kind {
            DiscountType::Percentage => subtotal * self.value / HUNDRED,
            DiscountType::Fixed => self.value,
        }
    }
}

/// The two numbers of a line the calculator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineAmount {
    pub const fn new(quantity: Decimal, unit_price: Decimal) -> Self {
        LineAmount {
            quantity,
            unit_price,
        }
    }

    #[inline]
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

// =============================================================================
// Output
// =============================================================================

/// Every derived amount of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// True when the discount pushed the taxable amount below zero.
    pub fn is_over_discounted(&self) -> bool {
        self.taxable_amount < Decimal::ZERO
    }
}

/// Runs the pipeline described in the module docs.
///
/// ## Example
/// ```rust
/// use billwise_core::calculator::{calculate_totals, Discount, LineAmount};
/// use rust_decimal::Decimal;
///
/// let items = [LineAmount::new(Decimal::from(1), Decimal::from(200))];
/// let totals = calculate_totals(
///     &items,
///     Some(Discount::percentage(Decimal::from(10))),
///     Decimal::from(5),
/// );
///
/// assert_eq!(totals.discount_amount, Decimal::from(20));
/// assert_eq!(totals.tax_amount, Decimal::from(9));
/// assert_eq!(totals.total, Decimal::from(189));
/// ```
pub fn calculate_totals(
    items: &[LineAmount],
    discount: Option<Discount>,
    tax_percentage: Decimal,
) -> Totals {
    let subtotal: Decimal = items.iter().map(LineAmount::total).sum();
    let discount_amount = discount
        .map(|d| d.amount_on(subtotal))
        .unwrap_or(Decimal::ZERO);
    let taxable_amount = subtotal - discount_amount;
    let tax_amount = taxable_amount * tax_percentage / HUNDRED;
    let total = taxable_amount + tax_amount;

    Totals {
        subtotal,
        discount_amount,
        taxable_amount,
        tax_amount,
        total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_invoice_scenario_without_discount() {
        let items = [LineAmount::new(dec("2"), dec("50"))];
        let totals = calculate_totals(&items, None, dec("10"));

        assert_eq!(totals.subtotal, dec("100"));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.tax_amount, dec("10"));
        assert_eq!(totals.total, dec("110"));
    }

    #[test]
    fn test_discount_applies_before_tax() {
        let items = [LineAmount::new(dec("1"), dec("100"))];
        let totals = calculate_totals(&items, Some(Discount::fixed(dec("20"))), dec("10"));

        // Tax on 80, not on 100
        assert_eq!(totals.tax_amount, dec("8"));
        assert_eq!(totals.total, dec("88"));
    }

    #[test]
    fn test_no_intermediate_rounding() {
        let items = [
            LineAmount::new(dec("3"), dec("0.333")),
            LineAmount::new(dec("1.5"), dec("19.99")),
        ];
        let totals = calculate_totals(&items, None, dec("8.25"));

        assert_eq!(totals.subtotal, dec("30.984"));
        assert_eq!(totals.tax_amount, dec("2.556180"));
        assert_eq!(totals.total, dec("33.540180"));
    }

    #[test]
    fn test_oversized_discount_is_not_clamped() {
        let items = [LineAmount::new(dec("1"), dec("50"))];
        let totals = calculate_totals(&items, Some(Discount::fixed(dec("80"))), dec("10"));

        assert_eq!(totals.taxable_amount, dec("-30"));
        assert_eq!(totals.tax_amount, dec("-3"));
        assert_eq!(totals.total, dec("-33"));
        assert!(totals.is_over_discounted());
    }

    #[test]
    fn test_empty_items() {
        let totals = calculate_totals(&[], Some(Discount::percentage(dec("10"))), dec("10"));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_discount_type_parsing() {
        assert_eq!("Percent".parse::<DiscountType>().unwrap(), DiscountType::Percentage);
        assert_eq!("flat".parse::<DiscountType>().unwrap(), DiscountType::Fixed);
        assert!("bogus".parse::<DiscountType>().is_err());
    }

    /// total == (subtotal − discount) + tax for random documents.
    #[test]
    fn test_total_invariant_randomised() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed_b111);

        for _ in 0..500 {
            let count = rng.gen_range(0..8);
            let items: Vec<LineAmount> = (0..count)
                .map(|_| {
                    LineAmount::new(
                        Decimal::new(rng.gen_range(1..10_000), rng.gen_range(0..3)),
                        Decimal::new(rng.gen_range(0..1_000_000), 2),
                    )
                })
                .collect();

            let discount = match rng.gen_range(0..3) {
                0 => None,
                1 => Some(Discount::percentage(Decimal::new(rng.gen_range(0..10_000), 2))),
                _ => Some(Discount::fixed(Decimal::new(rng.gen_range(0..500_000), 2))),
            };
            let tax = Decimal::new(rng.gen_range(0..3_000), 2);

            let totals = calculate_totals(&items, discount, tax);
            let expected_subtotal: Decimal = items.iter().map(|i| i.quantity * i.unit_price).sum();
            let expected_discount = discount.map(|d| d.amount_on(expected_subtotal)).unwrap_or_default();

            assert_eq!(totals.subtotal, expected_subtotal);
            assert_eq!(totals.discount_amount, expected_discount);
            assert_eq!(
                totals.total,
                (totals.subtotal - totals.discount_amount) + totals.tax_amount
            );
            assert_eq!(
                totals.tax_amount,
                (totals.subtotal - totals.discount_amount) * tax / Decimal::ONE_HUNDRED
            );
        }
    }
}
