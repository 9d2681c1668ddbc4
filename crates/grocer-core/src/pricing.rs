//! # Pricing Engine
//!
//! Derives subtotal, discount, tax and total for a set of cart lines.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► subtotal = Σ unit_price × qty                                │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  discount = promotion applicable? promotion discount : manual discount │
//! │                │                                                        │
//! │                ▼                                                        │
//! │  after_discount = subtotal − discount                                   │
//! │  tax            = after_discount × rate   (half-to-even, to the cent)   │
//! │  total          = after_discount + tax                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rounding happens only at the tax step and inside percentage promotions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartLine;
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::promotion::evaluate;
use crate::types::{Promotion, TaxRate};
use crate::validation::{validate_discount, validate_price_cents, validate_quantity};

/// Priced cart.
///
/// Always satisfies `total == subtotal − discount + tax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    /// Totals with every amount sign-flipped, for refund ledger entries.
    pub fn negated(&self) -> Totals {
        Totals {
            subtotal: -self.subtotal,
            discount: -self.discount,
            tax: -self.tax,
            total: -self.total,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax
    }
}

/// Flat-rate pricing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    tax_rate: TaxRate,
}

impl PricingEngine {
    pub fn new(tax_rate: TaxRate) -> Self {
        PricingEngine { tax_rate }
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Prices `lines`.
    ///
    /// An applicable promotion replaces `manual_discount`; the two never
    /// stack. The manual discount must lie in `0..=subtotal` when used.
    ///
    /// Lines arrive from outside the process, so unit prices are checked
    /// here too: negative prices and amounts that do not fit in `i64`
    /// cents are validation errors.
    pub fn price(
        &self,
        lines: &[CartLine],
        manual_discount: Money,
        promotion: Option<&Promotion>,
        now: DateTime<Utc>,
    ) -> CoreResult<Totals> {
        let mut subtotal = Money::zero();
        for line in lines {
            validate_quantity(line.quantity)?;
            validate_price_cents(line.unit_price.cents())?;
            subtotal = line
                .unit_price
                .checked_multiply_quantity(line.quantity)
                .and_then(|line_subtotal| subtotal.checked_add(line_subtotal))
                .ok_or_else(amount_overflow)?;
        }
        // total can never exceed subtotal + tax on the full subtotal
        subtotal
            .checked_add(subtotal.calculate_tax(self.tax_rate))
            .ok_or_else(amount_overflow)?;

        let promoted = promotion
            .map(|promo| evaluate(subtotal, promo, now))
            .filter(|outcome| outcome.applicable);

        let discount = match promoted {
            Some(outcome) => outcome.discount,
            None => {
                validate_discount(manual_discount, subtotal)?;
                manual_discount
            }
        };

        Ok(self.with_discount(subtotal, discount))
    }

    /// Applies tax to `subtotal − discount`. No validation.
    pub fn with_discount(&self, subtotal: Money, discount: Money) -> Totals {
        let after_discount = subtotal - discount;
        let tax = after_discount.calculate_tax(self.tax_rate);

        Totals {
            subtotal,
            discount,
            tax,
            total: after_discount + tax,
        }
    }
}

fn amount_overflow() -> ValidationError {
    ValidationError::OutOfRange {
        field: "subtotal".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromotionKind;
    use crate::CoreError;

    fn line(product_id: i64, unit_cents: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id,
            name: format!("Item {}", product_id),
            unit_price: Money::from_cents(unit_cents),
            quantity,
        }
    }

    fn promo(kind: PromotionKind, value: i64) -> Promotion {
        Promotion {
            id: 3,
            name: "Deal".to_string(),
            kind,
            value,
            min_purchase_cents: None,
            valid_from: None,
            valid_to: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn engine() -> PricingEngine {
        PricingEngine::new(TaxRate::from_bps(800))
    }

    #[test]
    fn test_basic_scenario() {
        let totals = engine()
            .price(&[line(1, 250, 4)], Money::zero(), None, Utc::now())
            .unwrap();

        assert_eq!(totals.subtotal.cents(), 1000);
        assert_eq!(totals.discount.cents(), 0);
        assert_eq!(totals.tax.cents(), 80);
        assert_eq!(totals.total.cents(), 1080);
        assert!(totals.is_balanced());
    }

    #[test]
    fn test_fixed_promotion_clamps_and_zeroes_total() {
        let promotion = promo(PromotionKind::Fixed, 500);
        let totals = engine()
            .price(&[line(1, 300, 1)], Money::zero(), Some(&promotion), Utc::now())
            .unwrap();

        assert_eq!(totals.discount.cents(), 300);
        assert_eq!(totals.tax, Money::zero());
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_promotion_overrides_manual_discount() {
        let promotion = promo(PromotionKind::Percentage, 1000);
        let totals = engine()
            .price(
                &[line(1, 1000, 2)],
                Money::from_cents(700),
                Some(&promotion),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(totals.discount.cents(), 200);
        assert_eq!(totals.tax.cents(), 144);
        assert_eq!(totals.total.cents(), 1944);
    }

    #[test]
    fn test_manual_discount_used_when_promotion_not_applicable() {
        let mut promotion = promo(PromotionKind::Percentage, 1000);
        promotion.min_purchase_cents = Some(100_000);

        let totals = engine()
            .price(
                &[line(1, 1000, 1)],
                Money::from_cents(100),
                Some(&promotion),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(totals.discount.cents(), 100);
        assert_eq!(totals.total.cents(), 972);
    }

    #[test]
    fn test_manual_discount_larger_than_subtotal_is_rejected() {
        let err = engine()
            .price(&[line(1, 100, 1)], Money::from_cents(101), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_non_positive_line_quantity_is_rejected() {
        let err = engine()
            .price(&[line(1, 100, 0)], Money::zero(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_negative_unit_price_is_rejected() {
        let err = engine()
            .price(&[line(1, 1000, 1), line(2, -900, 1)], Money::zero(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));
    }

    #[test]
    fn test_overflowing_line_is_rejected() {
        let err = engine()
            .price(&[line(1, i64::MAX / 2, 3)], Money::zero(), None, Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        // Each line fits, the sum does not
        let err = engine()
            .price(
                &[line(1, i64::MAX / 2, 1), line(2, i64::MAX / 2, 1), line(3, 2, 1)],
                Money::zero(),
                None,
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_negated_totals_stay_balanced() {
        let totals = engine().with_discount(Money::from_cents(1999), Money::from_cents(150));
        let negated = totals.negated();

        assert!(negated.is_balanced());
        assert_eq!(negated.total, -totals.total);
    }
}
