//! # Promotion Evaluator
//!
//! Decides whether a promotion applies to a subtotal and what it takes off.
//!
//! ```text
//! evaluate(subtotal, promotion, now)
//!      │
//!      ├── inactive / outside window ───────► not applicable, discount 0
//!      ├── subtotal < min_purchase ─────────► not applicable, discount 0
//!      ├── Percentage ──► subtotal × bps / 10000  (half-to-even)
//!      └── Fixed ───────► min(value, subtotal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Promotion, PromotionKind};

/// Result of evaluating a promotion against a subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub discount: Money,
    pub applicable: bool,
}

impl PromotionOutcome {
    fn not_applicable() -> Self {
        PromotionOutcome {
            discount: Money::zero(),
            applicable: false,
        }
    }
}

/// Evaluates `promotion` for `subtotal` at instant `now`.
///
/// The discount never exceeds the subtotal.
pub fn evaluate(subtotal: Money, promotion: &Promotion, now: DateTime<Utc>) -> PromotionOutcome {
    if !promotion.is_valid_at(now) || subtotal < promotion.min_purchase() {
        return PromotionOutcome::not_applicable();
    }

    let discount = match promotion.kind {
        // Negative or out-of-range values are rejected when the promotion is stored
        PromotionKind::Percentage => subtotal.percentage(promotion.value.clamp(0, 10_000) as u32),
        PromotionKind::Fixed => Money::from_cents(promotion.value.max(0)),
    };

    PromotionOutcome {
        discount: discount.min(subtotal),
        applicable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promo(kind: PromotionKind, value: i64, min_purchase_cents: Option<i64>) -> Promotion {
        Promotion {
            id: 1,
            name: "Weekend".to_string(),
            kind,
            value,
            min_purchase_cents,
            valid_from: None,
            valid_to: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentage_discount() {
        let outcome = evaluate(
            Money::from_cents(2000),
            &promo(PromotionKind::Percentage, 1000, None),
            Utc::now(),
        );
        assert!(outcome.applicable);
        assert_eq!(outcome.discount.cents(), 200);
    }

    #[test]
    fn test_percentage_discount_rounds_half_to_even() {
        // 12.5% of $1.00 = 12.5 cents → 12
        let outcome = evaluate(
            Money::from_cents(100),
            &promo(PromotionKind::Percentage, 1250, None),
            Utc::now(),
        );
        assert_eq!(outcome.discount.cents(), 12);
    }

    #[test]
    fn test_fixed_discount_clamps_to_subtotal() {
        let outcome = evaluate(
            Money::from_cents(300),
            &promo(PromotionKind::Fixed, 500, None),
            Utc::now(),
        );
        assert!(outcome.applicable);
        assert_eq!(outcome.discount.cents(), 300);
    }

    #[test]
    fn test_min_purchase_boundary_is_inclusive() {
        let promotion = promo(PromotionKind::Fixed, 500, Some(5000));
        let now = Utc::now();

        let below = evaluate(Money::from_cents(4999), &promotion, now);
        assert!(!below.applicable);
        assert_eq!(below.discount, Money::zero());

        let at = evaluate(Money::from_cents(5000), &promotion, now);
        assert!(at.applicable);
        assert_eq!(at.discount.cents(), 500);
    }

    #[test]
    fn test_expired_or_inactive_promotion_does_not_apply() {
        let now = Utc::now();

        let mut expired = promo(PromotionKind::Percentage, 1000, None);
        expired.valid_to = Some(now - Duration::days(1));
        assert!(!evaluate(Money::from_cents(1000), &expired, now).applicable);

        let mut inactive = promo(PromotionKind::Percentage, 1000, None);
        inactive.active = false;
        assert!(!evaluate(Money::from_cents(1000), &inactive, now).applicable);
    }

    #[test]
    fn test_validity_window_is_inclusive_at_both_ends() {
        let now = Utc::now();
        let subtotal = Money::from_cents(1000);

        let mut starts_now = promo(PromotionKind::Percentage, 1000, None);
        starts_now.valid_from = Some(now);
        let outcome = evaluate(subtotal, &starts_now, now);
        assert!(outcome.applicable);
        assert_eq!(outcome.discount.cents(), 100);

        let mut ends_now = promo(PromotionKind::Percentage, 1000, None);
        ends_now.valid_to = Some(now);
        assert!(evaluate(subtotal, &ends_now, now).applicable);

        let mut single_instant = promo(PromotionKind::Fixed, 250, None);
        single_instant.valid_from = Some(now);
        single_instant.valid_to = Some(now);
        assert_eq!(evaluate(subtotal, &single_instant, now).discount.cents(), 250);
    }

    #[test]
    fn test_not_yet_started_promotion_does_not_apply() {
        let now = Utc::now();

        let mut upcoming = promo(PromotionKind::Percentage, 1000, None);
        upcoming.valid_from = Some(now + Duration::seconds(1));
        upcoming.valid_to = Some(now + Duration::days(7));

        let outcome = evaluate(Money::from_cents(1000), &upcoming, now);
        assert!(!outcome.applicable);
        assert_eq!(outcome.discount, Money::zero());
    }
}
