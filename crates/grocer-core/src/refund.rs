//! # Refund Planning
//!
//! Turns a refund request into the exact lines to restock and re-price,
//! using the original sale's frozen unit prices.
//!
//! ```text
//! original items ─┐
//! already refunded ┼──► plan_refund() ──► RefundPlan { lines, complete }
//! request ────────┘         │
//!                           ├── unknown product ─────► ProductNotInSale
//!                           └── nothing left to do ──► NothingToRefund
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::SaleItem;

/// What the caller wants refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "lines")]
pub enum RefundRequest {
    /// Every line of the original sale that is still refundable.
    Full,
    /// Specific products; quantities are clamped to what was sold.
    Lines(Vec<RefundLineRequest>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

impl RefundLineRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        RefundLineRequest {
            product_id,
            quantity,
        }
    }
}

/// One line to restore, priced at the original unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundLine {
    pub product_id: i64,
    pub unit_price: Money,
    pub quantity: i64,
}

impl RefundLine {
    pub fn line_subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub lines: Vec<RefundLine>,
    /// True when the plan reverses the entire original sale and nothing
    /// had been refunded before. The ledger entry then mirrors the
    /// original header exactly.
    pub complete: bool,
}

impl RefundPlan {
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(RefundLine::line_subtotal).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Plans a refund of sale `sale_id`.
///
/// `already_refunded` maps product id to units refunded by earlier refunds.
/// Pass an empty map to ignore earlier refunds entirely.
///
/// Requests for the same product are merged. Each product's quantity is
/// clamped to what is still refundable and allocated across its original
/// lines in order, so a product sold on two lines at different prices is
/// refunded at the right price for each unit.
pub fn plan_refund(
    sale_id: i64,
    original: &[SaleItem],
    already_refunded: &HashMap<i64, i64>,
    request: &RefundRequest,
) -> CoreResult<RefundPlan> {
    // product id → original lines, in sale order
    let mut by_product: BTreeMap<i64, Vec<&SaleItem>> = BTreeMap::new();
    for item in original {
        by_product.entry(item.product_id).or_default().push(item);
    }

    let wanted: Vec<(i64, i64)> = match request {
        RefundRequest::Full => by_product
            .iter()
            .map(|(&product_id, items)| (product_id, items.iter().map(|i| i.quantity).sum()))
            .collect(),
        RefundRequest::Lines(requests) => {
            let mut merged: Vec<(i64, i64)> = Vec::new();
            for req in requests {
                if !by_product.contains_key(&req.product_id) {
                    return Err(CoreError::ProductNotInSale {
                        sale_id,
                        product_id: req.product_id,
                    });
                }
                match merged.iter_mut().find(|(id, _)| *id == req.product_id) {
                    Some((_, qty)) => *qty += req.quantity,
                    None => merged.push((req.product_id, req.quantity)),
                }
            }
            merged
        }
    };

    let mut lines = Vec::new();
    let mut complete = matches!(request, RefundRequest::Full);

    for (product_id, requested) in wanted {
        let items = match by_product.get(&product_id) {
            Some(items) => items,
            None => continue,
        };
        let mut consumed = already_refunded.get(&product_id).copied().unwrap_or(0);
        if consumed > 0 {
            complete = false;
        }
        let mut remaining = requested;

        for item in items {
            let used_here = consumed.min(item.quantity).max(0);
            consumed -= used_here;

            let available = item.quantity - used_here;
            let take = remaining.min(available);
            if take <= 0 {
                continue;
            }
            remaining -= take;
            lines.push(RefundLine {
                product_id,
                unit_price: item.unit_price(),
                quantity: take,
            });
        }
    }

    if lines.is_empty() {
        return Err(CoreError::NothingToRefund(sale_id));
    }

    Ok(RefundPlan { lines, complete })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, product_id: i64, quantity: i64, unit_cents: i64) -> SaleItem {
        SaleItem {
            id,
            sale_id: 10,
            product_id,
            quantity,
            unit_price_cents: unit_cents,
            subtotal_cents: unit_cents * quantity,
        }
    }

    fn original() -> Vec<SaleItem> {
        vec![item(1, 7, 3, 250), item(2, 8, 1, 1000)]
    }

    #[test]
    fn test_full_refund_covers_every_line() {
        let plan = plan_refund(10, &original(), &HashMap::new(), &RefundRequest::Full).unwrap();

        assert!(plan.complete);
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.subtotal().cents(), 1750);
        assert_eq!(plan.total_quantity(), 4);
    }

    #[test]
    fn test_partial_quantity_is_clamped_to_sold() {
        let request = RefundRequest::Lines(vec![RefundLineRequest::new(7, 10)]);
        let plan = plan_refund(10, &original(), &HashMap::new(), &request).unwrap();

        assert!(!plan.complete);
        assert_eq!(plan.lines, vec![RefundLine {
            product_id: 7,
            unit_price: Money::from_cents(250),
            quantity: 3,
        }]);
    }

    #[test]
    fn test_unknown_product_is_a_hard_failure() {
        let request = RefundRequest::Lines(vec![
            RefundLineRequest::new(7, 1),
            RefundLineRequest::new(99, 1),
        ]);
        let err = plan_refund(10, &original(), &HashMap::new(), &request).unwrap_err();
        assert_eq!(err, CoreError::ProductNotInSale { sale_id: 10, product_id: 99 });
    }

    #[test]
    fn test_non_positive_quantities_leave_nothing_to_refund() {
        let request = RefundRequest::Lines(vec![
            RefundLineRequest::new(7, 0),
            RefundLineRequest::new(8, -2),
        ]);
        let err = plan_refund(10, &original(), &HashMap::new(), &request).unwrap_err();
        assert_eq!(err, CoreError::NothingToRefund(10));
    }

    #[test]
    fn test_already_refunded_units_are_excluded() {
        let refunded = HashMap::from([(7, 2)]);

        let plan = plan_refund(10, &original(), &refunded, &RefundRequest::Full).unwrap();
        assert!(!plan.complete);
        assert_eq!(plan.total_quantity(), 2); // 1 × product 7 + 1 × product 8

        let fully = HashMap::from([(7, 3), (8, 1)]);
        let err = plan_refund(10, &original(), &fully, &RefundRequest::Full).unwrap_err();
        assert_eq!(err, CoreError::NothingToRefund(10));
    }

    #[test]
    fn test_same_product_on_two_lines_keeps_each_price() {
        let items = vec![item(1, 7, 1, 200), item(2, 7, 2, 300)];
        let request = RefundRequest::Lines(vec![
            RefundLineRequest::new(7, 1),
            RefundLineRequest::new(7, 1),
        ]);
        let plan = plan_refund(10, &items, &HashMap::new(), &request).unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.subtotal().cents(), 500);
    }

    #[test]
    fn test_request_wire_format() {
        let full: RefundRequest = serde_json::from_str(r#"{"mode":"full"}"#).unwrap();
        assert_eq!(full, RefundRequest::Full);

        let lines: RefundRequest = serde_json::from_str(
            r#"{"mode":"lines","lines":[{"product_id":7,"quantity":2}]}"#,
        )
        .unwrap();
        assert_eq!(lines, RefundRequest::Lines(vec![RefundLineRequest::new(7, 2)]));
    }
}
