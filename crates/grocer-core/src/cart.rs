//! # Cart
//!
//! The in-progress cart, owned by the caller and handed to checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Method                  Cart Change           │
//! │  ──────────────           ──────                  ───────────           │
//! │                                                                         │
//! │  Scan Product ───────────► add_product() ───────► push or merge line   │
//! │                                                                         │
//! │  Change Quantity ────────► update_quantity() ───► lines[i].qty = n     │
//! │                                                                         │
//! │  Click Remove ───────────► remove() ────────────► lines.remove(i)      │
//! │                                                                         │
//! │  Tender ─────────────────► checkout(&cart.lines()) (grocer-db)         │
//! │                                                                         │
//! │  NOTE: No process-wide cart. Each register owns its own `Cart` value.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

/// A line pending checkout.
///
/// The unit price is frozen when the product is scanned. Checkout snapshots
/// this price into the ledger instead of re-reading the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    /// Line for `quantity` units of `product` at its current price.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price(),
            quantity,
        }
    }

    /// unit_price × quantity.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding same product increases quantity)
/// - Quantity is always in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_CART_ITEMS` distinct lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    /// Wraps lines assembled elsewhere.
    ///
    /// No merging or limit checks; checkout validates each line itself.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Cart { lines }
    }

    /// Adds a product or increases its quantity if already present.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            validate_quantity(new_qty)?;
            line.quantity = new_qty;
            return Ok(());
        }

        validate_cart_size(self.lines.len())?;
        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: i64, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        validate_quantity(quantity)?;

        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    /// Removes a line by product id.
    pub fn remove(&mut self, product_id: i64) -> CoreResult<()> {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);

        if self.lines.len() == initial_len {
            Err(CoreError::ProductNotFound(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Largest quantity a single line may hold.
    pub const fn max_line_quantity() -> i64 {
        MAX_ITEM_QUANTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_product(id: i64, price_cents: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            price_cents,
            quantity: 50,
            reorder_level: 5,
            sku: Some(format!("SKU-{}", id)),
            barcode: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_add_product() {
        let mut cart = Cart::new();
        cart.add_product(&test_product(1, 250), 4).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 4);
        assert_eq!(cart.subtotal().cents(), 1000);
    }

    #[test]
    fn test_cart_add_same_product_merges() {
        let mut cart = Cart::new();
        let product = test_product(1, 999);

        cart.add_product(&product, 2).unwrap();
        cart.add_product(&product, 3).unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_cart_merge_respects_quantity_limit() {
        let mut cart = Cart::new();
        let product = test_product(1, 100);

        cart.add_product(&product, 998).unwrap();
        assert!(cart.add_product(&product, 2).is_err());
        assert_eq!(cart.total_quantity(), 998);
    }

    #[test]
    fn test_cart_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        let err = cart.add_product(&test_product(1, 100), 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for id in 0..crate::MAX_CART_ITEMS as i64 {
            cart.add_product(&test_product(id, 100), 1).unwrap();
        }
        assert!(cart.add_product(&test_product(10_000, 100), 1).is_err());
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add_product(&test_product(1, 100), 2).unwrap();
        cart.add_product(&test_product(2, 100), 1).unwrap();

        cart.update_quantity(1, 0).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.lines()[0].product_id, 2);

        assert!(cart.update_quantity(99, 3).is_err());
    }

    #[test]
    fn test_cart_clear() {
        let mut cart = Cart::new();
        cart.add_product(&test_product(1, 999), 2).unwrap();
        assert!(!cart.is_empty());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::zero());
    }

    #[test]
    fn test_price_is_frozen_when_scanned() {
        let mut cart = Cart::new();
        let mut product = test_product(1, 500);
        cart.add_product(&product, 1).unwrap();

        product.price_cents = 700;
        cart.add_product(&product, 1).unwrap();

        assert_eq!(cart.lines()[0].unit_price.cents(), 500);
        assert_eq!(cart.subtotal().cents(), 1000);
    }
}
