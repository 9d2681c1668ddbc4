//! # Domain Types
//!
//! Records the checkout core reads and writes.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │   Promotion     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  kind           │       │
//! │  │  sku / barcode  │   │  subtotal       │   │  value          │       │
//! │  │  price_cents    │   │  discount / tax │   │  min_purchase   │       │
//! │  │  quantity       │   │  total          │   │  valid window   │       │
//! │  └────────┬────────┘   └────────┬────────┘   └─────────────────┘       │
//! │           │ weak ref            │ owns                                  │
//! │           │            ┌────────▼────────┐   ┌─────────────────┐       │
//! │           └───────────►│    SaleItem     │   │    Customer     │       │
//! │                        │  unit price     │   │  loyalty points │       │
//! │                        │  (snapshot)     │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary columns are stored as integer cents (`*_cents`) and exposed as
//! [`Money`] through accessor methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{parse_hundredths, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000, so 800 bps = 8% exactly, no float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

impl FromStr for TaxRate {
    type Err = ValidationError;

    /// Parses a percentage: `"8"` → 800 bps, `"8.25"` → 825 bps.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bps = parse_hundredths("tax_rate", s)?;
        if !(0..=10_000).contains(&bps) {
            return Err(ValidationError::OutOfRange {
                field: "tax_rate".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(TaxRate(bps as u32))
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// ## Invariants
/// - `quantity >= 0` (enforced by the schema and by conditional decrements)
/// - `sku` / `barcode` unique across products when present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Price in cents.
    pub price_cents: i64,

    /// On-hand quantity.
    pub quantity: i64,

    /// Reorder threshold: the product is "low stock" at or below this level.
    pub reorder_level: i64,

    /// Stock Keeping Unit.
    pub sku: Option<String>,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True when on-hand quantity has fallen to the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Editable product fields, used for both create and update.
///
/// Blank SKU/barcode strings are treated as "no identifier".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    pub reorder_level: i64,
    pub sku: Option<String>,
    pub barcode: Option<String>,
}

impl ProductDraft {
    /// Starts a draft with no identifiers and no stock.
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        ProductDraft {
            name: name.into(),
            price,
            quantity: 0,
            reorder_level: 0,
            sku: None,
            barcode: None,
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn reorder_level(mut self, level: i64) -> Self {
        self.reorder_level = level;
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }
}

// =============================================================================
// Promotion
// =============================================================================

/// How a promotion's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// `value` is a percentage in basis points (1000 = 10%).
    Percentage,
    /// `value` is an amount off in cents.
    Fixed,
}

/// A discount rule evaluated fresh on every pricing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub kind: PromotionKind,
    /// Basis points for percentage promotions, cents for fixed ones.
    pub value: i64,
    /// Minimum subtotal in cents for the promotion to apply.
    pub min_purchase_cents: Option<i64>,
    #[ts(as = "Option<String>")]
    pub valid_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub valid_to: Option<DateTime<Utc>>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Valid exactly when active, `valid_from` unset or ≤ now, and
    /// `valid_to` unset or ≥ now.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if matches!(self.valid_from, Some(from) if now < from) {
            return false;
        }
        if matches!(self.valid_to, Some(to) if now > to) {
            return false;
        }
        true
    }

    /// Minimum purchase threshold (zero when unset).
    pub fn min_purchase(&self) -> Money {
        Money::from_cents(self.min_purchase_cents.unwrap_or(0))
    }
}

/// Fields for creating a promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDraft {
    pub name: String,
    pub kind: PromotionKind,
    pub value: i64,
    pub min_purchase: Option<Money>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub active: bool,
}

impl PromotionDraft {
    /// A percentage promotion, `percent` as a decimal string (`"10"`, `"12.5"`).
    pub fn percentage(name: impl Into<String>, percent: &str) -> Result<Self, ValidationError> {
        let bps = parse_hundredths("value", percent)?;
        Ok(Self::with_kind(name, PromotionKind::Percentage, bps))
    }

    /// A fixed amount-off promotion.
    pub fn fixed(name: impl Into<String>, amount: Money) -> Self {
        Self::with_kind(name, PromotionKind::Fixed, amount.cents())
    }

    fn with_kind(name: impl Into<String>, kind: PromotionKind, value: i64) -> Self {
        PromotionDraft {
            name: name.into(),
            kind,
            value,
            min_purchase: None,
            valid_from: None,
            valid_to: None,
            active: true,
        }
    }

    pub fn min_purchase(mut self, amount: Money) -> Self {
        self.min_purchase = Some(amount);
        self
    }

    pub fn window(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_to = to;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
    /// Reserved for ledger entries written by the refund transaction.
    Refund,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Refund => "refund",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "mobile" => Ok(PaymentMethod::Mobile),
            "refund" => Ok(PaymentMethod::Refund),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["cash".into(), "card".into(), "mobile".into()],
            }),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed ledger entry. Refunds are Sales with negated amounts.
///
/// ## Invariant
/// `total == subtotal − discount + tax`, see [`Sale::is_balanced`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    /// Operator who rang up the sale.
    pub user_id: i64,
    pub customer_id: Option<i64>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    /// For refunds: the sale being refunded.
    pub refund_of: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn is_refund(&self) -> bool {
        self.payment_method == PaymentMethod::Refund
    }

    /// Checks `total == subtotal − discount + tax`.
    pub fn is_balanced(&self) -> bool {
        self.total_cents == self.subtotal_cents - self.discount_cents + self.tax_cents
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line of a sale. Unit price is frozen at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    /// Historical pointer; the price snapshot keeps its meaning.
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub subtotal_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer. Only the loyalty balance matters to checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Activity
// =============================================================================

/// Audited action on a ledger entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Refund,
}

/// What the audit collaborator is told after a committed checkout/refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub actor_id: i64,
    pub action: ActivityAction,
    pub entity_type: String,
    pub entity_id: i64,
    pub details: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
