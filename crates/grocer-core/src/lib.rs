//! # grocer-core: Pure Business Logic for Grocer POS
//!
//! Everything about a checkout that can be decided without touching storage:
//! money, pricing, promotions, the cart, and refund planning.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Grocer POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web layer (external: auth, pages, exports)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ checkout / refund / lookup_product     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       grocer-db: SalesService, repositories, migrations         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ grocer-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────┐ │   │
//! │  │   │  money   │ │   cart   │ │ pricing  │ │promotion │ │refund│ │   │
//! │  │   │  Money   │ │   Cart   │ │  Totals  │ │ evaluate │ │ plan │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘ └──────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, SaleItem, Promotion, Customer)
//! - [`money`] - Integer-cent money with half-to-even rounding
//! - [`cart`] - Caller-owned cart aggregate
//! - [`promotion`] - Promotion applicability and discount
//! - [`pricing`] - Subtotal / discount / tax / total
//! - [`refund`] - Which lines a refund restores, at which prices
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use grocer_core::{CartLine, Money, PricingEngine, TaxRate};
//!
//! let lines = vec![CartLine {
//!     product_id: 1,
//!     name: "Apples".to_string(),
//!     unit_price: Money::from_cents(250),
//!     quantity: 4,
//! }];
//!
//! let engine = PricingEngine::new(TaxRate::from_bps(800));
//! let totals = engine.price(&lines, Money::zero(), None, Utc::now()).unwrap();
//!
//! assert_eq!(totals.tax.cents(), 80);
//! assert_eq!(totals.total.cents(), 1080);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod promotion;
pub mod refund;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use pricing::{PricingEngine, Totals};
pub use promotion::PromotionOutcome;
pub use refund::{RefundLine, RefundLineRequest, RefundPlan, RefundRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Loyalty points earned per unit sold.
pub const POINTS_PER_UNIT: i64 = 1;
