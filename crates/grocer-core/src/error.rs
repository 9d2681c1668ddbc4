//! # Error Types
//!
//! Domain-specific error types for grocer-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  grocer-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  grocer-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Every CoreError falls in exactly one ErrorKind:                        │
//! │    Validation → rejected before any mutation                           │
//! │    NotFound   → rejected before any mutation                           │
//! │    Conflict   → rejected; mid-transaction it rolls everything back     │
//! │    State      → the request makes no sense for the current ledger      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification callers use to pick a response (400/404/409/422).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    State,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Each variant carries enough context for a human-readable message; the
/// machine-readable tag comes from [`CoreError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Checkout was called with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Product id does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Sale id does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    /// Promotion id does not exist.
    #[error("Promotion not found: {0}")]
    PromotionNotFound(i64),

    /// Customer id does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// Reservation would take on-hand quantity below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (Milk x5)
    ///      │
    ///      ▼
    /// reserve_stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Milk", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole checkout rolls back, UI shows "Insufficient stock for Milk (have 3)"
    /// ```
    #[error("Insufficient stock for {product} (have {available}, requested {requested})")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Another product already holds this SKU or barcode.
    #[error("{field} '{value}' already in use")]
    DuplicateIdentifier { field: String, value: String },

    /// Product is referenced by ledger lines and cannot be deleted.
    #[error("Product {0} is referenced by sales and cannot be deleted")]
    ProductInUse(i64),

    /// Restoring stock would push a product past the configured ceiling.
    #[error("Restoring {requested} units of product {product_id} exceeds the stock ceiling of {ceiling}")]
    StockCeilingExceeded {
        product_id: i64,
        requested: i64,
        ceiling: i64,
    },

    /// Customer tried to redeem more points than they hold.
    #[error("Insufficient loyalty points: balance {available}, requested {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    /// Refund request resolved to zero lines.
    #[error("Nothing to refund for sale {0}")]
    NothingToRefund(i64),

    /// Refund request names a product the original sale never contained.
    #[error("Product {product_id} not in original sale {sale_id}")]
    ProductNotInSale { sale_id: i64, product_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyCart | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::ProductNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::PromotionNotFound(_)
            | CoreError::CustomerNotFound(_) => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::DuplicateIdentifier { .. }
            | CoreError::ProductInUse(_)
            | CoreError::StockCeilingExceeded { .. }
            | CoreError::InsufficientPoints { .. } => ErrorKind::Conflict,
            CoreError::NothingToRefund(_) | CoreError::ProductNotInSale { .. } => {
                ErrorKind::State
            }
        }
    }

    /// Returns a stable machine-readable tag for the error.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::EmptyCart => "EMPTY_CART",
            CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CoreError::SaleNotFound(_) => "SALE_NOT_FOUND",
            CoreError::PromotionNotFound(_) => "PROMOTION_NOT_FOUND",
            CoreError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            CoreError::ProductInUse(_) => "PRODUCT_IN_USE",
            CoreError::StockCeilingExceeded { .. } => "STOCK_CEILING_EXCEEDED",
            CoreError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            CoreError::NothingToRefund(_) => "NOTHING_TO_REFUND",
            CoreError::ProductNotInSale { .. } => "PRODUCT_NOT_IN_SALE",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Shorthand for a duplicate SKU/barcode error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        CoreError::DuplicateIdentifier {
            field: field.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
