//! # Validation Module
//!
//! Input checks run before any catalog or ledger state is touched.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Names, identifiers, quantities, prices                           │
//! │  └── Rejects with ValidationError, nothing written                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (grocer-db)                                     │
//! │  └── Duplicate SKU/barcode pre-checks                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (sku), UNIQUE (barcode)                                    │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use grocer_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("MILK-1L").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ProductDraft;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use grocer_core::validation::validate_sku;
///
/// assert!(validate_sku("MILK-1L").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_identifier("sku", sku)
}

/// Validates a barcode. Same shape rules as a SKU.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    validate_identifier("barcode", barcode)
}

fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

/// Validates a display name (product, customer, promotion) for `field`.
///
/// Must be non-blank after trimming and at most 200 characters.
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a search query. Empty is fine; returns the trimmed text.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Turns blank optional identifiers into `None` and trims the rest.
///
/// ```rust
/// use grocer_core::validation::normalize_identifier;
///
/// assert_eq!(normalize_identifier(Some("  ")), None);
/// assert_eq!(normalize_identifier(Some(" 0123 ")), Some("0123".to_string()));
/// ```
pub fn normalize_identifier(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## Cashier Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  Cashier enters quantity: 5                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → "quantity must be positive"                     │
/// │       ├── qty > 999? → "quantity must be between 1 and 999"            │
/// │       └── OK → line added                                              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an on-hand stock level or reorder threshold (>= 0).
pub fn validate_stock_level(field: &str, level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use grocer_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// A manual discount must lie within `0..=subtotal`.
pub fn validate_discount(discount: Money, subtotal: Money) -> ValidationResult<()> {
    if discount.is_negative() || discount > subtotal {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal.cents(),
        });
    }

    Ok(())
}

/// Loyalty points to redeem must not be negative.
pub fn validate_points(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::OutOfRange {
            field: "loyalty_points_used".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before adding another distinct line.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates and normalizes a product draft in place.
///
/// Blank SKU/barcode become `None`; the name is trimmed.
pub fn validate_product_draft(draft: &mut ProductDraft) -> ValidationResult<()> {
    validate_product_name(&draft.name)?;
    draft.name = draft.name.trim().to_string();

    validate_price_cents(draft.price.cents())?;
    validate_stock_level("quantity", draft.quantity)?;
    validate_stock_level("reorder_level", draft.reorder_level)?;

    draft.sku = normalize_identifier(draft.sku.as_deref());
    if let Some(sku) = &draft.sku {
        validate_sku(sku)?;
    }

    draft.barcode = normalize_identifier(draft.barcode.as_deref());
    if let Some(barcode) = &draft.barcode {
        validate_barcode(barcode)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
