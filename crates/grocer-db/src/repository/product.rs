//! # Product Repository (Catalog Store)
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Stock reservation / release (atomic conditional updates)
//! - Free-text lookup chain: id → SKU → barcode → name
//! - CRUD with SKU/barcode uniqueness
//!
//! ## Stock Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reserve = one conditional UPDATE                     │
//! │                                                                         │
//! │  ❌ WRONG: read, check, write (two registers can both pass the check)  │
//! │     SELECT quantity ... ; if qty >= n { UPDATE SET quantity = qty - n } │
//! │                                                                         │
//! │  ✅ CORRECT: check and decrement in the same statement                 │
//! │     UPDATE products SET quantity = quantity - ?2                       │
//! │     WHERE id = ?1 AND quantity >= ?2                                   │
//! │                                                                         │
//! │  0 rows changed → look the product up once to report why:             │
//! │     missing → ProductNotFound, present → InsufficientStock(have)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_in` functions take a connection so checkout and refund can run them
//! inside their own transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::validation::{validate_product_draft, validate_quantity, validate_search_query};
use grocer_core::{CoreError, Product, ProductDraft};

const PRODUCT_COLUMNS: &str =
    "id, name, price_cents, quantity, reorder_level, sku, barcode, created_at, updated_at";

// =============================================================================
// Lookup Strategies
// =============================================================================

/// One step of the free-text product lookup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Token parses as an integer equal to the product id.
    Id,
    /// Exact SKU.
    Sku,
    /// Exact barcode.
    Barcode,
    /// Case-insensitive substring of the name, first alphabetically.
    NameContains,
}

impl LookupStrategy {
    /// Precedence order. The first strategy that matches wins.
    pub const CHAIN: [LookupStrategy; 4] = [
        LookupStrategy::Id,
        LookupStrategy::Sku,
        LookupStrategy::Barcode,
        LookupStrategy::NameContains,
    ];
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let milk = repo.find_by_identifier("MILK-1L").await?;
/// repo.reserve_stock(milk.id, 2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_by_id_in(&mut conn, id).await
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        self.get_by_column(LookupStrategy::Sku, sku.trim()).await
    }

    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        self.get_by_column(LookupStrategy::Barcode, barcode.trim())
            .await
    }

    /// Resolves a free-text token to a product.
    ///
    /// Tries each [`LookupStrategy`] in [`LookupStrategy::CHAIN`] order and
    /// stops at the first match. Empty or whitespace-only tokens match
    /// nothing.
    pub async fn find_by_identifier(&self, token: &str) -> DbResult<Option<Product>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        for strategy in LookupStrategy::CHAIN {
            if let Some(product) = self.get_by_column(strategy, token).await? {
                debug!(token = %token, ?strategy, id = product.id, "Product lookup matched");
                return Ok(Some(product));
            }
        }

        debug!(token = %token, "Product lookup found nothing");
        Ok(None)
    }

    async fn get_by_column(
        &self,
        strategy: LookupStrategy,
        token: &str,
    ) -> DbResult<Option<Product>> {
        if token.is_empty() {
            return Ok(None);
        }

        let product = match strategy {
            LookupStrategy::Id => match token.parse::<i64>() {
                Ok(id) => self.get_by_id(id).await?,
                Err(_) => None,
            },
            LookupStrategy::Sku => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
                ))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?
            }
            LookupStrategy::Barcode => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?1"
                ))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?
            }
            LookupStrategy::NameContains => {
                sqlx::query_as::<_, Product>(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products \
                     WHERE instr(lower(name), lower(?1)) > 0 \
                     ORDER BY name, id LIMIT 1"
                ))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(product)
    }

    /// Searches name, SKU and barcode. Empty query lists the catalog.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit = %limit, "Searching products");

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ?1 = '' \
                OR instr(lower(name), lower(?1)) > 0 \
                OR instr(lower(IFNULL(sku, '')), lower(?1)) > 0 \
                OR instr(IFNULL(barcode, ''), ?1) > 0 \
             ORDER BY name, id \
             LIMIT ?2"
        ))
        .bind(&query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Products at or below their reorder threshold, lowest stock first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE quantity <= reorder_level \
             ORDER BY quantity, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(Domain(DuplicateIdentifier))` - SKU or barcode already taken
    pub async fn insert(&self, draft: ProductDraft) -> DbResult<Product> {
        let mut draft = draft;
        validate_product_draft(&mut draft)?;

        debug!(name = %draft.name, sku = ?draft.sku, "Inserting product");

        self.ensure_unique(&draft, None).await?;

        let now = Utc::now();
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products \
                (name, price_cents, quantity, reorder_level, sku, barcode, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(draft.price.cents())
        .bind(draft.quantity)
        .bind(draft.reorder_level)
        .bind(&draft.sku)
        .bind(&draft.barcode)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| identifier_conflict(e.into(), &draft))?;

        Ok(product)
    }

    /// Replaces every editable field of product `id`.
    ///
    /// SKU/barcode must not belong to a different product.
    pub async fn update(&self, id: i64, draft: ProductDraft) -> DbResult<Product> {
        let mut draft = draft;
        validate_product_draft(&mut draft)?;

        debug!(id = id, "Updating product");

        self.ensure_unique(&draft, Some(id)).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET \
                name = ?2, price_cents = ?3, quantity = ?4, reorder_level = ?5, \
                sku = ?6, barcode = ?7, updated_at = ?8 \
             WHERE id = ?1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&draft.name)
        .bind(draft.price.cents())
        .bind(draft.quantity)
        .bind(draft.reorder_level)
        .bind(&draft.sku)
        .bind(&draft.barcode)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| identifier_conflict(e.into(), &draft))?;

        product.ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    /// Deletes a product that no ledger line references.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting product");

        let referenced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_items WHERE product_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if referenced > 0 {
            return Err(CoreError::ProductInUse(id).into());
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                // A sale referencing the product committed after the count
                DbError::ForeignKeyViolation { .. } => CoreError::ProductInUse(id).into(),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(id.to_string()).into());
        }

        Ok(())
    }

    /// Atomically takes `quantity` units of product `id` out of stock.
    ///
    /// Linearizable with concurrent reservations: two callers can never
    /// together take more than was on hand.
    pub async fn reserve_stock(&self, id: i64, quantity: i64) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        reserve_stock_in(&mut conn, id, quantity).await
    }

    /// Puts `quantity` units of product `id` back on hand.
    pub async fn release_stock(
        &self,
        id: i64,
        quantity: i64,
        ceiling: Option<i64>,
    ) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        release_stock_in(&mut conn, id, quantity, ceiling).await
    }

    /// Rejects a draft whose SKU or barcode belongs to another product.
    async fn ensure_unique(&self, draft: &ProductDraft, exclude_id: Option<i64>) -> DbResult<()> {
        if let Some(sku) = &draft.sku {
            if let Some(existing) = self.get_by_sku(sku).await? {
                if Some(existing.id) != exclude_id {
                    return Err(CoreError::duplicate("sku", sku.as_str()).into());
                }
            }
        }

        if let Some(barcode) = &draft.barcode {
            if let Some(existing) = self.get_by_barcode(barcode).await? {
                if Some(existing.id) != exclude_id {
                    return Err(CoreError::duplicate("barcode", barcode.as_str()).into());
                }
            }
        }

        Ok(())
    }
}

/// Maps a UNIQUE violation that slipped past the pre-check to the domain error.
fn identifier_conflict(err: DbError, draft: &ProductDraft) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } if field.ends_with("barcode") => {
            CoreError::duplicate("barcode", draft.barcode.clone().unwrap_or_default()).into()
        }
        DbError::UniqueViolation { field, .. } if field.ends_with("sku") => {
            CoreError::duplicate("sku", draft.sku.clone().unwrap_or_default()).into()
        }
        other => other,
    }
}

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

pub(crate) async fn get_by_id_in(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Conditional decrement. See the module docs.
pub(crate) async fn reserve_stock_in(
    conn: &mut SqliteConnection,
    id: i64,
    quantity: i64,
) -> DbResult<Product> {
    validate_quantity(quantity)?;
    debug!(id = id, quantity = quantity, "Reserving stock");

    let updated = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products \
         SET quantity = quantity - ?2, updated_at = ?3 \
         WHERE id = ?1 AND quantity >= ?2 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(product) = updated {
        return Ok(product);
    }

    match get_by_id_in(conn, id).await? {
        None => Err(CoreError::ProductNotFound(id.to_string()).into()),
        Some(product) => Err(CoreError::InsufficientStock {
            product: product.name,
            available: product.quantity,
            requested: quantity,
        }
        .into()),
    }
}

/// Increment, bounded by `ceiling` when one is configured.
pub(crate) async fn release_stock_in(
    conn: &mut SqliteConnection,
    id: i64,
    quantity: i64,
    ceiling: Option<i64>,
) -> DbResult<Product> {
    validate_quantity(quantity)?;
    debug!(id = id, quantity = quantity, ?ceiling, "Releasing stock");

    let updated = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products \
         SET quantity = quantity + ?2, updated_at = ?3 \
         WHERE id = ?1 AND (?4 IS NULL OR quantity + ?2 <= ?4) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(quantity)
    .bind(Utc::now())
    .bind(ceiling)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(product) = updated {
        return Ok(product);
    }

    match (get_by_id_in(conn, id).await?, ceiling) {
        (Some(_), Some(ceiling)) => Err(CoreError::StockCeilingExceeded {
            product_id: id,
            requested: quantity,
            ceiling,
        }
        .into()),
        _ => Err(CoreError::ProductNotFound(id.to_string()).into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use grocer_core::Money;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn draft(name: &str, cents: i64, qty: i64) -> ProductDraft {
        ProductDraft::new(name, Money::from_cents(cents)).quantity(qty)
    }

    #[tokio::test]
    async fn test_insert_normalizes_blank_identifiers() {
        let db = db().await;
        let repo = db.products();

        let a = repo.insert(draft("Apples", 250, 10).sku("  ")).await.unwrap();
        let b = repo.insert(draft("Bananas", 99, 10).sku("")).await.unwrap();

        assert_eq!(a.sku, None);
        assert_eq!(b.sku, None);
    }

    #[tokio::test]
    async fn test_duplicate_sku_and_barcode_rejected() {
        let db = db().await;
        let repo = db.products();

        let first = repo
            .insert(draft("Milk", 199, 5).sku("MILK").barcode("0001"))
            .await
            .unwrap();

        let err = repo.insert(draft("Oat Milk", 299, 5).sku("MILK")).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_IDENTIFIER");

        let err = repo
            .insert(draft("Soy Milk", 299, 5).barcode("0001"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_IDENTIFIER");

        // Updating a product with its own identifiers is fine
        let updated = repo
            .update(first.id, draft("Whole Milk", 209, 5).sku("MILK").barcode("0001"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Whole Milk");
        assert_eq!(updated.price_cents, 209);
    }

    #[tokio::test]
    async fn test_update_unknown_product() {
        let db = db().await;
        let err = db.products().update(404, draft("Ghost", 1, 0)).await.unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_reserve_stock_never_goes_negative() {
        let db = db().await;
        let repo = db.products();
        let bread = repo.insert(draft("Bread", 300, 3)).await.unwrap();

        let after = repo.reserve_stock(bread.id, 2).await.unwrap();
        assert_eq!(after.quantity, 1);

        let err = repo.reserve_stock(bread.id, 2).await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product: "Bread".to_string(),
                available: 1,
                requested: 2,
            })
        );

        let unchanged = repo.get_by_id(bread.id).await.unwrap().unwrap();
        assert_eq!(unchanged.quantity, 1);

        let err = repo.reserve_stock(9999, 1).await.unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_stock_moves_require_positive_quantity() {
        let db = db().await;
        let repo = db.products();
        let bread = repo.insert(draft("Bread", 300, 3)).await.unwrap();

        for qty in [0, -5] {
            let err = repo.reserve_stock(bread.id, qty).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
            let err = repo.release_stock(bread.id, qty, None).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }

        let unchanged = repo.get_by_id(bread.id).await.unwrap().unwrap();
        assert_eq!(unchanged.quantity, 3);
    }

    #[tokio::test]
    async fn test_release_stock_respects_ceiling() {
        let db = db().await;
        let repo = db.products();
        let eggs = repo.insert(draft("Eggs", 450, 8)).await.unwrap();

        assert_eq!(repo.release_stock(eggs.id, 2, Some(10)).await.unwrap().quantity, 10);

        let err = repo.release_stock(eggs.id, 1, Some(10)).await.unwrap_err();
        assert_eq!(err.code(), "STOCK_CEILING_EXCEEDED");

        assert_eq!(repo.release_stock(eggs.id, 1, None).await.unwrap().quantity, 11);
    }

    #[tokio::test]
    async fn test_lookup_precedence_id_before_sku() {
        let db = db().await;
        let repo = db.products();

        // Fill ids 1..=6 so the target lands on id 7
        for n in 1..=6 {
            let sku = if n == 1 { "7".to_string() } else { format!("FILL-{n}") };
            repo.insert(draft(&format!("Filler {n}"), 100, 1).sku(sku))
                .await
                .unwrap();
        }
        let target = repo
            .insert(draft("Target", 100, 1).sku("ABC").barcode("999"))
            .await
            .unwrap();
        assert_eq!(target.id, 7);

        let found = repo.find_by_identifier("7").await.unwrap().unwrap();
        assert_eq!(found.id, 7);

        assert_eq!(repo.find_by_identifier("ABC").await.unwrap().unwrap().id, 7);
        assert_eq!(repo.find_by_identifier(" 999 ").await.unwrap().unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_lookup_by_name_is_case_insensitive_and_alphabetical() {
        let db = db().await;
        let repo = db.products();
        repo.insert(draft("Yellow Onion", 80, 1)).await.unwrap();
        repo.insert(draft("Red Onion", 90, 1)).await.unwrap();

        let found = repo.find_by_identifier("ONION").await.unwrap().unwrap();
        assert_eq!(found.name, "Red Onion");

        assert!(repo.find_by_identifier("   ").await.unwrap().is_none());
        assert!(repo.find_by_identifier("durian").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_and_low_stock() {
        let db = db().await;
        let repo = db.products();
        repo.insert(draft("Cheddar", 500, 2).reorder_level(5).sku("CHS-1"))
            .await
            .unwrap();
        repo.insert(draft("Brie", 700, 20).reorder_level(5)).await.unwrap();

        let hits = repo.search("chs", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Cheddar");

        assert_eq!(repo.search("", 10).await.unwrap().len(), 2);

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].is_low_stock());
    }

    #[tokio::test]
    async fn test_delete_unreferenced_product() {
        let db = db().await;
        let repo = db.products();
        let p = repo.insert(draft("Gum", 50, 1)).await.unwrap();

        repo.delete(p.id).await.unwrap();
        assert!(repo.get_by_id(p.id).await.unwrap().is_none());

        let err = repo.delete(p.id).await.unwrap_err();
        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
    }
}
