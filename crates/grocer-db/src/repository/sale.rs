//! # Sale Repository (Sale Ledger)
//!
//! Database operations for sales and sale items.
//!
//! ## Ledger Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Append-only Ledger                                │
//! │                                                                         │
//! │  Sale #41  cash     subtotal  10.00  tax  0.80  total  10.80           │
//! │   ├── item  product 7 × 4 @ 2.50                                       │
//! │   │                                                                     │
//! │  Sale #42  refund   subtotal -10.00  tax -0.80  total -10.80           │
//! │   │        refund_of = 41                                               │
//! │   └── item  product 7 × 4 @ 2.50                                       │
//! │                                                                         │
//! │  Rows are written once, by checkout or refund, and never updated.      │
//! │  Deleting a sale cascades to its items.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use grocer_core::{CoreError, Money, PaymentMethod, Sale, SaleItem, Totals};

const SALE_COLUMNS: &str = "id, user_id, customer_id, subtotal_cents, tax_cents, discount_cents, \
     total_cents, payment_method, loyalty_points_used, loyalty_points_earned, refund_of, created_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, quantity, unit_price_cents, subtotal_cents";

/// A sale header with its lines, as rendered on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Header fields for a new ledger entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NewSale {
    pub user_id: i64,
    pub customer_id: Option<i64>,
    pub totals: Totals,
    pub payment_method: PaymentMethod,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub refund_of: Option<i64>,
}

/// Repository for ledger reads and deletes. Writes go through checkout/refund.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        get_by_id_in(&mut conn, id).await
    }

    pub async fn get_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, sale_id).await
    }

    /// Header plus lines, or `SaleNotFound`.
    pub async fn get_with_items(&self, id: i64) -> DbResult<SaleRecord> {
        let mut conn = self.pool.acquire().await?;
        let sale = get_by_id_in(&mut conn, id)
            .await?
            .ok_or(CoreError::SaleNotFound(id))?;
        let items = items_in(&mut conn, id).await?;

        Ok(SaleRecord { sale, items })
    }

    /// Most recent entries first, refunds included.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY id DESC LIMIT ?1"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Refund entries recorded against `sale_id`, oldest first.
    pub async fn refunds_of(&self, sale_id: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE refund_of = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Units already refunded per product for `sale_id`.
    pub async fn refunded_quantities(&self, sale_id: i64) -> DbResult<HashMap<i64, i64>> {
        let mut conn = self.pool.acquire().await?;
        refunded_quantities_in(&mut conn, sale_id).await
    }

    /// Deletes a sale; its items go with it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id = id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::SaleNotFound(id).into());
        }

        Ok(())
    }

    /// Sum of `total` over all entries (refunds net out). For diagnostics.
    pub async fn net_revenue(&self) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar("SELECT IFNULL(SUM(total_cents), 0) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(Money::from_cents(cents))
    }
}

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

pub(crate) async fn get_by_id_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(sale)
}

pub(crate) async fn items_in(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY id"
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub(crate) async fn refunded_quantities_in(
    conn: &mut SqliteConnection,
    sale_id: i64,
) -> DbResult<HashMap<i64, i64>> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT si.product_id, SUM(si.quantity) \
         FROM sale_items si \
         JOIN sales s ON s.id = si.sale_id \
         WHERE s.refund_of = ?1 \
         GROUP BY si.product_id",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

pub(crate) async fn insert_sale_in(conn: &mut SqliteConnection, new: &NewSale) -> DbResult<Sale> {
    debug!(
        user_id = new.user_id,
        payment_method = %new.payment_method,
        total = %new.totals.total,
        "Appending sale"
    );

    let sale = sqlx::query_as::<_, Sale>(&format!(
        "INSERT INTO sales ( \
            user_id, customer_id, subtotal_cents, tax_cents, discount_cents, total_cents, \
            payment_method, loyalty_points_used, loyalty_points_earned, refund_of, created_at \
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
         RETURNING {SALE_COLUMNS}"
    ))
    .bind(new.user_id)
    .bind(new.customer_id)
    .bind(new.totals.subtotal.cents())
    .bind(new.totals.tax.cents())
    .bind(new.totals.discount.cents())
    .bind(new.totals.total.cents())
    .bind(new.payment_method)
    .bind(new.loyalty_points_used)
    .bind(new.loyalty_points_earned)
    .bind(new.refund_of)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(sale)
}

/// Appends one line. `subtotal = unit_price × quantity` is computed here.
pub(crate) async fn insert_item_in(
    conn: &mut SqliteConnection,
    sale_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Money,
) -> DbResult<SaleItem> {
    let item = sqlx::query_as::<_, SaleItem>(&format!(
        "INSERT INTO sale_items (sale_id, product_id, quantity, unit_price_cents, subtotal_cents) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         RETURNING {ITEM_COLUMNS}"
    ))
    .bind(sale_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price.cents())
    .bind(unit_price.multiply_quantity(quantity).cents())
    .fetch_one(&mut *conn)
    .await?;

    Ok(item)
}
