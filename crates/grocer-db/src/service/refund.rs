//! Refund transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{finish, SalesService};
use crate::error::DbResult;
use crate::repository::sale::{self, insert_item_in, insert_sale_in, NewSale, SaleRecord};
use crate::repository::product;
use grocer_core::refund::plan_refund;
use grocer_core::{
    ActivityAction, ActivityEntry, CartLine, CoreError, PaymentMethod, RefundLineRequest,
    RefundPlan, RefundRequest, Sale, Totals,
};

/// A refund against one committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCommand {
    pub sale_id: i64,
    pub operator_id: i64,
    pub request: RefundRequest,
}

impl RefundCommand {
    /// Everything still refundable on `sale_id`.
    pub fn full(sale_id: i64, operator_id: i64) -> Self {
        RefundCommand {
            sale_id,
            operator_id,
            request: RefundRequest::Full,
        }
    }

    pub fn lines(sale_id: i64, operator_id: i64, lines: Vec<RefundLineRequest>) -> Self {
        RefundCommand {
            sale_id,
            operator_id,
            request: RefundRequest::Lines(lines),
        }
    }
}

impl SalesService {
    /// Reverses all or part of a committed sale.
    ///
    /// Restocks each refunded line and appends a negative ledger entry with
    /// `payment_method = refund` pointing back at the original. Unit prices
    /// come from the original sale, never the current catalog.
    ///
    /// A complete first refund mirrors the original header exactly. Partial
    /// refunds get the original discount prorated by subtotal share and are
    /// re-taxed at the current rate.
    ///
    /// Requested lines with a quantity of zero or less are skipped; if
    /// nothing remains the refund fails with `NothingToRefund`.
    ///
    /// ## Errors
    /// - `SaleNotFound`, `ProductNotInSale`, `NothingToRefund`
    /// - `StockCeilingExceeded` when a policy ceiling is set
    /// - `Busy` when another writer holds the lock past the busy timeout
    pub async fn refund(&self, command: RefundCommand) -> DbResult<SaleRecord> {
        // Reads come first here, so take the write lock before them
        let mut tx = self.db.pool().begin_with("BEGIN IMMEDIATE").await?;
        let outcome = self.apply_refund(&mut tx, &command).await;
        let record = finish(tx, "refund", outcome).await?;

        info!(
            refund_id = record.sale.id,
            sale_id = command.sale_id,
            operator_id = command.operator_id,
            total = %record.sale.total(),
            "Refund committed"
        );

        self.activity.record(ActivityEntry {
            actor_id: command.operator_id,
            action: ActivityAction::Refund,
            entity_type: "sale".to_string(),
            entity_id: record.sale.id,
            details: serde_json::json!({
                "refund_of": command.sale_id,
                "total_cents": record.sale.total_cents,
                "items": record.items.len(),
            })
            .to_string(),
        });

        Ok(record)
    }

    async fn apply_refund(
        &self,
        conn: &mut SqliteConnection,
        command: &RefundCommand,
    ) -> DbResult<SaleRecord> {
        let original = sale::get_by_id_in(conn, command.sale_id)
            .await?
            .ok_or(CoreError::SaleNotFound(command.sale_id))?;
        if original.is_refund() {
            return Err(CoreError::NothingToRefund(command.sale_id).into());
        }

        let items = sale::items_in(conn, original.id).await?;
        let already_refunded = if self.policy.allow_repeat_refunds {
            Default::default()
        } else {
            sale::refunded_quantities_in(conn, original.id).await?
        };

        let plan = plan_refund(original.id, &items, &already_refunded, &command.request)?;
        debug!(
            sale_id = original.id,
            lines = plan.lines.len(),
            units = plan.total_quantity(),
            complete = plan.complete,
            "Refund planned"
        );

        let mut restocked = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let product = product::release_stock_in(
                conn,
                line.product_id,
                line.quantity,
                self.policy.max_stock_level,
            )
            .await?;
            restocked.push(CartLine {
                product_id: line.product_id,
                name: product.name,
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }

        let totals = self.refund_totals(&original, &plan, &restocked)?;

        let refund = insert_sale_in(
            conn,
            &NewSale {
                user_id: command.operator_id,
                customer_id: original.customer_id,
                totals,
                payment_method: PaymentMethod::Refund,
                loyalty_points_used: 0,
                loyalty_points_earned: 0,
                refund_of: Some(original.id),
            },
        )
        .await?;

        let mut refund_items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            refund_items.push(
                insert_item_in(conn, refund.id, line.product_id, line.quantity, line.unit_price)
                    .await?,
            );
        }

        Ok(SaleRecord {
            sale: refund,
            items: refund_items,
        })
    }

    fn refund_totals(
        &self,
        original: &Sale,
        plan: &RefundPlan,
        lines: &[CartLine],
    ) -> DbResult<Totals> {
        if plan.complete {
            return Ok(Totals {
                subtotal: original.subtotal(),
                discount: original.discount(),
                tax: original.tax(),
                total: original.total(),
            }
            .negated());
        }

        let discount = original.discount().prorate(plan.subtotal(), original.subtotal());
        let totals = self.pricing.price(lines, discount, None, Utc::now())?;
        Ok(totals.negated())
    }
}
