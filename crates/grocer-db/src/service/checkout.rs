//! Checkout transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{finish, SalesService};
use crate::error::DbResult;
use crate::repository::sale::{insert_item_in, insert_sale_in, NewSale, SaleRecord};
use crate::repository::{customer, product};
use grocer_core::validation::validate_points;
use grocer_core::{
    ActivityAction, ActivityEntry, Cart, CartLine, CoreError, Money, PaymentMethod, Totals,
    ValidationError, POINTS_PER_UNIT,
};

/// Everything a register sends to close a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub operator_id: i64,
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<i64>,
    /// Used only when no promotion applies.
    pub manual_discount: Money,
    pub promotion_id: Option<i64>,
    pub loyalty_points_used: i64,
}

impl CheckoutRequest {
    pub fn new(operator_id: i64, cart: &Cart, payment_method: PaymentMethod) -> Self {
        CheckoutRequest {
            operator_id,
            lines: cart.lines().to_vec(),
            payment_method,
            customer_id: None,
            manual_discount: Money::zero(),
            promotion_id: None,
            loyalty_points_used: 0,
        }
    }

    pub fn customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn manual_discount(mut self, discount: Money) -> Self {
        self.manual_discount = discount;
        self
    }

    pub fn promotion(mut self, promotion_id: i64) -> Self {
        self.promotion_id = Some(promotion_id);
        self
    }

    pub fn redeem_points(mut self, points: i64) -> Self {
        self.loyalty_points_used = points;
        self
    }

    /// One point per unit sold.
    pub fn points_earned(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum::<i64>() * POINTS_PER_UNIT
    }
}

impl SalesService {
    /// Converts a cart into a committed sale.
    ///
    /// All-or-nothing: on any error no stock is taken, no ledger row is
    /// written and no loyalty balance changes.
    ///
    /// ## Errors
    /// - `EmptyCart`, `Validation` - before anything is touched
    /// - `PromotionNotFound` - before anything is touched
    /// - `ProductNotFound`, `InsufficientStock`, `CustomerNotFound`,
    ///   `InsufficientPoints` - inside the transaction, rolled back
    pub async fn checkout(&self, request: CheckoutRequest) -> DbResult<SaleRecord> {
        if request.lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        if request.payment_method == PaymentMethod::Refund {
            return Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["cash".into(), "card".into(), "mobile".into()],
            }
            .into());
        }
        validate_points(request.loyalty_points_used)?;
        if request.loyalty_points_used > 0 && request.customer_id.is_none() {
            return Err(ValidationError::Required {
                field: "customer_id".to_string(),
            }
            .into());
        }

        let promotion = match request.promotion_id {
            Some(id) => Some(
                self.db
                    .promotions()
                    .get_by_id(id)
                    .await?
                    .ok_or(CoreError::PromotionNotFound(id))?,
            ),
            None => None,
        };

        let totals = self.pricing.price(
            &request.lines,
            request.manual_discount,
            promotion.as_ref(),
            Utc::now(),
        )?;

        debug!(
            operator_id = request.operator_id,
            lines = request.lines.len(),
            subtotal = %totals.subtotal,
            discount = %totals.discount,
            tax = %totals.tax,
            total = %totals.total,
            "Checkout priced"
        );

        let mut tx = self.db.pool().begin().await?;
        let outcome = self.apply_checkout(&mut tx, &request, totals).await;
        let record = finish(tx, "checkout", outcome).await?;

        info!(
            sale_id = record.sale.id,
            operator_id = record.sale.user_id,
            total = %record.sale.total(),
            points_earned = record.sale.loyalty_points_earned,
            "Checkout committed"
        );

        self.activity.record(ActivityEntry {
            actor_id: request.operator_id,
            action: ActivityAction::Create,
            entity_type: "sale".to_string(),
            entity_id: record.sale.id,
            details: serde_json::json!({
                "total_cents": record.sale.total_cents,
                "payment_method": record.sale.payment_method,
                "items": record.items.len(),
                "promotion_id": request.promotion_id,
            })
            .to_string(),
        });

        Ok(record)
    }

    async fn apply_checkout(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        totals: Totals,
    ) -> DbResult<SaleRecord> {
        // Reservations first: the write lock is taken before anything is read
        for line in &request.lines {
            product::reserve_stock_in(conn, line.product_id, line.quantity).await?;
        }

        let points_earned = request.points_earned();
        let sale = insert_sale_in(
            conn,
            &NewSale {
                user_id: request.operator_id,
                customer_id: request.customer_id,
                totals,
                payment_method: request.payment_method,
                loyalty_points_used: request.loyalty_points_used,
                loyalty_points_earned: points_earned,
                refund_of: None,
            },
        )
        .await?;

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            items.push(
                insert_item_in(conn, sale.id, line.product_id, line.quantity, line.unit_price)
                    .await?,
            );
        }

        if let Some(customer_id) = request.customer_id {
            customer::adjust_points_in(
                conn,
                customer_id,
                request.loyalty_points_used,
                points_earned,
                self.policy.enforce_points_balance,
            )
            .await?;
        }

        Ok(SaleRecord { sale, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::NewCustomer;
    use crate::service::test_support::{product, service};
    use grocer_core::{PromotionDraft, SaleItem};

    fn cart_of(lines: &[(&grocer_core::Product, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (p, qty) in lines {
            cart.add_product(p, *qty).unwrap();
        }
        cart
    }

    #[tokio::test]
    async fn test_checkout_basic_scenario() {
        let (service, sink) = service().await;
        let apples = product(&service, "Apples", 250, 10).await;

        let record = service
            .checkout(CheckoutRequest::new(1, &cart_of(&[(&apples, 4)]), PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(record.sale.subtotal_cents, 1000);
        assert_eq!(record.sale.discount_cents, 0);
        assert_eq!(record.sale.tax_cents, 80);
        assert_eq!(record.sale.total_cents, 1080);
        assert!(record.sale.is_balanced());
        assert_eq!(record.sale.loyalty_points_earned, 4);

        assert_eq!(record.items.len(), 1);
        let SaleItem { quantity, unit_price_cents, subtotal_cents, .. } = record.items[0];
        assert_eq!((quantity, unit_price_cents, subtotal_cents), (4, 250, 1000));

        let stock = service.database().products().get_by_id(apples.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 6);

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActivityAction::Create);
        assert_eq!(entries[0].entity_id, record.sale.id);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let (service, _) = service().await;
        let err = service
            .checkout(CheckoutRequest::new(1, &Cart::new(), PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptyCart));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_every_line() {
        let (service, sink) = service().await;
        let bread = product(&service, "Bread", 300, 5).await;
        let milk = product(&service, "Milk", 199, 1).await;

        let err = service
            .checkout(CheckoutRequest::new(
                1,
                &cart_of(&[(&bread, 2), (&milk, 3)]),
                PaymentMethod::Card,
            ))
            .await
            .unwrap_err();

        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product: "Milk".to_string(),
                available: 1,
                requested: 3,
            })
        );

        let products = service.database().products();
        assert_eq!(products.get_by_id(bread.id).await.unwrap().unwrap().quantity, 5);
        assert_eq!(products.get_by_id(milk.id).await.unwrap().unwrap().quantity, 1);
        assert!(service.database().sales().list_recent(10).await.unwrap().is_empty());
        assert!(sink.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let (service, _) = service().await;
        let bread = product(&service, "Bread", 300, 5).await;

        let lines = vec![
            CartLine::from_product(&bread, 1),
            CartLine {
                product_id: 999,
                name: "Ghost".to_string(),
                unit_price: Money::from_cents(100),
                quantity: 1,
            },
        ];
        let err = service
            .checkout(CheckoutRequest::new(1, &Cart::from_lines(lines), PaymentMethod::Cash))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
        let stock = service.database().products().get_by_id(bread.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 5);
    }

    #[tokio::test]
    async fn test_fixed_promotion_clamps_to_subtotal() {
        let (service, _) = service().await;
        let candy = product(&service, "Candy", 300, 5).await;
        let promo = service
            .database()
            .promotions()
            .insert(&PromotionDraft::fixed("Five Off", Money::from_cents(500)))
            .await
            .unwrap();

        let record = service
            .checkout(
                CheckoutRequest::new(1, &cart_of(&[(&candy, 1)]), PaymentMethod::Cash)
                    .promotion(promo.id)
                    .manual_discount(Money::from_cents(100)),
            )
            .await
            .unwrap();

        assert_eq!(record.sale.discount_cents, 300);
        assert_eq!(record.sale.tax_cents, 0);
        assert_eq!(record.sale.total_cents, 0);
    }

    #[tokio::test]
    async fn test_unknown_promotion_rejected_before_mutation() {
        let (service, _) = service().await;
        let candy = product(&service, "Candy", 300, 5).await;

        let err = service
            .checkout(
                CheckoutRequest::new(1, &cart_of(&[(&candy, 1)]), PaymentMethod::Cash)
                    .promotion(12),
            )
            .await
            .unwrap_err();

        assert_eq!(err.as_domain(), Some(&CoreError::PromotionNotFound(12)));
        let stock = service.database().products().get_by_id(candy.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 5);
    }

    #[tokio::test]
    async fn test_loyalty_points_earned_and_redeemed() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 400, 20).await;
        let customer = service
            .database()
            .customers()
            .insert(&NewCustomer::new("Sam").loyalty_points(10))
            .await
            .unwrap();

        let record = service
            .checkout(
                CheckoutRequest::new(1, &cart_of(&[(&tea, 3)]), PaymentMethod::Mobile)
                    .customer(customer.id)
                    .redeem_points(4),
            )
            .await
            .unwrap();
        assert_eq!(record.sale.loyalty_points_used, 4);
        assert_eq!(record.sale.loyalty_points_earned, 3);

        let after = service.database().customers().get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(after.loyalty_points, 9);
    }

    #[tokio::test]
    async fn test_over_redemption_rolls_back_stock() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 400, 20).await;
        let customer = service
            .database()
            .customers()
            .insert(&NewCustomer::new("Sam").loyalty_points(2))
            .await
            .unwrap();

        let err = service
            .checkout(
                CheckoutRequest::new(1, &cart_of(&[(&tea, 3)]), PaymentMethod::Cash)
                    .customer(customer.id)
                    .redeem_points(5),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_POINTS");
        let stock = service.database().products().get_by_id(tea.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 20);
        let balance = service.database().customers().get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(balance.loyalty_points, 2);
    }

    #[tokio::test]
    async fn test_unknown_customer_rolls_back() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 400, 20).await;

        let err = service
            .checkout(
                CheckoutRequest::new(1, &cart_of(&[(&tea, 1)]), PaymentMethod::Cash).customer(77),
            )
            .await
            .unwrap_err();

        assert_eq!(err.as_domain(), Some(&CoreError::CustomerNotFound(77)));
        assert!(service.database().sales().list_recent(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redeeming_without_customer_is_invalid() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 400, 20).await;

        let err = service
            .checkout(CheckoutRequest::new(1, &cart_of(&[(&tea, 1)]), PaymentMethod::Cash).redeem_points(1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_negative_unit_price_never_reaches_the_ledger() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 1000, 20).await;
        let jam = product(&service, "Jam", 900, 20).await;

        let mut refund_in_disguise = CartLine::from_product(&jam, 1);
        refund_in_disguise.unit_price = Money::from_cents(-900);
        let lines = vec![CartLine::from_product(&tea, 1), refund_in_disguise];

        let err = service
            .checkout(CheckoutRequest::new(1, &Cart::from_lines(lines), PaymentMethod::Cash))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(service.database().sales().list_recent(5).await.unwrap().is_empty());
        let stock = service.database().products().get_by_id(jam.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 20);
    }

    #[tokio::test]
    async fn test_overflowing_unit_price_is_rejected() {
        let (service, _) = service().await;
        let tea = product(&service, "Tea", 1000, 20).await;

        let mut line = CartLine::from_product(&tea, 3);
        line.unit_price = Money::from_cents(i64::MAX / 2);

        let err = service
            .checkout(CheckoutRequest::new(1, &Cart::from_lines(vec![line]), PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_catalog_change() {
        let (service, _) = service().await;
        let jam = product(&service, "Jam", 350, 5).await;

        let record = service
            .checkout(CheckoutRequest::new(1, &cart_of(&[(&jam, 1)]), PaymentMethod::Cash))
            .await
            .unwrap();

        service
            .database()
            .products()
            .update(jam.id, grocer_core::ProductDraft::new("Jam", Money::from_cents(500)).quantity(4))
            .await
            .unwrap();

        let stored = service.database().sales().get_items(record.sale.id).await.unwrap();
        assert_eq!(stored[0].unit_price_cents, 350);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        use crate::pool::{Database, DbConfig};
        use std::time::{SystemTime, UNIX_EPOCH};

        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let path = std::env::temp_dir().join(format!(
            "grocer-checkout-{}-{}.db",
            std::process::id(),
            nanos
        ));

        let db = Database::new(DbConfig::new(&path).max_connections(5)).await.unwrap();
        let service = SalesService::new(db.clone(), grocer_core::TaxRate::from_bps(800))
            .with_activity_sink(std::sync::Arc::new(
                crate::service::activity::TracingActivitySink,
            ));
        let last_loaf = product(&service, "Sourdough", 600, 3).await;

        let mut handles = Vec::new();
        for operator in 0..5 {
            let service = service.clone();
            let cart = cart_of(&[(&last_loaf, 3)]);
            handles.push(tokio::spawn(async move {
                service
                    .checkout(CheckoutRequest::new(operator, &cart, PaymentMethod::Cash))
                    .await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(err) => assert_eq!(err.code(), "INSUFFICIENT_STOCK"),
            }
        }

        assert_eq!(committed, 1);
        let stock = db.products().get_by_id(last_loaf.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 0);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 1);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
