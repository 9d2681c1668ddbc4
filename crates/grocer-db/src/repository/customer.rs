//! # Customer Repository
//!
//! Customers matter to checkout only through their loyalty balance, which
//! is adjusted inside the checkout transaction (see [`adjust_points_in`]).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use grocer_core::validation::validate_name;
use grocer_core::{CoreError, Customer, ValidationError};

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, loyalty_points, created_at";

/// Fields for registering a customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub loyalty_points: i64,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>) -> Self {
        NewCustomer {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn loyalty_points(mut self, points: i64) -> Self {
        self.loyalty_points = points;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &NewCustomer) -> DbResult<Customer> {
        validate_name("customer name", &customer.name)?;
        if customer.loyalty_points < 0 {
            return Err(ValidationError::OutOfRange {
                field: "loyalty_points".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        debug!(name = %customer.name, "Inserting customer");

        let created = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (name, email, phone, loyalty_points, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(customer.name.trim())
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.loyalty_points)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        get_by_id_in(&mut conn, id).await
    }
}

pub(crate) async fn get_by_id_in(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(customer)
}

/// Applies `balance − redeemed + earned` in one statement.
///
/// With `guard_balance`, the update only happens while the balance covers
/// the redemption; otherwise it fails with `InsufficientPoints`.
pub(crate) async fn adjust_points_in(
    conn: &mut SqliteConnection,
    id: i64,
    redeemed: i64,
    earned: i64,
    guard_balance: bool,
) -> DbResult<Customer> {
    debug!(id = id, redeemed = redeemed, earned = earned, "Adjusting loyalty points");

    let updated = sqlx::query_as::<_, Customer>(&format!(
        "UPDATE customers \
         SET loyalty_points = loyalty_points - ?2 + ?3 \
         WHERE id = ?1 AND (?4 = 0 OR loyalty_points >= ?2) \
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(id)
    .bind(redeemed)
    .bind(earned)
    .bind(guard_balance)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(customer) = updated {
        return Ok(customer);
    }

    match get_by_id_in(conn, id).await? {
        None => Err(CoreError::CustomerNotFound(id).into()),
        Some(customer) => Err(CoreError::InsufficientPoints {
            available: customer.loyalty_points,
            requested: redeemed,
        }
        .into()),
    }
}
