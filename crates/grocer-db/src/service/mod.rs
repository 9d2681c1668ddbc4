//! # Sales Service
//!
//! The transaction engine: checkout, refund and product lookup.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  One call = one SQLite transaction                      │
//! │                                                                         │
//! │  validate + price (no I/O beyond reading the promotion)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │   ├── reserve / release stock per line                                 │
//! │   ├── append Sale + SaleItems                                          │
//! │   └── adjust loyalty balance (checkout only)                           │
//! │       │                                                                 │
//! │       ├── any error ──► ROLLBACK, return the error, nothing visible   │
//! │       ▼                                                                 │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  activity sink (best effort, outside the transaction)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite admits one writer at a time. Concurrent checkouts against the
//! same product queue on the write lock (up to the busy timeout) and each
//! one re-checks stock in its own conditional decrement, so no two can
//! oversell.

pub mod activity;
mod checkout;
mod refund;

use std::sync::Arc;

use sqlx::{Sqlite, Transaction};
use tracing::{error, warn};

use crate::config::{SalesPolicy, StoreConfig};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use activity::{ActivitySink, DbActivitySink};
use grocer_core::{CoreError, PricingEngine, Product, TaxRate};

pub use checkout::CheckoutRequest;
pub use refund::RefundCommand;

/// Entry point for the external web layer.
#[derive(Clone)]
pub struct SalesService {
    db: Database,
    pricing: PricingEngine,
    policy: SalesPolicy,
    activity: Arc<dyn ActivitySink>,
}

impl std::fmt::Debug for SalesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesService")
            .field("pricing", &self.pricing)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SalesService {
    /// Service with default policy, logging activity to the database.
    pub fn new(db: Database, tax_rate: TaxRate) -> Self {
        let activity = Arc::new(DbActivitySink::new(db.activity()));
        SalesService {
            db,
            pricing: PricingEngine::new(tax_rate),
            policy: SalesPolicy::default(),
            activity,
        }
    }

    /// Service configured from a [`StoreConfig`].
    pub fn from_config(db: Database, config: &StoreConfig) -> Self {
        SalesService::new(db, config.tax_rate).with_policy(config.policy)
    }

    pub fn with_policy(mut self, policy: SalesPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_activity_sink(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.activity = sink;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn policy(&self) -> &SalesPolicy {
        &self.policy
    }

    /// Resolves a free-text token (id, SKU, barcode or partial name).
    pub async fn lookup_product(&self, token: &str) -> DbResult<Product> {
        self.db
            .products()
            .find_by_identifier(token)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(token.trim().to_string()).into())
    }
}

/// Commits `tx` on success, rolls it back on failure.
///
/// A failed rollback is logged; the original error is what the caller sees.
async fn finish<T>(
    tx: Transaction<'_, Sqlite>,
    operation: &'static str,
    outcome: DbResult<T>,
) -> DbResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| match DbError::from(e) {
                DbError::Busy => DbError::Busy,
                other => DbError::TransactionFailed(other.to_string()),
            })?;
            Ok(value)
        }
        Err(err) => {
            warn!(operation, code = err.code(), error = %err, "Rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(operation, error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
