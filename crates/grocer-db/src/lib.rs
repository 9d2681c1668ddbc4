//! # grocer-db: Storage and Transactions for Grocer POS
//!
//! SQLite persistence for the catalog, promotions, customers and the sale
//! ledger, plus the checkout and refund transactions that tie them together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Grocer POS Data Flow                             │
//! │                                                                         │
//! │  Web layer / register (external)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    grocer-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SalesService  │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │ (service/)    │───►│ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ checkout      │    │ ProductRepo   │    │ 001_initial  │  │   │
//! │  │   │ refund        │    │ SaleRepo      │    │  _schema.sql │  │   │
//! │  │   │ lookup        │    │ CustomerRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                    │                               │   │
//! │  │           └──── grocer-core (pricing, promotions, refunds) ───┘   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL, foreign keys on)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven store configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`service`] - Checkout and refund transactions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grocer_core::{Cart, PaymentMethod};
//! use grocer_db::{CheckoutRequest, Database, SalesService, StoreConfig};
//!
//! let config = StoreConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//! let service = SalesService::from_config(db, &config);
//!
//! let mut cart = Cart::new();
//! cart.add_product(&service.lookup_product("MILK-1L").await?, 2)?;
//! let receipt = service
//!     .checkout(CheckoutRequest::new(operator_id, &cart, PaymentMethod::Cash))
//!     .await?;
//! ```

use tracing_subscriber::EnvFilter;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, SalesPolicy, StoreConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::activity::{ActivityLog, ActivityRepository};
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::product::{LookupStrategy, ProductRepository};
pub use repository::promotion::PromotionRepository;
pub use repository::sale::{SaleRecord, SaleRepository};

pub use service::activity::{ActivitySink, DbActivitySink, TracingActivitySink};
pub use service::{CheckoutRequest, RefundCommand, SalesService};

/// Installs the global `tracing` subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=grocer=trace` - Show trace for grocer crates only
/// - Default: INFO, with DEBUG for grocer crates
///
/// Calling it twice is harmless; the second call does nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,grocer=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
