//! # Repository Module
//!
//! Database repository implementations for Grocer POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SalesService / caller                                                 │
//! │       │                                                                 │
//! │       │  db.products().find_by_identifier("MILK-1L")                   │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── find_by_identifier(&self, token)                                  │
//! │  ├── reserve_stock(&self, id, qty)                                     │
//! │  ├── insert(&self, draft)                                              │
//! │  └── update(&self, id, draft)                                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Each repository also exposes `*_in(conn, ..)` functions so the        │
//! │  checkout and refund transactions can run the same SQL on their own    │
//! │  transaction instead of the pool.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog store
//! - [`PromotionRepository`](promotion::PromotionRepository) - Promotion rows
//! - [`CustomerRepository`](customer::CustomerRepository) - Loyalty balances
//! - [`SaleRepository`](sale::SaleRepository) - Sale ledger
//! - [`ActivityRepository`](activity::ActivityRepository) - Audit trail

pub mod activity;
pub mod customer;
pub mod product;
pub mod promotion;
pub mod sale;
