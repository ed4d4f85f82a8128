//! # bazaar-db: Persistence and Checkout for the Bazaar marketplace
//!
//! SQLite storage via sqlx, the per-user cart store and the order
//! committer that turns a cart into a paid, per-vendor order.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (add_to_cart, place_order, payments)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bazaar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Checkout    │  │   │
//! │  │   │   (pool.rs)   │    │               │    │              │  │   │
//! │  │   │               │    │ CartStore     │    │ OrderCommit- │  │   │
//! │  │   │ SqlitePool    │◄───│ CatalogRepo   │◄───│ ter          │  │   │
//! │  │   │ KeyedLocks    │    │ OrderRepo     │    │              │  │   │
//! │  │   │ Migrations    │    │ OutboxRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` and the service-level `MarketError`
//! - [`lock`] - Per-owner / per-order async locks
//! - [`repository`] - Catalog, cart, order and outbox repositories
//! - [`checkout`] - The `OrderCommitter` checkout service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/bazaar.db")).await?;
//!
//! db.carts().add_item(&user_id, &food_item_id).await?;
//! let quote = db.checkout().prepare_checkout(&user_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod lock;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::OrderCommitter;
pub use error::{DbError, DbResult, ErrorCode, ErrorResponse, MarketError, MarketResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::{CartStore, CartUpdate};
pub use repository::catalog::CatalogRepository;
pub use repository::notification::NotificationOutboxRepository;
pub use repository::order::OrderRepository;
