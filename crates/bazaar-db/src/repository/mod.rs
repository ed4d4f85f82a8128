//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.carts().add_item(&user, &food)                             │
//! │       ▼                                                                 │
//! │  CartStore                                                             │
//! │  ├── add_item / decrease_item / remove_item                            │
//! │  ├── list_items / lines / item_count / amounts                         │
//! │  └── clear                                                             │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Row structs stay private to each module; callers only see the         │
//! │  bazaar-core types.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Vendors, food items, tax rules
//! - [`CartStore`](cart::CartStore) - Per-user cart with quantity invariants
//! - [`OrderRepository`](order::OrderRepository) - Orders, payments, snapshot lines, vendor revenue
//! - [`NotificationOutboxRepository`](notification::NotificationOutboxRepository) - Notification queue

pub mod cart;
pub mod catalog;
pub mod notification;
pub mod order;
