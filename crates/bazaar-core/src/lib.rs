//! # bazaar-core: Pure Business Logic for the Bazaar marketplace
//!
//! Everything that decides *how much* a customer pays and *which vendor*
//! gets which share lives here, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                HTTP handlers (outside this repo)                │   │
//! │  │    add_to_cart ──► cart view ──► place_order ──► payments       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      bazaar-db: CartStore, OrderCommitter, outbox (SQLite)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  money  │ │   tax   │ │  cart   │ │  split  │ │ checkout │ │   │
//! │  │   │  Money  │ │TaxEngine│ │Aggreg.  │ │Splitter │ │ states   │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`types`] - Domain types (FoodItem, CartItem, Order, Payment, ...)
//! - [`tax`] - TaxEngine and TaxBreakdown
//! - [`cart`] - CartAggregator: subtotal, item count, amounts
//! - [`split`] - OrderSplitter and snapshot reconciliation
//! - [`checkout`] - Checkout state machine and order numbers
//! - [`notification`] - Customer receipt / vendor alert payloads
//! - [`revenue`] - Vendor revenue over placed orders
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::Money;
//! use bazaar_core::tax::TaxEngine;
//! use bazaar_core::types::{TaxRate, TaxRule};
//!
//! let engine = TaxEngine::new(vec![TaxRule::new("VAT", TaxRate::from_bps(1000))]);
//!
//! let breakdown = engine.compute_tax(Money::from_cents(2500)).unwrap();
//! assert_eq!(breakdown.total_tax().cents(), 250);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod error;
pub mod money;
pub mod notification;
pub mod revenue;
pub mod split;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{CartAggregator, CartAmounts};
pub use checkout::{CheckoutQuote, CheckoutState};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use split::{PerVendorTotals, VendorTotals};
pub use tax::{TaxBreakdown, TaxEngine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct food items allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single food item in a cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest accepted food price ($1,000,000.00). A full cart at this price
/// stays far inside `i64` cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Attempts made before a lost race (cart quantity, order number) is
/// surfaced to the caller as a conflict.
pub const MAX_CONFLICT_RETRIES: u32 = 3;
