//! # Domain Types
//!
//! Core domain types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    FoodItem     │   │    CartItem     │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  food_item_id   │   │  order_number   │       │
//! │  │  vendor_id      │   │  user_id        │   │  total_data     │       │
//! │  │  price_cents    │   │  quantity ≥ 1   │   │  tax_data       │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ 1:1             │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    TaxRule      │   │  OrderedFood    │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tax_type       │   │  frozen price   │──►│  transaction_id │       │
//! │  │  rate (bps)     │   │  frozen amount  │   │  amount_cents   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are UUID v4 strings. Users and vendors are owned by other
//! services; this crate only carries their ids.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::checkout::CheckoutState;
use crate::error::ValidationError;
use crate::money::Money;
use crate::split::{PerVendorTotals, VendorTotals};
use crate::tax::TaxBreakdown;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// Tax percentages are entered with two decimals ("8.25"), so
/// 1 bps = 0.01% represents every valid percentage exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Parses a two-decimal percentage string ("8.25", "10", "7.5").
    ///
    /// ```rust
    /// use bazaar_core::types::TaxRate;
    ///
    /// assert_eq!(TaxRate::parse_percentage("8.25").unwrap().bps(), 825);
    /// assert_eq!(TaxRate::parse_percentage("10").unwrap().bps(), 1000);
    /// assert!(TaxRate::parse_percentage("8.255").is_err());
    /// ```
    pub fn parse_percentage(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "tax_percentage".to_string(),
            reason: reason.to_string(),
        };

        let input = input.trim();
        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected a non-negative decimal number"));
        }
        if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("at most two decimal places"));
        }

        let whole: u32 = whole
            .parse()
            .map_err(|_| invalid("percentage is too large"))?;
        let frac_bps: u32 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u32>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => frac.parse::<u32>().map_err(|_| invalid("bad fraction"))?,
        };

        let bps = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac_bps))
            .ok_or_else(|| invalid("percentage is too large"))?;

        Ok(TaxRate(bps))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Two-decimal percentage ("8.25"). Used as the inner key of a tax breakdown.
impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Rule
// =============================================================================

/// A tax rule maintained by marketplace admins.
///
/// Read-only input to the tax engine. The active set can change at any time,
/// which is why checkout snapshots it once (see [`crate::tax::TaxEngine`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRule {
    pub id: String,
    /// Tax type label shown on receipts ("VAT", "Service").
    pub tax_type: String,
    pub rate: TaxRate,
    pub is_active: bool,
}

impl TaxRule {
    /// Creates an active rule with a fresh id.
    pub fn new(tax_type: impl Into<String>, rate: TaxRate) -> Self {
        TaxRule {
            id: Uuid::new_v4().to_string(),
            tax_type: tax_type.into(),
            rate,
            is_active: true,
        }
    }
}

// =============================================================================
// Vendor & Food Item
// =============================================================================

/// A seller in the marketplace. Owned by the vendor service.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    /// Where new-order alerts are sent.
    pub email: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A menu item. Its price is a point-in-time value: it is copied into
/// order snapshots and never referenced live after placement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FoodItem {
    pub id: String,
    pub vendor_id: String,
    pub title: String,
    pub price_cents: i64,
    pub is_available: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl FoodItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A persisted cart row. Unique per `(user_id, food_item_id)`.
///
/// ## Invariants
/// - `quantity >= 1` while the row exists (a zero-quantity row is deleted)
/// - at most one row per `(user_id, food_item_id)`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub food_item_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A cart item resolved against its food item's *current* price and vendor.
///
/// This is the input to the cart aggregator and the order splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub cart_item_id: String,
    pub food_item_id: String,
    pub vendor_id: String,
    pub title: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl CartLine {
    /// Unit price × quantity. Exact in cents, so no per-item rounding drift.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order. Transitions are driven by vendors/admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Accepted,
    Completed,
    Cancelled,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    PayPal,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::Cash => "Cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paypal" => Ok(PaymentMethod::PayPal),
            "cash" => Ok(PaymentMethod::Cash),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["PayPal".to_string(), "Cash".to_string()],
            }),
        }
    }
}

// =============================================================================
// Shipping Details (checkout form)
// =============================================================================

/// Contact and delivery fields copied verbatim from the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub pin_code: Option<String>,
}

impl ShippingDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// =============================================================================
// Order
// =============================================================================

/// The checkout aggregate. Immutable once paid, except for `status`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    /// Vendors touched by this order (denormalized for vendor queries).
    pub vendor_ids: Vec<String>,
    pub shipping: ShippingDetails,
    /// Per-vendor subtotal and tax breakdown, persisted as `total_data`.
    pub total_data: PerVendorTotals,
    /// Cart-wide tax breakdown, persisted as `tax_data`.
    pub tax_data: TaxBreakdown,
    pub subtotal_cents: i64,
    pub total_tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub checkout_state: CheckoutState,
    pub is_ordered: bool,
    pub needs_reconciliation: bool,
    pub reconciliation_note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn total_tax(&self) -> Money {
        Money::from_cents(self.total_tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// This vendor's share of the order, as recorded at placement.
    pub fn vendor_slice(&self, vendor_id: &str) -> Option<&VendorTotals> {
        self.total_data.get(vendor_id)
    }

    /// Subtotal attributed to a vendor (zero if the vendor is not on the order).
    pub fn subtotal_for_vendor(&self, vendor_id: &str) -> Money {
        self.vendor_slice(vendor_id)
            .map(|v| v.subtotal)
            .unwrap_or_default()
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A captured payment. Exactly one per order, created just before the order
/// is marked as ordered.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    /// Provider reference (PayPal capture id, cash drawer slip, ...).
    pub transaction_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Provider status string, stored as received ("COMPLETED").
    pub status: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Ordered Food (snapshot line)
// =============================================================================

/// A frozen copy of a cart line at the moment of payment commitment.
/// Price, vendor and title are copies and never follow later changes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderedFood {
    pub id: String,
    pub order_id: String,
    pub payment_id: String,
    pub user_id: String,
    pub food_item_id: String,
    pub vendor_id: String,
    pub title_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderedFood {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// An entry in the notification outbox queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationOutboxEntry {
    pub id: String,
    /// "customer_receipt" or "vendor_alert".
    pub kind: String,
    pub order_number: String,
    pub recipient: String,
    pub subject: String,
    /// The full [`crate::notification::NotificationEvent`] as JSON.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
