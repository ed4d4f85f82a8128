//! # Checkout
//!
//! The persisted checkout state machine, the checkout quote and order
//! number generation.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Draft ──place_order──► Validated ──commit_payment──► Committed        │
//! │     │                        │                            │             │
//! │     │                        │            snapshot (stays Committed)    │
//! │     │                        │                            │             │
//! │     │                        │                       finalize           │
//! │     │                        │                            ▼             │
//! │     │                        │                  NotificationsQueued     │
//! │     │                        │                        (terminal)        │
//! │     └────────────────────────┴───────► Failed ◄───────────┘             │
//! │                                       (terminal)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartAmounts;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::split::PerVendorTotals;

// =============================================================================
// Checkout State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Draft,
    Validated,
    Committed,
    NotificationsQueued,
    Failed,
}

impl CheckoutState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Draft => "draft",
            CheckoutState::Validated => "validated",
            CheckoutState::Committed => "committed",
            CheckoutState::NotificationsQueued => "notifications_queued",
            CheckoutState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::NotificationsQueued | CheckoutState::Failed
        )
    }

    /// Whether `self → next` is an allowed transition.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        match (self, next) {
            (Draft, Validated) => true,
            (Validated, Committed) => true,
            (Committed, NotificationsQueued) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Returns `next` if allowed, otherwise `InvalidTransition`.
    pub fn transition(&self, order_number: &str, next: CheckoutState) -> CoreResult<CheckoutState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                order_number: order_number.to_string(),
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Fails with `InvalidTransition` unless the order is currently `expected`.
    /// Used by steps that run inside a state (snapshot runs in Committed).
    pub fn require(&self, order_number: &str, expected: CheckoutState) -> CoreResult<()> {
        if *self == expected {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                order_number: order_number.to_string(),
                from: self.to_string(),
                to: expected.to_string(),
            })
        }
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Checkout Quote
// =============================================================================

/// Everything `place_order` freezes into the order, computed from one
/// cart read and one tax rule snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutQuote {
    /// Vendors in first-seen cart order.
    pub vendor_ids: Vec<String>,
    pub total_data: PerVendorTotals,
    pub amounts: CartAmounts,
}

impl CheckoutQuote {
    /// Rejects a quote whose parts were not computed together.
    ///
    /// - the vendor set must equal the `total_data` keys
    /// - Σ vendor subtotals must equal the cart subtotal
    /// - Σ vendor tax must equal the cart tax
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mismatch = |reason: String| ValidationError::Mismatch {
            field: "quote".to_string(),
            reason,
        };

        if self.vendor_ids.is_empty() || self.total_data.is_empty() {
            return Err(ValidationError::Required {
                field: "vendor_ids".to_string(),
            });
        }

        let mut quoted: Vec<&String> = self.vendor_ids.iter().collect();
        quoted.sort();
        quoted.dedup();
        let split: Vec<&String> = self.total_data.vendor_ids().collect();
        if quoted.len() != self.vendor_ids.len() || quoted != split {
            return Err(mismatch(
                "vendor set does not match per-vendor totals".to_string(),
            ));
        }

        let subtotal = self.total_data.subtotal();
        if subtotal != self.amounts.subtotal {
            return Err(mismatch(format!(
                "vendor subtotals sum to {}, cart subtotal is {}",
                subtotal, self.amounts.subtotal
            )));
        }

        let tax = self.total_data.total_tax();
        if tax != self.amounts.total_tax() {
            return Err(mismatch(format!(
                "vendor tax sums to {}, cart tax is {}",
                tax,
                self.amounts.total_tax()
            )));
        }

        if self.amounts.grand_total != self.amounts.subtotal + self.amounts.total_tax() {
            return Err(mismatch("grand total is not subtotal + tax".to_string()));
        }

        Ok(())
    }
}

// =============================================================================
// Order Number
// =============================================================================

/// Builds an order number: UTC timestamp to the millisecond followed by the
/// last 8 alphanumerics of the customer id.
///
/// ```text
/// 20240315142530123  +  a1b2c3d4   →  20240315142530123a1b2c3d4
/// ```
///
/// Not unique on its own; the store's UNIQUE constraint catches collisions
/// and the committer retries with a later timestamp.
pub fn generate_order_number(customer_id: &str, now: DateTime<Utc>) -> String {
    let alnum: Vec<char> = customer_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let suffix: String = alnum[alnum.len().saturating_sub(8)..].iter().collect();

    format!("{}{}", now.format("%Y%m%d%H%M%S%3f"), suffix)
}
