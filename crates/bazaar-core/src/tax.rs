//! # Tax Engine
//!
//! Computes a per-rule tax breakdown for a subtotal.
//!
//! ## Breakdown Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tax_type ──► { percentage ──► amount }                                 │
//! │                                                                         │
//! │  {                                                                      │
//! │    "VAT":     { "10.00": 250 },                                         │
//! │    "Service": {  "2.50":  63 }                                          │
//! │  }                                                                      │
//! │                                                                         │
//! │  total_tax = Σ already-rounded components = 313                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are integer cents. Keys are ordered (`BTreeMap`) so the persisted
//! JSON is byte-stable for the same inputs.
//!
//! ## Rule Snapshot
//! A [`TaxEngine`] owns a copy of the active rules taken at construction.
//! Checkout builds one engine and uses it for every computation in that
//! checkout, so a rule toggled by an admin mid-flow cannot make the cart
//! total and the per-vendor totals disagree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TaxRule;

// =============================================================================
// Tax Breakdown
// =============================================================================

/// Per-rule tax amounts, keyed by tax type then by percentage string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBreakdown(BTreeMap<String, BTreeMap<String, Money>>);

impl TaxBreakdown {
    /// An empty breakdown (no active rules, or nothing taxed).
    pub fn new() -> Self {
        TaxBreakdown(BTreeMap::new())
    }

    /// Adds an amount under `tax_type` / `percentage`, summing with any
    /// amount already recorded under the same keys.
    pub fn add(&mut self, tax_type: &str, percentage: &str, amount: Money) {
        *self
            .0
            .entry(tax_type.to_string())
            .or_default()
            .entry(percentage.to_string())
            .or_default() += amount;
    }

    /// Component-wise sum of another breakdown into this one.
    pub fn merge(&mut self, other: &TaxBreakdown) {
        for (tax_type, rates) in &other.0 {
            for (percentage, amount) in rates {
                self.add(tax_type, percentage, *amount);
            }
        }
    }

    /// Sum of all components.
    pub fn total_tax(&self) -> Money {
        self.0.values().flat_map(|rates| rates.values()).sum()
    }

    /// Amount recorded for a type/percentage pair, if any.
    pub fn get(&self, tax_type: &str, percentage: &str) -> Option<Money> {
        self.0.get(tax_type).and_then(|r| r.get(percentage)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Money>)> {
        self.0.iter()
    }
}

// =============================================================================
// Tax Engine
// =============================================================================

/// Pure tax calculator over a snapshot of active rules.
#[derive(Debug, Clone, Default)]
pub struct TaxEngine {
    rules: Vec<TaxRule>,
}

impl TaxEngine {
    /// Snapshots the given rules. Inactive rules are dropped here, so callers
    /// may pass the full rule table.
    pub fn new(rules: Vec<TaxRule>) -> Self {
        let rules = rules.into_iter().filter(|r| r.is_active).collect();
        TaxEngine { rules }
    }

    /// Rules in this snapshot (active only).
    pub fn rules(&self) -> &[TaxRule] {
        &self.rules
    }

    /// Computes the tax breakdown for a subtotal.
    ///
    /// Each rule is rounded half-up to the cent on its own; the total is the
    /// sum of the rounded components. An empty rule set yields an empty
    /// breakdown with zero total.
    ///
    /// ## Errors
    /// `InvalidArgument` if `subtotal` is negative.
    pub fn compute_tax(&self, subtotal: Money) -> CoreResult<TaxBreakdown> {
        if subtotal.is_negative() {
            return Err(CoreError::invalid_argument(
                "subtotal",
                format!("must not be negative, got {}", subtotal),
            ));
        }

        let mut breakdown = TaxBreakdown::new();
        for rule in &self.rules {
            let amount = subtotal.calculate_tax(rule.rate);
            breakdown.add(&rule.tax_type, &rule.rate.to_string(), amount);
        }

        Ok(breakdown)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
