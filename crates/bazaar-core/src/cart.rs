//! # Cart Aggregator
//!
//! Cart-wide amounts computed from resolved cart lines.
//!
//! ```text
//! lines ──► subtotal  = Σ price × qty           (exact cents)
//!       ──► tax       = Σ_v TaxEngine(subtotal_v) (per vendor, same snapshot)
//!       ──► grand     = subtotal + tax
//!       ──► item count = Σ qty                  (badge, checkout gate)
//! ```
//!
//! The cart tax is taken from the per-vendor split rather than from the
//! aggregate subtotal. Rounding therefore happens per rule per vendor, and the
//! customer's receipt always equals the sum of what the vendors see.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::split::split_by_vendor;
use crate::tax::{TaxBreakdown, TaxEngine};
use crate::types::CartLine;

/// Cart totals shown on the cart page and frozen into the order at placement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartAmounts {
    pub subtotal: Money,
    pub tax_breakdown: TaxBreakdown,
    pub grand_total: Money,
}

impl CartAmounts {
    pub fn total_tax(&self) -> Money {
        self.tax_breakdown.total_tax()
    }
}

/// Stateless cart math over resolved lines.
pub struct CartAggregator;

impl CartAggregator {
    /// Σ unit price × quantity.
    pub fn subtotal(lines: &[CartLine]) -> Money {
        lines
            .iter()
            .filter(|l| l.quantity > 0)
            .map(CartLine::line_total)
            .sum()
    }

    /// Σ quantities. Zero means there is nothing to check out.
    pub fn item_count(lines: &[CartLine]) -> i64 {
        lines.iter().map(|l| l.quantity.max(0)).sum()
    }

    /// Subtotal, tax breakdown and grand total under one rule snapshot.
    pub fn amounts(lines: &[CartLine], engine: &TaxEngine) -> CoreResult<CartAmounts> {
        let per_vendor = split_by_vendor(lines, engine)?;
        let subtotal = per_vendor.subtotal();
        let tax_breakdown = per_vendor.tax_breakdown();
        let grand_total = subtotal + tax_breakdown.total_tax();

        Ok(CartAmounts {
            subtotal,
            tax_breakdown,
            grand_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaxRate, TaxRule};

    fn line(vendor: &str, price_cents: i64, quantity: i64) -> CartLine {
        CartLine {
            cart_item_id: "c".to_string(),
            food_item_id: "f".to_string(),
            vendor_id: vendor.to_string(),
            title: "Dumplings".to_string(),
            unit_price: Money::from_cents(price_cents),
            quantity,
        }
    }

    #[test]
    fn test_empty_cart() {
        let engine = TaxEngine::new(vec![TaxRule::new("VAT", TaxRate::from_bps(1000))]);
        let amounts = CartAggregator::amounts(&[], &engine).unwrap();

        assert_eq!(amounts.subtotal, Money::zero());
        assert_eq!(amounts.grand_total, Money::zero());
        assert!(amounts.tax_breakdown.is_empty());
        assert_eq!(CartAggregator::item_count(&[]), 0);
    }

    #[test]
    fn test_item_count_and_subtotal() {
        let lines = vec![line("X", 1000, 2), line("Y", 500, 3)];
        assert_eq!(CartAggregator::item_count(&lines), 5);
        assert_eq!(CartAggregator::subtotal(&lines).cents(), 3500);
    }

    #[test]
    fn test_tax_rounded_per_vendor() {
        // 5¢ at two vendors, 10%: each vendor rounds 0.5¢ up to 1¢
        let engine = TaxEngine::new(vec![TaxRule::new("VAT", TaxRate::from_bps(1000))]);
        let lines = vec![line("X", 5, 1), line("Y", 5, 1)];
        let amounts = CartAggregator::amounts(&lines, &engine).unwrap();

        assert_eq!(amounts.subtotal.cents(), 10);
        assert_eq!(amounts.total_tax().cents(), 2);
        assert_eq!(amounts.grand_total.cents(), 12);
    }
}
