//! # Order Splitter
//!
//! Partitions cart lines by vendor and computes each vendor's subtotal and
//! tax breakdown. The result is persisted verbatim as `Order.total_data`
//! and read back by vendor dashboards, vendor alerts and revenue reports.
//!
//! ## Split Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart lines (insertion order)                                           │
//! │    A  $10.00 × 2  vendor X                                              │
//! │    B  $ 5.00 × 1  vendor Y                                              │
//! │          │                                                              │
//! │          ▼  group by vendor, Σ price × qty                              │
//! │    X: 20.00        Y: 5.00                                              │
//! │          │                                                              │
//! │          ▼  TaxEngine (same snapshot for every vendor)                  │
//! │    X: {subtotal 20.00, VAT 10% 2.00}                                    │
//! │    Y: {subtotal  5.00, VAT 10% 0.50}                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - `Σ_v subtotal_v == cart subtotal` (exact, integer cents)
//! - `Σ_v total_tax_v == cart total tax` (the cart breakdown *is* the sum of
//!   the vendor breakdowns, see [`crate::cart::CartAggregator::amounts`])
//! - a vendor with no lines is absent, never present with a zero entry

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::tax::{TaxBreakdown, TaxEngine};
use crate::types::{CartLine, OrderedFood};

// =============================================================================
// Vendor Totals
// =============================================================================

/// One vendor's slice of an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VendorTotals {
    pub subtotal: Money,
    pub tax_breakdown: TaxBreakdown,
}

impl VendorTotals {
    pub fn total_tax(&self) -> Money {
        self.tax_breakdown.total_tax()
    }

    /// Subtotal plus tax: what this vendor's alert shows as the order total.
    pub fn total(&self) -> Money {
        self.subtotal + self.total_tax()
    }
}

// =============================================================================
// Per-Vendor Totals
// =============================================================================

/// Vendor id → that vendor's totals. Persisted as `Order.total_data`.
///
/// Serializes as a plain JSON object keyed by vendor id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PerVendorTotals(BTreeMap<String, VendorTotals>);

impl PerVendorTotals {
    pub fn new() -> Self {
        PerVendorTotals(BTreeMap::new())
    }

    pub fn insert(&mut self, vendor_id: impl Into<String>, totals: VendorTotals) {
        self.0.insert(vendor_id.into(), totals);
    }

    pub fn get(&self, vendor_id: &str) -> Option<&VendorTotals> {
        self.0.get(vendor_id)
    }

    pub fn contains_vendor(&self, vendor_id: &str) -> bool {
        self.0.contains_key(vendor_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VendorTotals)> {
        self.0.iter()
    }

    /// Vendor ids in key order.
    pub fn vendor_ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Σ of vendor subtotals.
    pub fn subtotal(&self) -> Money {
        self.0.values().map(|v| v.subtotal).sum()
    }

    /// Σ of vendor tax totals.
    pub fn total_tax(&self) -> Money {
        self.0.values().map(|v| v.total_tax()).sum()
    }

    /// Component-wise sum of all vendor breakdowns.
    pub fn tax_breakdown(&self) -> TaxBreakdown {
        let mut merged = TaxBreakdown::new();
        for totals in self.0.values() {
            merged.merge(&totals.tax_breakdown);
        }
        merged
    }
}

// =============================================================================
// Splitting
// =============================================================================

/// Distinct vendor ids touched by the lines, in first-seen (cart) order.
pub fn vendor_ids(lines: &[CartLine]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        if !ids.iter().any(|id| id == &line.vendor_id) {
            ids.push(line.vendor_id.clone());
        }
    }
    ids
}

/// Groups lines by vendor and computes each vendor's subtotal and tax.
///
/// Every vendor is taxed with the same `engine`, i.e. the same rule snapshot.
/// Lines without quantity contribute nothing and create no vendor entry.
///
/// ## Errors
/// `InvalidArgument` if a vendor subtotal comes out negative (negative price).
pub fn split_by_vendor(lines: &[CartLine], engine: &TaxEngine) -> CoreResult<PerVendorTotals> {
    let mut subtotals: BTreeMap<String, Money> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        *subtotals.entry(line.vendor_id.clone()).or_default() += line.line_total();
    }

    let mut totals = PerVendorTotals::new();
    for (vendor_id, subtotal) in subtotals {
        let tax_breakdown = engine.compute_tax(subtotal)?;
        totals.insert(
            vendor_id,
            VendorTotals {
                subtotal,
                tax_breakdown,
            },
        );
    }

    Ok(totals)
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Checks snapshot lines against the totals recorded at order placement.
///
/// For every vendor on either side, the recorded subtotal must equal Σ
/// `amount` of that vendor's snapshot lines. A cart emptied between
/// placement and snapshot shows up here as zero lines.
///
/// ## Errors
/// `InconsistentState` with the grand expected/actual subtotals and a detail
/// naming each mismatching vendor.
pub fn reconcile(
    order_number: &str,
    total_data: &PerVendorTotals,
    lines: &[OrderedFood],
) -> CoreResult<()> {
    let mut actual_by_vendor: BTreeMap<&str, Money> = BTreeMap::new();
    for line in lines {
        *actual_by_vendor.entry(line.vendor_id.as_str()).or_default() += line.amount();
    }

    let mut mismatches: Vec<String> = Vec::new();
    for (vendor_id, totals) in total_data.iter() {
        let actual = actual_by_vendor
            .get(vendor_id.as_str())
            .copied()
            .unwrap_or_default();
        if actual != totals.subtotal {
            mismatches.push(format!(
                "vendor {}: expected {}, found {}",
                vendor_id, totals.subtotal, actual
            ));
        }
    }
    for (vendor_id, actual) in &actual_by_vendor {
        if !total_data.contains_vendor(vendor_id) {
            mismatches.push(format!(
                "vendor {}: not on order, found {}",
                vendor_id, actual
            ));
        }
    }

    let expected = total_data.subtotal();
    let actual: Money = actual_by_vendor.values().sum();

    if mismatches.is_empty() && expected == actual {
        return Ok(());
    }

    let detail = if lines.is_empty() {
        "no snapshot lines".to_string()
    } else {
        mismatches.join("; ")
    };

    Err(CoreError::InconsistentState {
        order_number: order_number.to_string(),
        expected,
        actual,
        detail,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartAggregator;
    use crate::types::{TaxRate, TaxRule};
    use chrono::Utc;
    use proptest::prelude::*;

    fn line(food: &str, vendor: &str, price_cents: i64, quantity: i64) -> CartLine {
        CartLine {
            cart_item_id: format!("cart-{}", food),
            food_item_id: food.to_string(),
            vendor_id: vendor.to_string(),
            title: food.to_string(),
            unit_price: Money::from_cents(price_cents),
            quantity,
        }
    }

    fn snapshot(vendor: &str, amount_cents: i64) -> OrderedFood {
        OrderedFood {
            id: format!("of-{}-{}", vendor, amount_cents),
            order_id: "order-1".to_string(),
            payment_id: "pay-1".to_string(),
            user_id: "user-1".to_string(),
            food_item_id: "food".to_string(),
            vendor_id: vendor.to_string(),
            title_snapshot: "food".to_string(),
            quantity: 1,
            unit_price_cents: amount_cents,
            amount_cents,
            created_at: Utc::now(),
        }
    }

    fn ten_percent() -> TaxEngine {
        TaxEngine::new(vec![TaxRule::new("VAT", TaxRate::from_bps(1000))])
    }

    #[test]
    fn test_two_vendor_scenario() {
        let lines = vec![line("A", "X", 1000, 2), line("B", "Y", 500, 1)];
        let engine = ten_percent();

        let totals = split_by_vendor(&lines, &engine).unwrap();
        let amounts = CartAggregator::amounts(&lines, &engine).unwrap();

        assert_eq!(amounts.subtotal.to_decimal_string(), "25.00");
        assert_eq!(amounts.total_tax().to_decimal_string(), "2.50");
        assert_eq!(amounts.grand_total.to_decimal_string(), "27.50");

        let x = totals.get("X").unwrap();
        assert_eq!(x.subtotal.to_decimal_string(), "20.00");
        assert_eq!(x.total_tax().to_decimal_string(), "2.00");

        let y = totals.get("Y").unwrap();
        assert_eq!(y.subtotal.to_decimal_string(), "5.00");
        assert_eq!(y.total_tax().to_decimal_string(), "0.50");
    }

    #[test]
    fn test_absent_vendor_has_no_entry() {
        let lines = vec![line("A", "X", 1000, 2), line("B", "Y", 500, 0)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();

        assert_eq!(totals.len(), 1);
        assert!(!totals.contains_vendor("Y"));
        assert_eq!(vendor_ids(&lines), vec!["X".to_string()]);
    }

    #[test]
    fn test_vendor_ids_first_seen_order() {
        let lines = vec![
            line("A", "Z", 100, 1),
            line("B", "X", 100, 1),
            line("C", "Z", 100, 1),
        ];
        assert_eq!(vendor_ids(&lines), vec!["Z".to_string(), "X".to_string()]);
    }

    #[test]
    fn test_total_data_json_shape() {
        let lines = vec![line("A", "X", 1000, 2)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();
        let json = serde_json::to_string(&totals).unwrap();
        assert_eq!(
            json,
            r#"{"X":{"subtotal":2000,"tax_breakdown":{"VAT":{"10.00":200}}}}"#
        );

        let back: PerVendorTotals = serde_json::from_str(&json).unwrap();
        assert_eq!(back, totals);
    }

    #[test]
    fn test_reconcile_matching() {
        let lines = vec![line("A", "X", 1000, 2), line("B", "Y", 500, 1)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();
        let snap = vec![snapshot("X", 2000), snapshot("Y", 500)];

        assert!(reconcile("N1", &totals, &snap).is_ok());
    }

    #[test]
    fn test_reconcile_empty_snapshot() {
        let lines = vec![line("A", "X", 1000, 2)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();

        let err = reconcile("N1", &totals, &[]).unwrap_err();
        match err {
            CoreError::InconsistentState {
                expected,
                actual,
                detail,
                ..
            } => {
                assert_eq!(expected.cents(), 2000);
                assert_eq!(actual, Money::zero());
                assert_eq!(detail, "no snapshot lines");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reconcile_moved_between_vendors() {
        // Same grand sum, wrong attribution
        let lines = vec![line("A", "X", 1000, 1), line("B", "Y", 1000, 1)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();
        let snap = vec![snapshot("X", 2000)];

        let err = reconcile("N1", &totals, &snap).unwrap_err();
        assert!(matches!(err, CoreError::InconsistentState { .. }));
        assert!(err.to_string().contains("vendor Y"));
    }

    #[test]
    fn test_reconcile_unknown_vendor() {
        let lines = vec![line("A", "X", 1000, 1)];
        let totals = split_by_vendor(&lines, &ten_percent()).unwrap();
        let snap = vec![snapshot("X", 1000), snapshot("W", 300)];

        let err = reconcile("N1", &totals, &snap).unwrap_err();
        assert!(err.to_string().contains("vendor W: not on order"));
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    fn arb_lines() -> impl Strategy<Value = Vec<CartLine>> {
        prop::collection::vec((0usize..5, 0i64..50_000, 1i64..=999), 0..30).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (vendor, price, qty))| {
                    line(&format!("food-{}", i), &format!("vendor-{}", vendor), price, qty)
                })
                .collect()
        })
    }

    fn arb_engine() -> impl Strategy<Value = TaxEngine> {
        prop::collection::vec((0u32..3_000, any::<bool>()), 0..4).prop_map(|raw| {
            TaxEngine::new(
                raw.into_iter()
                    .enumerate()
                    .map(|(i, (bps, active))| {
                        let mut rule = TaxRule::new(format!("T{}", i), TaxRate::from_bps(bps));
                        rule.is_active = active;
                        rule
                    })
                    .collect(),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_split_sum_matches_cart_subtotal(lines in arb_lines(), engine in arb_engine()) {
            let totals = split_by_vendor(&lines, &engine).unwrap();
            prop_assert_eq!(totals.subtotal(), CartAggregator::subtotal(&lines));
        }

        #[test]
        fn prop_tax_sum_matches_cart_tax(lines in arb_lines(), engine in arb_engine()) {
            let totals = split_by_vendor(&lines, &engine).unwrap();
            let amounts = CartAggregator::amounts(&lines, &engine).unwrap();
            prop_assert_eq!(totals.total_tax(), amounts.total_tax());
            prop_assert_eq!(amounts.grand_total, amounts.subtotal + amounts.total_tax());
        }

        #[test]
        fn prop_every_vendor_entry_has_lines(lines in arb_lines(), engine in arb_engine()) {
            let totals = split_by_vendor(&lines, &engine).unwrap();
            let ids = vendor_ids(&lines);
            prop_assert_eq!(totals.len(), ids.len());
            for id in &ids {
                prop_assert!(totals.contains_vendor(id));
            }
        }

        #[test]
        fn prop_single_vendor_matches_engine(
            prices in prop::collection::vec((0i64..50_000, 1i64..=50), 1..10),
            engine in arb_engine(),
        ) {
            let lines: Vec<CartLine> = prices
                .into_iter()
                .enumerate()
                .map(|(i, (p, q))| line(&format!("f{}", i), "solo", p, q))
                .collect();
            let amounts = CartAggregator::amounts(&lines, &engine).unwrap();
            let direct = engine.compute_tax(amounts.subtotal).unwrap();
            prop_assert_eq!(amounts.tax_breakdown, direct);
        }
    }
}
