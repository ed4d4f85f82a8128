//! # Notification Events
//!
//! Payloads emitted when an order is finalized. Delivery lives elsewhere
//! (the outbox dispatcher); this module only defines the shapes and how
//! they are built from a committed order.
//!
//! ```text
//! finalize(order)
//!     ├──► CustomerReceipt  → order email   "Thank you for ordering with us!"
//!     └──► VendorAlert × n  → vendor email  "You have received a new order."
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::tax::TaxBreakdown;
use crate::types::{Order, OrderedFood, Payment, PaymentMethod};

pub const CUSTOMER_RECEIPT_SUBJECT: &str = "Thank you for ordering with us!";
pub const VENDOR_ALERT_SUBJECT: &str = "You have received a new order.";

/// One line on a receipt or vendor alert, taken from a snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub food_item_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub amount: Money,
}

impl From<&OrderedFood> for ReceiptLine {
    fn from(row: &OrderedFood) -> Self {
        ReceiptLine {
            food_item_id: row.food_item_id.clone(),
            title: row.title_snapshot.clone(),
            quantity: row.quantity,
            unit_price: row.unit_price(),
            amount: row.amount(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerReceipt {
    pub recipient: String,
    pub customer_name: String,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
    pub subtotal: Money,
    pub tax_breakdown: TaxBreakdown,
    pub total: Money,
    pub line_items: Vec<ReceiptLine>,
}

impl CustomerReceipt {
    pub fn build(order: &Order, payment: &Payment, lines: &[OrderedFood]) -> Self {
        CustomerReceipt {
            recipient: order.shipping.email.clone(),
            customer_name: order.shipping.full_name(),
            order_number: order.order_number.clone(),
            created_at: order.created_at,
            payment_method: payment.method,
            transaction_id: payment.transaction_id.clone(),
            subtotal: order.subtotal(),
            tax_breakdown: order.tax_data.clone(),
            total: order.total(),
            line_items: lines.iter().map(ReceiptLine::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAlert {
    pub recipient: String,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub vendor_id: String,
    pub vendor_subtotal: Money,
    pub vendor_tax_breakdown: TaxBreakdown,
    pub vendor_total: Money,
    pub vendor_line_items: Vec<ReceiptLine>,
}

impl VendorAlert {
    /// Builds the alert from the vendor's slice of `total_data` and that
    /// vendor's snapshot rows. `None` if the vendor is not on the order.
    pub fn build(
        order: &Order,
        vendor_id: &str,
        vendor_email: &str,
        lines: &[OrderedFood],
    ) -> Option<Self> {
        let slice = order.vendor_slice(vendor_id)?;
        Some(VendorAlert {
            recipient: vendor_email.to_string(),
            order_number: order.order_number.clone(),
            created_at: order.created_at,
            vendor_id: vendor_id.to_string(),
            vendor_subtotal: slice.subtotal,
            vendor_tax_breakdown: slice.tax_breakdown.clone(),
            vendor_total: slice.total(),
            vendor_line_items: lines
                .iter()
                .filter(|l| l.vendor_id == vendor_id)
                .map(ReceiptLine::from)
                .collect(),
        })
    }
}

/// A queued notification. Stored as JSON in the outbox payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    CustomerReceipt(CustomerReceipt),
    VendorAlert(VendorAlert),
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::CustomerReceipt(_) => "customer_receipt",
            NotificationEvent::VendorAlert(_) => "vendor_alert",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            NotificationEvent::CustomerReceipt(_) => CUSTOMER_RECEIPT_SUBJECT,
            NotificationEvent::VendorAlert(_) => VENDOR_ALERT_SUBJECT,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            NotificationEvent::CustomerReceipt(r) => &r.recipient,
            NotificationEvent::VendorAlert(a) => &a.recipient,
        }
    }

    pub fn order_number(&self) -> &str {
        match self {
            NotificationEvent::CustomerReceipt(r) => &r.order_number,
            NotificationEvent::VendorAlert(a) => &a.order_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutState;
    use crate::split::{PerVendorTotals, VendorTotals};
    use crate::types::{OrderStatus, ShippingDetails};

    fn breakdown(cents: i64) -> TaxBreakdown {
        let mut b = TaxBreakdown::new();
        b.add("VAT", "10.00", Money::from_cents(cents));
        b
    }

    fn order() -> Order {
        let mut total_data = PerVendorTotals::new();
        total_data.insert(
            "X",
            VendorTotals {
                subtotal: Money::from_cents(2000),
                tax_breakdown: breakdown(200),
            },
        );
        total_data.insert(
            "Y",
            VendorTotals {
                subtotal: Money::from_cents(500),
                tax_breakdown: breakdown(50),
            },
        );
        let now = Utc::now();
        Order {
            id: "o1".to_string(),
            order_number: "N1".to_string(),
            user_id: "u1".to_string(),
            vendor_ids: vec!["X".to_string(), "Y".to_string()],
            shipping: ShippingDetails {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                ..Default::default()
            },
            tax_data: total_data.tax_breakdown(),
            total_data,
            subtotal_cents: 2500,
            total_tax_cents: 250,
            total_cents: 2750,
            payment_method: PaymentMethod::PayPal,
            payment_id: Some("p1".to_string()),
            status: OrderStatus::New,
            checkout_state: CheckoutState::Committed,
            is_ordered: true,
            needs_reconciliation: false,
            reconciliation_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn row(vendor: &str, title: &str, qty: i64, price: i64) -> OrderedFood {
        OrderedFood {
            id: format!("of-{}", title),
            order_id: "o1".to_string(),
            payment_id: "p1".to_string(),
            user_id: "u1".to_string(),
            food_item_id: format!("f-{}", title),
            vendor_id: vendor.to_string(),
            title_snapshot: title.to_string(),
            quantity: qty,
            unit_price_cents: price,
            amount_cents: price * qty,
            created_at: Utc::now(),
        }
    }

    fn payment() -> Payment {
        Payment {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            transaction_id: "TX-1".to_string(),
            method: PaymentMethod::PayPal,
            amount_cents: 2750,
            status: "COMPLETED".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_customer_receipt() {
        let lines = vec![row("X", "A", 2, 1000), row("Y", "B", 1, 500)];
        let receipt = CustomerReceipt::build(&order(), &payment(), &lines);

        assert_eq!(receipt.recipient, "ada@example.com");
        assert_eq!(receipt.customer_name, "Ada Lovelace");
        assert_eq!(receipt.total.cents(), 2750);
        assert_eq!(receipt.tax_breakdown.total_tax().cents(), 250);
        assert_eq!(receipt.line_items.len(), 2);
    }

    #[test]
    fn test_vendor_alert_has_only_vendor_lines() {
        let lines = vec![row("X", "A", 2, 1000), row("Y", "B", 1, 500)];
        let alert = VendorAlert::build(&order(), "X", "x@vendor.test", &lines).unwrap();

        assert_eq!(alert.vendor_subtotal.cents(), 2000);
        assert_eq!(alert.vendor_total.cents(), 2200);
        assert_eq!(alert.vendor_line_items.len(), 1);
        assert_eq!(alert.vendor_line_items[0].title, "A");

        assert!(VendorAlert::build(&order(), "Z", "z@vendor.test", &lines).is_none());
    }

    #[test]
    fn test_event_is_tagged() {
        let lines = vec![row("X", "A", 2, 1000)];
        let event = NotificationEvent::VendorAlert(
            VendorAlert::build(&order(), "X", "x@vendor.test", &lines).unwrap(),
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "vendor_alert");
        assert_eq!(event.subject(), VENDOR_ALERT_SUBJECT);
        assert_eq!(event.recipient(), "x@vendor.test");

        let back: NotificationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
