//! # Delivery Sinks
//!
//! The dispatcher renders each outbox event into an [`OutgoingMessage`] and
//! hands it to a [`NotificationSink`]. Swapping the sink (SMTP, a provider
//! API, a test recorder) never touches the polling or retry logic.

use std::fmt::Write as _;
use std::future::Future;

use bazaar_core::notification::{NotificationEvent, ReceiptLine};
use bazaar_core::TaxBreakdown;
use tracing::info;

use crate::config::MailSettings;
use crate::error::NotifyResult;

/// A rendered plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMessage {
    pub fn render(event: &NotificationEvent, mail: &MailSettings) -> Self {
        let mut body = String::new();
        let order_url = format!("http://{}/orders/{}", mail.domain, event.order_number());

        // write! into a String cannot fail
        match event {
            NotificationEvent::CustomerReceipt(r) => {
                let _ = writeln!(body, "Hi {},", r.customer_name);
                let _ = writeln!(body);
                let _ = writeln!(body, "Order {} ({})", r.order_number, r.created_at.format("%Y-%m-%d %H:%M"));
                let _ = writeln!(body, "Paid by {} - transaction {}", r.payment_method, r.transaction_id);
                let _ = writeln!(body);
                write_lines(&mut body, &r.line_items);
                let _ = writeln!(body);
                let _ = writeln!(body, "Subtotal: {}", r.subtotal);
                write_taxes(&mut body, &r.tax_breakdown);
                let _ = writeln!(body, "Total: {}", r.total);
            }
            NotificationEvent::VendorAlert(a) => {
                let _ = writeln!(body, "Order {} ({})", a.order_number, a.created_at.format("%Y-%m-%d %H:%M"));
                let _ = writeln!(body);
                write_lines(&mut body, &a.vendor_line_items);
                let _ = writeln!(body);
                let _ = writeln!(body, "Your subtotal: {}", a.vendor_subtotal);
                write_taxes(&mut body, &a.vendor_tax_breakdown);
                let _ = writeln!(body, "Your total: {}", a.vendor_total);
            }
        }
        let _ = writeln!(body);
        let _ = writeln!(body, "{}", order_url);

        OutgoingMessage {
            from: mail.from_email.clone(),
            to: event.recipient().to_string(),
            subject: event.subject().to_string(),
            body,
        }
    }
}

fn write_lines(body: &mut String, lines: &[ReceiptLine]) {
    for line in lines {
        let _ = writeln!(
            body,
            "  {} x{} @ {} = {}",
            line.title, line.quantity, line.unit_price, line.amount
        );
    }
}

fn write_taxes(body: &mut String, breakdown: &TaxBreakdown) {
    for (tax_type, rates) in breakdown.iter() {
        for (percentage, amount) in rates {
            let _ = writeln!(body, "{} ({}%): {}", tax_type, percentage, amount);
        }
    }
}

/// Delivers rendered messages.
///
/// Returning `Err` leaves the outbox entry pending for a later attempt.
pub trait NotificationSink: Send + Sync + 'static {
    fn deliver(&self, message: &OutgoingMessage) -> impl Future<Output = NotifyResult<()>> + Send;
}

/// Logs messages instead of sending them. The default for local development.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    async fn deliver(&self, message: &OutgoingMessage) -> NotifyResult<()> {
        info!(
            to = %message.to,
            from = %message.from,
            subject = %message.subject,
            "Delivering notification\n{}",
            message.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::notification::{CustomerReceipt, VendorAlert};
    use bazaar_core::{Money, PaymentMethod};
    use chrono::Utc;

    fn line(title: &str, qty: i64, price: i64) -> ReceiptLine {
        ReceiptLine {
            food_item_id: format!("f-{}", title),
            title: title.to_string(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            amount: Money::from_cents(price * qty),
        }
    }

    fn vat(cents: i64) -> TaxBreakdown {
        let mut b = TaxBreakdown::new();
        b.add("VAT", "10.00", Money::from_cents(cents));
        b
    }

    #[test]
    fn test_render_customer_receipt() {
        let event = NotificationEvent::CustomerReceipt(CustomerReceipt {
            recipient: "jane@example.com".to_string(),
            customer_name: "Jane Doe".to_string(),
            order_number: "2026101612000042".to_string(),
            created_at: Utc::now(),
            payment_method: PaymentMethod::PayPal,
            transaction_id: "TX-1".to_string(),
            subtotal: Money::from_cents(2500),
            tax_breakdown: vat(250),
            total: Money::from_cents(2750),
            line_items: vec![line("Pad Thai", 2, 1000), line("Elote", 1, 500)],
        });

        let msg = OutgoingMessage::render(&event, &MailSettings::default());

        assert_eq!(msg.to, "jane@example.com");
        assert_eq!(msg.subject, "Thank you for ordering with us!");
        assert!(msg.body.starts_with("Hi Jane Doe,"));
        assert!(msg.body.contains("Pad Thai x2 @ $10.00 = $20.00"));
        assert!(msg.body.contains("VAT (10.00%): $2.50"));
        assert!(msg.body.contains("Total: $27.50"));
        assert!(msg.body.contains("http://127.0.0.1:8000/orders/2026101612000042"));
    }

    #[test]
    fn test_render_vendor_alert() {
        let event = NotificationEvent::VendorAlert(VendorAlert {
            recipient: "grill@vendor.test".to_string(),
            order_number: "N1".to_string(),
            created_at: Utc::now(),
            vendor_id: "X".to_string(),
            vendor_subtotal: Money::from_cents(2000),
            vendor_tax_breakdown: vat(200),
            vendor_total: Money::from_cents(2200),
            vendor_line_items: vec![line("Fries", 2, 1000)],
        });
        let mail = MailSettings {
            from_email: "orders@bazaar.example".to_string(),
            domain: "bazaar.example".to_string(),
        };

        let msg = OutgoingMessage::render(&event, &mail);

        assert_eq!(msg.from, "orders@bazaar.example");
        assert_eq!(msg.subject, "You have received a new order.");
        assert!(msg.body.contains("Your total: $22.00"));
        assert!(!msg.body.contains("Hi "));
    }
}
