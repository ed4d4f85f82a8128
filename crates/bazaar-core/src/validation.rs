//! # Validation Module
//!
//! Input validation for cart operations and the checkout form.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (outside this repo)                              │
//! │  └── Deserialization into typed requests                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Checkout form fields (required, max length, email shape)          │
//! │  └── Quantity / price / tax-rate bounds                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 1)                                             │
//! │  ├── UNIQUE (user_id, food_item_id), UNIQUE (order_number)             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::validation::{validate_price_cents, validate_shipping_details};
//! use bazaar_core::types::ShippingDetails;
//!
//! validate_price_cents(1099).unwrap();
//!
//! let form = ShippingDetails::default();
//! assert!(validate_shipping_details(&form).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::ShippingDetails;
use crate::{MAX_CART_ITEMS, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Required, trimmed, at most `max` characters.
fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a food item title (1-200 characters).
pub fn validate_food_title(title: &str) -> ValidationResult<()> {
    validate_text("title", title, 200)
}

/// Validates an email address: required, at most 50 characters, and
/// shaped like `local@domain`.
pub fn validate_email(field: &str, email: &str) -> ValidationResult<()> {
    validate_text(field, email, 50)?;

    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be an email address".to_string(),
        });
    }

    Ok(())
}

/// Validates the checkout form.
///
/// ## Field Limits
/// | Field | Max |
/// |---|---|
/// | first_name, last_name | 50 |
/// | phone | 15 |
/// | email | 50 |
/// | address | 200 |
/// | country, state | 15 |
/// | city | 50 |
/// | pin_code (optional) | 10 |
///
/// Stops at the first failing field.
pub fn validate_shipping_details(form: &ShippingDetails) -> ValidationResult<()> {
    validate_text("first_name", &form.first_name, 50)?;
    validate_text("last_name", &form.last_name, 50)?;
    validate_text("phone", &form.phone, 15)?;
    validate_email("email", &form.email)?;
    validate_text("address", &form.address, 200)?;
    validate_text("country", &form.country, 15)?;
    validate_text("state", &form.state, 15)?;
    validate_text("city", &form.city, 50)?;

    if let Some(pin) = form.pin_code.as_deref() {
        if pin.trim().chars().count() > 10 {
            return Err(ValidationError::TooLong {
                field: "pin_code".to_string(),
                max: 10,
            });
        }
    }

    Ok(())
}

/// Validates a payment provider's transaction reference.
pub fn validate_transaction_id(transaction_id: &str) -> ValidationResult<()> {
    validate_text("transaction_id", transaction_id, 100)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use bazaar_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents. Must be positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct item fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ShippingDetails {
        ShippingDetails {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: "+44 20 7946 0".to_string(),
            email: "ada@example.com".to_string(),
            address: "12 Analytical Row".to_string(),
            country: "UK".to_string(),
            state: "London".to_string(),
            city: "London".to_string(),
            pin_code: Some("NW1".to_string()),
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(validate_shipping_details(&form()).is_ok());

        let mut no_pin = form();
        no_pin.pin_code = None;
        assert!(validate_shipping_details(&no_pin).is_ok());
    }

    #[test]
    fn test_form_required_fields() {
        let mut f = form();
        f.city = "   ".to_string();
        assert_eq!(
            validate_shipping_details(&f),
            Err(ValidationError::Required {
                field: "city".to_string()
            })
        );
    }

    #[test]
    fn test_form_max_lengths() {
        let mut f = form();
        f.phone = "1".repeat(16);
        assert_eq!(
            validate_shipping_details(&f),
            Err(ValidationError::TooLong {
                field: "phone".to_string(),
                max: 15
            })
        );

        let mut f = form();
        f.pin_code = Some("1".repeat(11));
        assert!(validate_shipping_details(&f).is_err());

        let mut f = form();
        f.address = "a".repeat(200);
        assert!(validate_shipping_details(&f).is_ok());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("email", "a@b.co").is_ok());
        assert!(validate_email("email", "no-at-sign").is_err());
        assert!(validate_email("email", "@b.co").is_err());
        assert!(validate_email("email", "a@").is_err());
        assert!(validate_email("email", "a@b@c").is_err());
    }

    #[test]
    fn test_validate_price_and_payment() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX).is_err());
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(825).is_ok());
        assert!(validate_tax_rate_bps(10000).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
