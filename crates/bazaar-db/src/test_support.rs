//! Fixtures shared by the unit tests in this crate.

use chrono::Utc;
use uuid::Uuid;

use crate::Database;
use bazaar_core::{FoodItem, ShippingDetails, TaxEngine, TaxRate, TaxRule, Vendor};

pub fn vendor_email(name: &str) -> String {
    format!("{}@vendor.test", name.to_lowercase().replace(' ', "."))
}

pub async fn seed_vendor(db: &Database, name: &str) -> Vendor {
    let vendor = Vendor {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: vendor_email(name),
        created_at: Utc::now(),
    };
    db.catalog().insert_vendor(&vendor).await.unwrap();
    vendor
}

pub async fn seed_food(db: &Database, vendor_id: &str, title: &str, price_cents: i64) -> FoodItem {
    let now = Utc::now();
    let item = FoodItem {
        id: Uuid::new_v4().to_string(),
        vendor_id: vendor_id.to_string(),
        title: title.to_string(),
        price_cents,
        is_available: true,
        created_at: now,
        updated_at: now,
    };
    db.catalog().insert_food_item(&item).await.unwrap();
    item
}

/// Inserts one active VAT rule and returns a fresh rule snapshot.
pub async fn seed_vat(db: &Database, bps: u32) -> TaxEngine {
    db.catalog()
        .insert_tax_rule(&TaxRule::new("VAT", TaxRate::from_bps(bps)))
        .await
        .unwrap();
    db.catalog().tax_engine().await.unwrap()
}

pub fn shipping() -> ShippingDetails {
    ShippingDetails {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        phone: "5550100".to_string(),
        email: "jane@example.com".to_string(),
        address: "1 Market Street".to_string(),
        country: "US".to_string(),
        state: "CA".to_string(),
        city: "San Francisco".to_string(),
        pin_code: Some("94105".to_string()),
    }
}
