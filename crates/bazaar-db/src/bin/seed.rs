//! # Seed Data Generator
//!
//! Populates the database with vendors, menus and tax rules for local
//! development.
//!
//! ## Usage
//! ```bash
//! # 5 vendors with 12 items each (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Custom amounts
//! cargo run -p bazaar-db --bin seed -- --vendors 20 --items 30
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - Vendors named after cuisines, with `<slug>@vendor.test` emails
//! - Food items: `{dish} {portion}`, prices $2.49 - $24.99
//! - Two active tax rules: VAT 10.00% and Service 2.50%

use bazaar_core::{FoodItem, TaxRate, TaxRule, Vendor};
use bazaar_db::{Database, DbConfig};
use chrono::Utc;
use std::env;
use uuid::Uuid;

/// Vendor name stems and their dishes.
const CUISINES: &[(&str, &[&str])] = &[
    (
        "Taqueria",
        &["Al Pastor Taco", "Carnitas Burrito", "Chicken Quesadilla", "Elote", "Churros"],
    ),
    (
        "Noodle House",
        &["Pad Thai", "Pho Bo", "Dan Dan Noodles", "Ramen", "Spring Rolls"],
    ),
    (
        "Pizzeria",
        &["Margherita", "Pepperoni", "Quattro Formaggi", "Calzone", "Garlic Knots"],
    ),
    (
        "Curry Corner",
        &["Butter Chicken", "Chana Masala", "Lamb Vindaloo", "Samosa", "Garlic Naan"],
    ),
    (
        "Bakery",
        &["Croissant", "Pain au Chocolat", "Sourdough Loaf", "Cinnamon Roll", "Baguette"],
    ),
    (
        "Grill",
        &["Cheeseburger", "BBQ Ribs", "Grilled Salmon", "Fries", "Onion Rings"],
    ),
];

/// Portion variants and their price add-on in cents.
const PORTIONS: &[(&str, i64)] = &[("Regular", 0), ("Large", 250), ("Family", 900)];

const TAX_RULES: &[(&str, u32)] = &[("VAT", 1000), ("Service", 250)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut vendors: usize = 5;
    let mut items: usize = 12;
    let mut db_path = String::from("./bazaar_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--vendors" | "-v" => {
                if i + 1 < args.len() {
                    vendors = args[i + 1].parse().unwrap_or(5);
                    i += 1;
                }
            }
            "--items" | "-i" => {
                if i + 1 < args.len() {
                    items = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -v, --vendors <N>  Number of vendors to generate (default: 5)");
                println!("  -i, --items <M>    Food items per vendor (default: 12)");
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Vendors:  {}", vendors);
    println!("Items:    {} per vendor", items);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_vendors().await?;
    if existing > 0 {
        println!("⚠ Database already has {} vendors", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (tax_type, bps) in TAX_RULES {
        db.catalog()
            .insert_tax_rule(&TaxRule::new(*tax_type, TaxRate::from_bps(*bps)))
            .await?;
        println!("✓ Tax rule {} {}%", tax_type, TaxRate::from_bps(*bps));
    }

    println!();
    println!("Generating menus...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    for v in 0..vendors {
        let vendor = generate_vendor(v);
        db.catalog().insert_vendor(&vendor).await?;

        let (_, dishes) = CUISINES[v % CUISINES.len()];
        for n in 0..items {
            let item = generate_food_item(&vendor.id, dishes, v * 1000 + n);
            if let Err(e) = db.catalog().insert_food_item(&item).await {
                eprintln!("Failed to insert {}: {}", item.title, e);
                continue;
            }
            generated += 1;
        }

        println!("  {} ({}): {} items", vendor.name, vendor.email, items);
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} food items in {:?}", generated, elapsed);

    println!("  Food items in catalog: {}", db.catalog().count_food_items().await?);

    let engine = db.catalog().tax_engine().await?;
    println!("  Active tax rules: {}", engine.rules().len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn generate_vendor(index: usize) -> Vendor {
    let (stem, _) = CUISINES[index % CUISINES.len()];
    let name = format!("{} #{}", stem, index + 1);
    let slug = format!("{}{}", stem.to_lowercase().replace(' ', "-"), index + 1);

    Vendor {
        id: Uuid::new_v4().to_string(),
        name,
        email: format!("{}@vendor.test", slug),
        created_at: Utc::now(),
    }
}

/// Generates a food item with a deterministic price for `seed`.
fn generate_food_item(vendor_id: &str, dishes: &[&str], seed: usize) -> FoodItem {
    let now = Utc::now();
    let dish = dishes[seed % dishes.len()];
    let (portion, addon) = PORTIONS[(seed / dishes.len()) % PORTIONS.len()];

    // $2.49 - $15.99 base, plus portion add-on
    let base_price = 249 + ((seed * 37) % 1350) as i64;

    FoodItem {
        id: Uuid::new_v4().to_string(),
        vendor_id: vendor_id.to_string(),
        title: format!("{} {}", dish, portion),
        price_cents: base_price + addon,
        is_available: true,
        created_at: now,
        updated_at: now,
    }
}
