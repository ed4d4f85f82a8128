//! # Catalog Repository
//!
//! Vendors, food items and tax rules. These are owned by other parts of
//! the marketplace (vendor dashboard, admin); checkout only reads them.
//! The write methods exist for seeding and tests.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::validation::{
    validate_email, validate_food_title, validate_price_cents, validate_tax_rate_bps,
};
use bazaar_core::{FoodItem, TaxEngine, TaxRate, TaxRule, Vendor};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct VendorRow {
    id: String,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Vendor {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct FoodItemRow {
    id: String,
    vendor_id: String,
    title: String,
    price_cents: i64,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FoodItemRow> for FoodItem {
    fn from(row: FoodItemRow) -> Self {
        FoodItem {
            id: row.id,
            vendor_id: row.vendor_id,
            title: row.title,
            price_cents: row.price_cents,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TaxRuleRow {
    id: String,
    tax_type: String,
    rate_bps: i64,
    is_active: bool,
}

impl TryFrom<TaxRuleRow> for TaxRule {
    type Error = DbError;

    fn try_from(row: TaxRuleRow) -> DbResult<Self> {
        let bps = u32::try_from(row.rate_bps)
            .map_err(|_| DbError::Internal(format!("tax rule {} has rate {}", row.id, row.rate_bps)))?;
        Ok(TaxRule {
            id: row.id,
            tax_type: row.tax_type,
            rate: TaxRate::from_bps(bps),
            is_active: row.is_active,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads (and seed/test writes).
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Vendors
    // -------------------------------------------------------------------------

    pub async fn insert_vendor(&self, vendor: &Vendor) -> DbResult<()> {
        validate_email("vendor email", &vendor.email)?;
        debug!(id = %vendor.id, name = %vendor.name, "Inserting vendor");

        sqlx::query("INSERT INTO vendors (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&vendor.id)
            .bind(&vendor.name)
            .bind(&vendor.email)
            .bind(vendor.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_vendor(&self, id: &str) -> DbResult<Option<Vendor>> {
        let row: Option<VendorRow> =
            sqlx::query_as("SELECT id, name, email, created_at FROM vendors WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Vendor::from))
    }

    pub async fn count_vendors(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vendors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Food items
    // -------------------------------------------------------------------------

    pub async fn insert_food_item(&self, item: &FoodItem) -> DbResult<()> {
        validate_food_title(&item.title)?;
        validate_price_cents(item.price_cents)?;
        debug!(id = %item.id, vendor_id = %item.vendor_id, "Inserting food item");

        sqlx::query(
            r#"
            INSERT INTO food_items (
                id, vendor_id, title, price_cents, is_available, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.vendor_id)
        .bind(&item.title)
        .bind(item.price_cents)
        .bind(item.is_available)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_food_item(&self, id: &str) -> DbResult<Option<FoodItem>> {
        let row: Option<FoodItemRow> = sqlx::query_as(
            r#"
            SELECT id, vendor_id, title, price_cents, is_available, created_at, updated_at
            FROM food_items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FoodItem::from))
    }

    pub async fn list_food_items_for_vendor(&self, vendor_id: &str) -> DbResult<Vec<FoodItem>> {
        let rows: Vec<FoodItemRow> = sqlx::query_as(
            r#"
            SELECT id, vendor_id, title, price_cents, is_available, created_at, updated_at
            FROM food_items
            WHERE vendor_id = ?1
            ORDER BY title
            "#,
        )
        .bind(vendor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FoodItem::from).collect())
    }

    /// Changes a food item's live price. Placed orders keep their copies.
    pub async fn set_price(&self, id: &str, price_cents: i64) -> DbResult<()> {
        validate_price_cents(price_cents)?;
        debug!(id = %id, price_cents, "Updating food item price");

        let result = sqlx::query(
            "UPDATE food_items SET price_cents = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Food item", id));
        }
        Ok(())
    }

    pub async fn set_available(&self, id: &str, is_available: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE food_items SET is_available = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(is_available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Food item", id));
        }
        Ok(())
    }

    pub async fn count_food_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM food_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Tax rules
    // -------------------------------------------------------------------------

    pub async fn insert_tax_rule(&self, rule: &TaxRule) -> DbResult<()> {
        validate_tax_rate_bps(rule.rate.bps())?;
        debug!(id = %rule.id, tax_type = %rule.tax_type, rate = %rule.rate, "Inserting tax rule");

        sqlx::query(
            "INSERT INTO tax_rules (id, tax_type, rate_bps, is_active) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&rule.id)
        .bind(&rule.tax_type)
        .bind(i64::from(rule.rate.bps()))
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_tax_rule_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE tax_rules SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax rule", id));
        }
        Ok(())
    }

    /// Active rules, in a stable order.
    pub async fn active_tax_rules(&self) -> DbResult<Vec<TaxRule>> {
        let rows: Vec<TaxRuleRow> = sqlx::query_as(
            r#"
            SELECT id, tax_type, rate_bps, is_active
            FROM tax_rules
            WHERE is_active = 1
            ORDER BY tax_type, rate_bps
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaxRule::try_from).collect()
    }

    /// Snapshots the active rules into an engine. One checkout uses one
    /// snapshot for every computation it makes.
    pub async fn tax_engine(&self) -> DbResult<TaxEngine> {
        let rules = self.active_tax_rules().await?;
        debug!(rules = rules.len(), "Snapshotted active tax rules");
        Ok(TaxEngine::new(rules))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use crate::{Database, DbConfig, DbError};
    use bazaar_core::{FoodItem, TaxRate, TaxRule};
    use chrono::Utc;

    #[tokio::test]
    async fn test_food_item_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vendor = seed_vendor(&db, "Noodle Bar").await;
        let item = seed_food(&db, &vendor.id, "Pad Thai", 1250).await;

        let loaded = db.catalog().get_food_item(&item.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Pad Thai");
        assert_eq!(loaded.price_cents, 1250);
        assert!(loaded.is_available);

        db.catalog().set_price(&item.id, 1400).await.unwrap();
        let loaded = db.catalog().get_food_item(&item.id).await.unwrap().unwrap();
        assert_eq!(loaded.price_cents, 1400);

        assert!(db.catalog().get_food_item("missing").await.unwrap().is_none());
        assert!(db.catalog().set_price("missing", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_active_tax_rules_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vat = TaxRule::new("VAT", TaxRate::from_bps(1000));
        let service = TaxRule::new("Service", TaxRate::from_bps(250));
        db.catalog().insert_tax_rule(&vat).await.unwrap();
        db.catalog().insert_tax_rule(&service).await.unwrap();

        let engine = db.catalog().tax_engine().await.unwrap();
        assert_eq!(engine.rules().len(), 2);

        db.catalog().set_tax_rule_active(&service.id, false).await.unwrap();
        let rules = db.catalog().active_tax_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rate.bps(), 1000);

        // An engine taken earlier keeps its snapshot
        assert_eq!(engine.rules().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_catalog_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vendor = seed_vendor(&db, "Soup Stop").await;

        let mut item = FoodItem {
            id: "f1".to_string(),
            vendor_id: vendor.id.clone(),
            title: "  ".to_string(),
            price_cents: 500,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = db.catalog().insert_food_item(&item).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        item.title = "Miso".to_string();
        item.price_cents = -1;
        assert!(db.catalog().insert_food_item(&item).await.is_err());

        item.price_cents = 500;
        db.catalog().insert_food_item(&item).await.unwrap();
        assert!(db.catalog().set_price(&item.id, -5).await.is_err());
        // price * quantity must stay representable in cents
        let err = db
            .catalog()
            .set_price(&item.id, bazaar_core::MAX_PRICE_CENTS + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
        assert_eq!(db.catalog().get_food_item(&item.id).await.unwrap().unwrap().price_cents, 500);
        assert_eq!(db.catalog().count_food_items().await.unwrap(), 1);

        let rule = TaxRule::new("VAT", TaxRate::from_bps(10_001));
        assert!(db.catalog().insert_tax_rule(&rule).await.is_err());
    }
}
