//! # Cart Store
//!
//! Per-user cart rows with the quantity invariants enforced in SQL.
//!
//! ## Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item                                                               │
//! │    INSERT ... SELECT WHERE row exists OR distinct rows < 100            │
//! │      ON CONFLICT(user_id, food_item_id)                                 │
//! │      DO UPDATE SET quantity = quantity + 1                              │
//! │    one statement: two concurrent adds always end at +2, and the cart   │
//! │    size cap holds for every writer sharing the database file           │
//! │                                                                         │
//! │  decrease_item                                                          │
//! │    read q ──► UPDATE ... SET quantity = q - 1 WHERE quantity = q        │
//! │           └─► DELETE ... WHERE quantity = 1               (q == 1)      │
//! │    0 rows affected = lost the race → re-read, at most 3 attempts        │
//! │                                                                         │
//! │  every mutation also holds the in-process lock "cart:<user>"            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - at most one row per `(user_id, food_item_id)` (UNIQUE)
//! - `quantity >= 1` while a row exists (CHECK; zero means delete)
//! - rows list in insertion order (rowid), so checkout splits deterministically

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, MarketError, MarketResult};
use crate::lock::KeyedLocks;
use crate::repository::catalog::CatalogRepository;
use bazaar_core::split;
use bazaar_core::validation::validate_cart_size;
use bazaar_core::{
    CartAggregator, CartAmounts, CartItem, CartLine, CoreError, Money, TaxEngine,
    MAX_CART_ITEMS, MAX_CONFLICT_RETRIES, MAX_ITEM_QUANTITY,
};

pub const MSG_INCREASED: &str = "Increased the cart item quantity";
pub const MSG_DECREASED: &str = "Decreased the cart item quantity";
pub const MSG_DELETED: &str = "Cart item has been deleted!";

/// Result of a cart mutation, as shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartUpdate {
    /// The item's quantity after the call (0 once removed).
    pub quantity: i64,
    pub message: String,
    /// Σ quantities across the whole cart (the badge number).
    pub cart_count: i64,
    /// Cart totals after the change, under the active tax rules.
    pub amounts: CartAmounts,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct CartItemRow {
    id: String,
    user_id: String,
    food_item_id: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem {
            id: row.id,
            user_id: row.user_id,
            food_item_id: row.food_item_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CartLineRow {
    cart_item_id: String,
    food_item_id: String,
    vendor_id: String,
    title: String,
    price_cents: i64,
    quantity: i64,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            cart_item_id: row.cart_item_id,
            food_item_id: row.food_item_id,
            vendor_id: row.vendor_id,
            title: row.title,
            unit_price: Money::from_cents(row.price_cents),
            quantity: row.quantity,
        }
    }
}

// =============================================================================
// Connection-level helpers (shared with the checkout transaction)
// =============================================================================

/// Cart lines joined with the food items' *current* price, vendor and title.
pub(crate) async fn fetch_lines(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Vec<CartLine>> {
    let rows: Vec<CartLineRow> = sqlx::query_as(
        r#"
        SELECT
            c.id AS cart_item_id,
            c.food_item_id,
            f.vendor_id,
            f.title,
            f.price_cents,
            c.quantity
        FROM cart_items c
        JOIN food_items f ON f.id = c.food_item_id
        WHERE c.user_id = ?1
        ORDER BY c.rowid
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(CartLine::from).collect())
}

pub(crate) async fn clear_cart(conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn count_quantity(conn: &mut SqliteConnection, user_id: &str) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

/// Explains why the conditional upsert in `add_item` wrote nothing.
async fn rejected_add(conn: &mut SqliteConnection, user_id: &str, food_item_id: &str) -> MarketError {
    let explained = async {
        let held: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = ?1 AND food_item_id = ?2",
        )
        .bind(user_id)
        .bind(food_item_id)
        .fetch_optional(&mut *conn)
        .await?;

        if held.is_some() {
            return Ok(MarketError::from(CoreError::QuantityTooLarge {
                requested: MAX_ITEM_QUANTITY + 1,
                max: MAX_ITEM_QUANTITY,
            }));
        }

        let distinct: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        if let Err(e) = validate_cart_size(usize::try_from(distinct).unwrap_or(usize::MAX)) {
            return Ok(MarketError::from(e));
        }

        // A row was removed between the upsert and this read
        Ok::<_, DbError>(MarketError::conflict(format!(
            "cart for {} changed while adding {}",
            user_id, food_item_id
        )))
    }
    .await;

    explained.unwrap_or_else(MarketError::from)
}

// =============================================================================
// Cart Store
// =============================================================================

/// Per-user cart operations.
#[derive(Debug, Clone)]
pub struct CartStore {
    pool: SqlitePool,
    locks: Arc<KeyedLocks>,
}

impl CartStore {
    pub fn new(pool: SqlitePool, locks: Arc<KeyedLocks>) -> Self {
        CartStore { pool, locks }
    }

    /// Adds one of a food item: creates the row with quantity 1 or
    /// increments the existing row.
    ///
    /// ## Errors
    /// - `NotFound` if the food item does not exist or is unavailable
    /// - `Validation` if the cart is full or the quantity would exceed 999
    pub async fn add_item(&self, user_id: &str, food_item_id: &str) -> MarketResult<CartUpdate> {
        let _guard = self.locks.cart(user_id).await;
        let mut conn = self.pool.acquire().await?;

        let food: Option<(String, bool)> =
            sqlx::query_as("SELECT title, is_available FROM food_items WHERE id = ?1")
                .bind(food_item_id)
                .fetch_optional(&mut *conn)
                .await?;
        let title = match food {
            Some((title, true)) => title,
            _ => return Err(MarketError::not_found("Food item", food_item_id)),
        };

        let now = Utc::now();
        let quantity: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO cart_items (id, user_id, food_item_id, quantity, created_at, updated_at)
            SELECT ?1, ?2, ?3, 1, ?4, ?4
            WHERE EXISTS (SELECT 1 FROM cart_items WHERE user_id = ?2 AND food_item_id = ?3)
               OR (SELECT COUNT(*) FROM cart_items WHERE user_id = ?2) < ?6
            ON CONFLICT (user_id, food_item_id) DO UPDATE SET
                quantity = quantity + 1,
                updated_at = excluded.updated_at
            WHERE quantity < ?5
            RETURNING quantity
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(food_item_id)
        .bind(now)
        .bind(MAX_ITEM_QUANTITY)
        .bind(MAX_CART_ITEMS as i64)
        .fetch_optional(&mut *conn)
        .await?;

        let quantity = match quantity {
            Some(quantity) => quantity,
            None => return Err(rejected_add(&mut conn, user_id, food_item_id).await),
        };

        let message = if quantity == 1 {
            format!("Added '{}' to your cart", title)
        } else {
            MSG_INCREASED.to_string()
        };
        drop(conn);

        debug!(user_id = %user_id, food_item_id = %food_item_id, quantity, "Cart item added");
        self.updated(user_id, quantity, message).await
    }

    /// Removes one of a food item. A quantity-1 row is deleted and the
    /// returned quantity is 0.
    ///
    /// ## Errors
    /// - `NotFound` if the item is not in the cart (cart unchanged)
    /// - `Conflict` if the row kept changing under us for every retry
    pub async fn decrease_item(&self, user_id: &str, food_item_id: &str) -> MarketResult<CartUpdate> {
        let _guard = self.locks.cart(user_id).await;
        let mut conn = self.pool.acquire().await?;

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let observed: Option<i64> = sqlx::query_scalar(
                "SELECT quantity FROM cart_items WHERE user_id = ?1 AND food_item_id = ?2",
            )
            .bind(user_id)
            .bind(food_item_id)
            .fetch_optional(&mut *conn)
            .await?;

            let observed = observed.ok_or_else(|| MarketError::not_found("Cart item", food_item_id))?;

            let (result, quantity, message) = if observed > 1 {
                let result = sqlx::query(
                    r#"
                    UPDATE cart_items SET quantity = ?3 - 1, updated_at = ?4
                    WHERE user_id = ?1 AND food_item_id = ?2 AND quantity = ?3
                    "#,
                )
                .bind(user_id)
                .bind(food_item_id)
                .bind(observed)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;
                (result, observed - 1, MSG_DECREASED)
            } else {
                let result = sqlx::query(
                    r#"
                    DELETE FROM cart_items
                    WHERE user_id = ?1 AND food_item_id = ?2 AND quantity = ?3
                    "#,
                )
                .bind(user_id)
                .bind(food_item_id)
                .bind(observed)
                .execute(&mut *conn)
                .await?;
                (result, 0, MSG_DELETED)
            };

            if result.rows_affected() == 1 {
                drop(conn);
                debug!(user_id = %user_id, food_item_id = %food_item_id, quantity, "Cart item decreased");
                return self.updated(user_id, quantity, message.to_string()).await;
            }

            debug!(
                user_id = %user_id,
                food_item_id = %food_item_id,
                attempt,
                "Cart quantity changed concurrently, retrying"
            );
        }

        Err(MarketError::conflict(format!(
            "cart item {} changed concurrently {} times",
            food_item_id, MAX_CONFLICT_RETRIES
        )))
    }

    /// Deletes a cart row by id.
    ///
    /// ## Errors
    /// `NotFound` if the row does not exist or belongs to another user.
    pub async fn remove_item(&self, user_id: &str, cart_item_id: &str) -> MarketResult<CartUpdate> {
        let _guard = self.locks.cart(user_id).await;
        let mut conn = self.pool.acquire().await?;

        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1 AND user_id = ?2")
            .bind(cart_item_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::not_found("Cart item", cart_item_id));
        }

        drop(conn);

        debug!(user_id = %user_id, cart_item_id = %cart_item_id, "Cart item removed");
        self.updated(user_id, 0, MSG_DELETED.to_string()).await
    }

    /// Badge count and totals after a mutation. Callers release their
    /// connection first; an in-memory pool holds only one.
    async fn updated(&self, user_id: &str, quantity: i64, message: String) -> MarketResult<CartUpdate> {
        let engine = CatalogRepository::new(self.pool.clone()).tax_engine().await?;
        let lines = self.lines(user_id).await?;

        Ok(CartUpdate {
            quantity,
            message,
            cart_count: CartAggregator::item_count(&lines),
            amounts: CartAggregator::amounts(&lines, &engine)?,
        })
    }

    /// Cart rows in insertion order.
    pub async fn list_items(&self, user_id: &str) -> DbResult<Vec<CartItem>> {
        let rows: Vec<CartItemRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, food_item_id, quantity, created_at, updated_at
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    /// Cart rows resolved against current prices, in insertion order.
    pub async fn lines(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_lines(&mut conn, user_id).await
    }

    /// Σ quantities. Zero means "send the customer back to the marketplace".
    pub async fn item_count(&self, user_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_quantity(&mut conn, user_id).await
    }

    /// Subtotal, tax and grand total under the given rule snapshot.
    pub async fn amounts(&self, user_id: &str, engine: &TaxEngine) -> MarketResult<CartAmounts> {
        let lines = self.lines(user_id).await?;
        Ok(CartAggregator::amounts(&lines, engine)?)
    }

    /// Vendors touched by the cart, in first-seen order.
    pub async fn vendor_ids(&self, user_id: &str) -> DbResult<Vec<String>> {
        let lines = self.lines(user_id).await?;
        Ok(split::vendor_ids(&lines))
    }

    /// Deletes every row for the user. Checkout calls this from `finalize`.
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let _guard = self.locks.cart(user_id).await;
        let mut conn = self.pool.acquire().await?;
        let removed = clear_cart(&mut conn, user_id).await?;
        debug!(user_id = %user_id, removed, "Cart cleared");
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::*;
    use crate::{Database, DbConfig};
    use bazaar_core::MAX_CART_ITEMS;

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let vendor = seed_vendor(&db, "Taco Stand").await;
        let food = seed_food(&db, &vendor.id, "Al Pastor", 350).await;
        (db, vendor.id, food.id)
    }

    #[tokio::test]
    async fn test_add_same_item_twice_yields_one_row() {
        let (db, _, food) = setup().await;

        let first = db.carts().add_item("u1", &food).await.unwrap();
        assert_eq!(first.quantity, 1);
        assert_eq!(first.message, "Added 'Al Pastor' to your cart");

        let second = db.carts().add_item("u1", &food).await.unwrap();
        assert_eq!(second.quantity, 2);
        assert_eq!(second.message, MSG_INCREASED);
        assert_eq!(second.cart_count, 2);

        let items = db.carts().list_items("u1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_increments() {
        let (db, _, food) = setup().await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let carts = db.carts();
            let food = food.clone();
            handles.push(tokio::spawn(async move { carts.add_item("u1", &food).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let items = db.carts().list_items("u1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_add_unknown_or_unavailable_food() {
        let (db, vendor, _) = setup().await;

        let err = db.carts().add_item("u1", "nope").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let hidden = seed_food(&db, &vendor, "Sold Out", 100).await;
        db.catalog().set_available(&hidden.id, false).await.unwrap();
        let err = db.carts().add_item("u1", &hidden.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(db.carts().item_count("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_decrease_to_zero_deletes() {
        let (db, _, food) = setup().await;
        db.carts().add_item("u1", &food).await.unwrap();
        db.carts().add_item("u1", &food).await.unwrap();

        let update = db.carts().decrease_item("u1", &food).await.unwrap();
        assert_eq!(update.quantity, 1);
        assert_eq!(update.message, MSG_DECREASED);

        let update = db.carts().decrease_item("u1", &food).await.unwrap();
        assert_eq!(update.quantity, 0);
        assert_eq!(update.cart_count, 0);
        assert!(db.carts().list_items("u1").await.unwrap().is_empty());

        let err = db.carts().decrease_item("u1", &food).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_decrease_missing_item_leaves_cart_unchanged() {
        let (db, vendor, food) = setup().await;
        let other = seed_food(&db, &vendor, "Horchata", 200).await;
        db.carts().add_item("u1", &food).await.unwrap();

        let err = db.carts().decrease_item("u1", &other.id).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));

        let items = db.carts().list_items("u1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].food_item_id, food);
        assert_eq!(items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_remove_item_checks_owner() {
        let (db, _, food) = setup().await;
        db.carts().add_item("u1", &food).await.unwrap();
        let row = db.carts().list_items("u1").await.unwrap().remove(0);

        let err = db.carts().remove_item("u2", &row.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let update = db.carts().remove_item("u1", &row.id).await.unwrap();
        assert_eq!(update.message, MSG_DELETED);
        assert!(db.carts().remove_item("u1", &row.id).await.is_err());
    }

    #[tokio::test]
    async fn test_quantity_cap() {
        let (db, _, food) = setup().await;
        db.carts().add_item("u1", &food).await.unwrap();
        sqlx::query("UPDATE cart_items SET quantity = ?1")
            .bind(MAX_ITEM_QUANTITY)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.carts().add_item("u1", &food).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(db.carts().item_count("u1").await.unwrap(), MAX_ITEM_QUANTITY);
    }

    #[tokio::test]
    async fn test_cart_size_cap() {
        let (db, vendor, _) = setup().await;
        for i in 0..MAX_CART_ITEMS {
            let f = seed_food(&db, &vendor, &format!("Item {}", i), 100).await;
            db.carts().add_item("u1", &f.id).await.unwrap();
        }
        let extra = seed_food(&db, &vendor, "One Too Many", 100).await;

        let err = db.carts().add_item("u1", &extra.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_cart_size_cap_holds_across_database_handles() {
        let path = std::env::temp_dir().join(format!("bazaar-cart-{}.db", Uuid::new_v4()));
        let first = Database::new(DbConfig::new(path.clone())).await.unwrap();
        let second = Database::new(DbConfig::new(path.clone())).await.unwrap();

        let vendor = seed_vendor(&first, "Noodle Bar").await;
        let mut held = Vec::new();
        for i in 0..MAX_CART_ITEMS - 1 {
            let f = seed_food(&first, &vendor.id, &format!("Bowl {}", i), 100).await;
            first.carts().add_item("u1", &f.id).await.unwrap();
            held.push(f.id);
        }
        let a = seed_food(&first, &vendor.id, "Last Bowl A", 100).await;
        let b = seed_food(&first, &vendor.id, "Last Bowl B", 100).await;

        // Separate handles share no in-process locks, like two processes
        let first_carts = first.carts();
        let second_carts = second.carts();
        let (ra, rb) = tokio::join!(
            first_carts.add_item("u1", &a.id),
            second_carts.add_item("u1", &b.id)
        );

        assert!(ra.is_ok() != rb.is_ok());
        assert_eq!(first.carts().list_items("u1").await.unwrap().len(), MAX_CART_ITEMS);

        // A full cart still accepts more of an item it already holds
        let update = second.carts().add_item("u1", &held[0]).await.unwrap();
        assert_eq!(update.quantity, 2);

        first.close().await;
        second.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_mutations_return_cart_amounts() {
        let (db, vendor, food) = setup().await;
        seed_vat(&db, 1000).await;
        let other = seed_food(&db, &vendor, "Agua Fresca", 250).await;

        let update = db.carts().add_item("u1", &food).await.unwrap();
        assert_eq!(update.amounts.subtotal.cents(), 350);
        assert_eq!(update.amounts.total_tax().cents(), 35);
        assert_eq!(update.amounts.grand_total.cents(), 385);

        let update = db.carts().add_item("u1", &other.id).await.unwrap();
        assert_eq!(update.cart_count, 2);
        assert_eq!(update.amounts.subtotal.cents(), 600);
        assert_eq!(update.amounts.grand_total.cents(), 660);

        let update = db.carts().decrease_item("u1", &food).await.unwrap();
        assert_eq!(update.amounts.subtotal.cents(), 250);
        assert_eq!(update.amounts.tax_breakdown.get("VAT", "10.00").unwrap().cents(), 25);

        let row = db.carts().list_items("u1").await.unwrap().remove(0);
        let update = db.carts().remove_item("u1", &row.id).await.unwrap();
        assert_eq!(update.cart_count, 0);
        assert_eq!(update.amounts, CartAmounts::default());
    }

    #[tokio::test]
    async fn test_lines_in_insertion_order_with_current_price() {
        let (db, vendor, food) = setup().await;
        let second = seed_food(&db, &vendor, "Churros", 400).await;
        db.carts().add_item("u1", &second.id).await.unwrap();
        db.carts().add_item("u1", &food).await.unwrap();
        db.carts().add_item("u1", &second.id).await.unwrap();

        db.catalog().set_price(&food, 375).await.unwrap();

        let lines = db.carts().lines("u1").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].title, "Churros");
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].unit_price.cents(), 375);
        assert_eq!(db.carts().vendor_ids("u1").await.unwrap(), vec![vendor]);
    }

    #[tokio::test]
    async fn test_amounts_and_clear() {
        let (db, _, food) = setup().await;
        let engine = seed_vat(&db, 1000).await;
        db.carts().add_item("u1", &food).await.unwrap();
        db.carts().add_item("u1", &food).await.unwrap();

        let amounts = db.carts().amounts("u1", &engine).await.unwrap();
        assert_eq!(amounts.subtotal.cents(), 700);
        assert_eq!(amounts.total_tax().cents(), 70);
        assert_eq!(amounts.grand_total.cents(), 770);

        assert_eq!(db.carts().clear("u1").await.unwrap(), 1);
        assert_eq!(db.carts().item_count("u1").await.unwrap(), 0);
    }
}
