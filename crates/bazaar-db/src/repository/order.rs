//! # Order Repository
//!
//! Read side of orders, payments and snapshot lines, plus the vendor
//! dashboard queries. Writes that belong to checkout live in
//! [`crate::checkout`]; the only mutation here is the fulfilment status.
//!
//! ## Storage
//! ```text
//! orders ─────────┬── order_vendors (vendor_id, position)   vendor lookups
//!   total_data    │
//!   tax_data      ├── payments       (1:1 via orders.payment_id UNIQUE)
//!   (JSON text)   │
//!                 └── ordered_food   frozen cart lines
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::revenue;
use bazaar_core::{
    CheckoutState, Money, Order, OrderStatus, OrderedFood, Payment, PaymentMethod,
    PerVendorTotals, ShippingDetails, TaxBreakdown,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    user_id: String,
    first_name: String,
    last_name: String,
    phone: String,
    email: String,
    address: String,
    country: String,
    state: String,
    city: String,
    pin_code: Option<String>,
    total_data: String,
    tax_data: String,
    subtotal_cents: i64,
    total_tax_cents: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    payment_id: Option<String>,
    status: OrderStatus,
    checkout_state: CheckoutState,
    is_ordered: bool,
    needs_reconciliation: bool,
    reconciliation_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, vendor_ids: Vec<String>) -> DbResult<Order> {
        let total_data: PerVendorTotals = serde_json::from_str(&self.total_data)
            .map_err(|e| DbError::serialization("total_data", e))?;
        let tax_data: TaxBreakdown = serde_json::from_str(&self.tax_data)
            .map_err(|e| DbError::serialization("tax_data", e))?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            vendor_ids,
            shipping: ShippingDetails {
                first_name: self.first_name,
                last_name: self.last_name,
                phone: self.phone,
                email: self.email,
                address: self.address,
                country: self.country,
                state: self.state,
                city: self.city,
                pin_code: self.pin_code,
            },
            total_data,
            tax_data,
            subtotal_cents: self.subtotal_cents,
            total_tax_cents: self.total_tax_cents,
            total_cents: self.total_cents,
            payment_method: self.payment_method,
            payment_id: self.payment_id,
            status: self.status,
            checkout_state: self.checkout_state,
            is_ordered: self.is_ordered,
            needs_reconciliation: self.needs_reconciliation,
            reconciliation_note: self.reconciliation_note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    transaction_id: String,
    method: PaymentMethod,
    amount_cents: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            user_id: row.user_id,
            transaction_id: row.transaction_id,
            method: row.method,
            amount_cents: row.amount_cents,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderedFoodRow {
    id: String,
    order_id: String,
    payment_id: String,
    user_id: String,
    food_item_id: String,
    vendor_id: String,
    title_snapshot: String,
    quantity: i64,
    unit_price_cents: i64,
    amount_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderedFoodRow> for OrderedFood {
    fn from(row: OrderedFoodRow) -> Self {
        OrderedFood {
            id: row.id,
            order_id: row.order_id,
            payment_id: row.payment_id,
            user_id: row.user_id,
            food_item_id: row.food_item_id,
            vendor_id: row.vendor_id,
            title_snapshot: row.title_snapshot,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            amount_cents: row.amount_cents,
            created_at: row.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = r#"
    SELECT o.id, o.order_number, o.user_id,
           o.first_name, o.last_name, o.phone, o.email, o.address,
           o.country, o.state, o.city, o.pin_code,
           o.total_data, o.tax_data,
           o.subtotal_cents, o.total_tax_cents, o.total_cents,
           o.payment_method, o.payment_id, o.status, o.checkout_state,
           o.is_ordered, o.needs_reconciliation, o.reconciliation_note,
           o.created_at, o.updated_at
    FROM orders o
"#;

const ORDERED_FOOD_COLUMNS: &str = r#"
    SELECT id, order_id, payment_id, user_id, food_item_id, vendor_id,
           title_snapshot, quantity, unit_price_cents, amount_cents, created_at
    FROM ordered_food
"#;

// =============================================================================
// Connection-level helpers (shared with the checkout transaction)
// =============================================================================

async fn attach_vendors(conn: &mut SqliteConnection, row: OrderRow) -> DbResult<Order> {
    let vendor_ids: Vec<String> = sqlx::query_scalar(
        "SELECT vendor_id FROM order_vendors WHERE order_id = ?1 ORDER BY position",
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    row.into_order(vendor_ids)
}

async fn attach_all(conn: &mut SqliteConnection, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(attach_vendors(conn, row).await?);
    }
    Ok(orders)
}

pub(crate) async fn load_order(
    conn: &mut SqliteConnection,
    order_number: &str,
) -> DbResult<Option<Order>> {
    let sql = format!("{} WHERE o.order_number = ?1", ORDER_COLUMNS);
    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(attach_vendors(conn, row).await?)),
        None => Ok(None),
    }
}

pub(crate) async fn load_payment(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Payment>> {
    let row: Option<PaymentRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, transaction_id, method, amount_cents, status, created_at
        FROM payments
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Payment::from))
}

pub(crate) async fn load_ordered_food(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<OrderedFood>> {
    let sql = format!("{} WHERE order_id = ?1 ORDER BY rowid", ORDERED_FOOD_COLUMNS);
    let rows: Vec<OrderedFoodRow> = sqlx::query_as(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(OrderedFood::from).collect())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, order_number).await
    }

    /// Loads an order only if it belongs to `user_id`. Someone else's order
    /// reads as absent.
    pub async fn get_for_customer(&self, order_number: &str, user_id: &str) -> DbResult<Option<Order>> {
        Ok(self
            .get_by_number(order_number)
            .await?
            .filter(|o| o.user_id == user_id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{} WHERE o.id = ?1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(attach_vendors(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Snapshot lines of an order, in the cart's insertion order.
    pub async fn ordered_food(&self, order_id: &str) -> DbResult<Vec<OrderedFood>> {
        let mut conn = self.pool.acquire().await?;
        load_ordered_food(&mut conn, order_id).await
    }

    /// The vendor's own snapshot lines of an order.
    pub async fn ordered_food_for_vendor(
        &self,
        order_id: &str,
        vendor_id: &str,
    ) -> DbResult<Vec<OrderedFood>> {
        let sql = format!(
            "{} WHERE order_id = ?1 AND vendor_id = ?2 ORDER BY rowid",
            ORDERED_FOOD_COLUMNS
        );
        let rows: Vec<OrderedFoodRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(OrderedFood::from).collect())
    }

    pub async fn payment(&self, id: &str) -> DbResult<Option<Payment>> {
        let mut conn = self.pool.acquire().await?;
        load_payment(&mut conn, id).await
    }

    /// The customer's placed orders, newest first.
    pub async fn paid_orders_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "{} WHERE o.user_id = ?1 AND o.is_ordered = 1 ORDER BY o.created_at DESC",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        attach_all(&mut conn, rows).await
    }

    /// Placed orders that include the vendor, newest first, optionally
    /// limited to `[from, to]` on `created_at`.
    pub async fn orders_for_vendor(
        &self,
        vendor_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            r#"{}
            JOIN order_vendors ov ON ov.order_id = o.id
            WHERE ov.vendor_id = ?1
              AND o.is_ordered = 1
              AND (?2 IS NULL OR o.created_at >= ?2)
              AND (?3 IS NULL OR o.created_at <= ?3)
            ORDER BY o.created_at DESC
            "#,
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(vendor_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *conn)
            .await?;

        debug!(vendor_id = %vendor_id, orders = rows.len(), "Loaded vendor orders");
        attach_all(&mut conn, rows).await
    }

    /// Vendor revenue (subtotal share, tax excluded) over a window.
    pub async fn vendor_revenue(
        &self,
        vendor_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Money> {
        let orders = self.orders_for_vendor(vendor_id, from, to).await?;
        Ok(revenue::vendor_revenue(&orders, vendor_id))
    }

    /// Revenue since the first of the current month (vendor dashboard).
    pub async fn vendor_revenue_this_month(&self, vendor_id: &str) -> DbResult<Money> {
        let (from, to) = revenue::current_month_window(Utc::now());
        self.vendor_revenue(vendor_id, Some(from), Some(to)).await
    }

    /// Revenue since midnight UTC.
    pub async fn vendor_revenue_today(&self, vendor_id: &str) -> DbResult<Money> {
        let (from, to) = revenue::current_day_window(Utc::now());
        self.vendor_revenue(vendor_id, Some(from), Some(to)).await
    }

    /// Paid orders whose snapshot disagreed with their totals.
    pub async fn orders_needing_reconciliation(&self) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "{} WHERE o.needs_reconciliation = 1 ORDER BY o.created_at",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;

        attach_all(&mut conn, rows).await
    }

    /// Sets the fulfilment status. Totals and snapshot rows are untouched.
    pub async fn set_status(&self, order_number: &str, status: OrderStatus) -> DbResult<()> {
        debug!(order_number = %order_number, status = ?status, "Updating order status");

        let result = sqlx::query(
            "UPDATE orders SET status = ?2, updated_at = ?3 WHERE order_number = ?1",
        )
        .bind(order_number)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_number));
        }
        Ok(())
    }
}
