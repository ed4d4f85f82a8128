//! # Checkout Service
//!
//! Drives one checkout from cart to paid order.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Checkout Steps                                   │
//! │                                                                         │
//! │  prepare_checkout(user)          one cart read, one tax-rule snapshot   │
//! │       │   CheckoutQuote                                                 │
//! │       ▼                                                                 │
//! │  place_order ─────────────► orders row        state: validated          │
//! │       │                     order_vendors     is_ordered = false        │
//! │       │   (customer reviews the order, pays at the provider)            │
//! │       ▼                                                                 │
//! │  ┌───────────────────── ONE TRANSACTION ─────────────────────────┐     │
//! │  │ commit_payment       payments row, orders.payment_id,        │     │
//! │  │                      is_ordered = true   state: committed    │     │
//! │  │ snapshot_ordered_food  ordered_food rows at current prices   │     │
//! │  │ reconcile            mismatch → needs_reconciliation = 1     │     │
//! │  └──────────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  finalize            cart cleared      state: notifications_queued      │
//! │                      receipt + vendor alerts → notification_outbox      │
//! │                      (enqueue failures are logged, never propagated)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `complete_checkout` runs the transactional box plus `finalize`. The
//! individual steps stay public for callers that drive them one at a time;
//! each one checks the persisted state and rejects out-of-order calls with
//! `Conflict`.
//!
//! ## Single writer per order
//! Every step after placement holds the keyed lock `order:<number>` and
//! updates the order row conditionally on the state it read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult, MarketError, MarketResult};
use crate::lock::KeyedLocks;
use crate::repository::cart::{clear_cart, fetch_lines};
use crate::repository::catalog::CatalogRepository;
use crate::repository::notification::NotificationOutboxRepository;
use crate::repository::order::{load_order, load_ordered_food, load_payment};
use bazaar_core::checkout::generate_order_number;
use bazaar_core::notification::{CustomerReceipt, NotificationEvent, VendorAlert};
use bazaar_core::split::{self, reconcile};
use bazaar_core::validation::{
    validate_payment_amount, validate_shipping_details, validate_transaction_id,
};
use bazaar_core::{
    CartAggregator, CheckoutQuote, CheckoutState, CoreError, Order, OrderStatus, OrderedFood,
    Payment, PaymentMethod, ShippingDetails, MAX_CONFLICT_RETRIES,
};

const ORDER_NUMBER_RETRY_PAUSE: Duration = Duration::from_millis(1);

/// Marks a storage failure as happening after the customer paid.
fn paid(err: MarketError) -> MarketError {
    match err {
        MarketError::Database { source, .. } => MarketError::after_payment(source),
        other => other,
    }
}

// =============================================================================
// Connection-level steps
// =============================================================================

async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    let total_data = serde_json::to_string(&order.total_data)
        .map_err(|e| DbError::serialization("total_data", e))?;
    let tax_data = serde_json::to_string(&order.tax_data)
        .map_err(|e| DbError::serialization("tax_data", e))?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, user_id,
            first_name, last_name, phone, email, address, country, state, city, pin_code,
            total_data, tax_data, subtotal_cents, total_tax_cents, total_cents,
            payment_method, payment_id, status, checkout_state,
            is_ordered, needs_reconciliation, reconciliation_note,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
            ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21,
            ?22, ?23, ?24,
            ?25, ?26
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.user_id)
    .bind(&order.shipping.first_name)
    .bind(&order.shipping.last_name)
    .bind(&order.shipping.phone)
    .bind(&order.shipping.email)
    .bind(&order.shipping.address)
    .bind(&order.shipping.country)
    .bind(&order.shipping.state)
    .bind(&order.shipping.city)
    .bind(&order.shipping.pin_code)
    .bind(total_data)
    .bind(tax_data)
    .bind(order.subtotal_cents)
    .bind(order.total_tax_cents)
    .bind(order.total_cents)
    .bind(order.payment_method)
    .bind(&order.payment_id)
    .bind(order.status)
    .bind(order.checkout_state)
    .bind(order.is_ordered)
    .bind(order.needs_reconciliation)
    .bind(&order.reconciliation_note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, vendor_id) in order.vendor_ids.iter().enumerate() {
        sqlx::query("INSERT INTO order_vendors (order_id, vendor_id, position) VALUES (?1, ?2, ?3)")
            .bind(&order.id)
            .bind(vendor_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Loads the order if it belongs to `user_id`.
async fn owned_order(
    conn: &mut SqliteConnection,
    order_number: &str,
    user_id: &str,
) -> MarketResult<Order> {
    load_order(conn, order_number)
        .await?
        .filter(|o| o.user_id == user_id)
        .ok_or_else(|| MarketError::not_found("Order", order_number))
}

/// Moves the order to `to` if the transition is allowed and nobody else
/// moved it first.
async fn advance_state(
    conn: &mut SqliteConnection,
    order: &Order,
    to: CheckoutState,
) -> MarketResult<()> {
    let from = order.checkout_state;
    from.transition(&order.order_number, to)?;

    let result = sqlx::query(
        "UPDATE orders SET checkout_state = ?3, updated_at = ?4 WHERE id = ?1 AND checkout_state = ?2",
    )
    .bind(&order.id)
    .bind(from)
    .bind(to)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::conflict(format!(
            "order {} left state {} concurrently",
            order.order_number, from
        )));
    }
    Ok(())
}

async fn record_payment(
    conn: &mut SqliteConnection,
    user_id: &str,
    order_number: &str,
    transaction_id: &str,
    method: PaymentMethod,
    status: &str,
) -> MarketResult<Payment> {
    validate_transaction_id(transaction_id)?;

    let order = owned_order(conn, order_number, user_id).await?;
    order
        .checkout_state
        .transition(order_number, CheckoutState::Committed)?;
    validate_payment_amount(order.total_cents)?;

    let payment = Payment {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        transaction_id: transaction_id.to_string(),
        method,
        amount_cents: order.total_cents,
        status: status.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO payments (id, user_id, transaction_id, method, amount_cents, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.user_id)
    .bind(&payment.transaction_id)
    .bind(payment.method)
    .bind(payment.amount_cents)
    .bind(&payment.status)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_id = ?2,
            is_ordered = 1,
            checkout_state = ?3,
            updated_at = ?4
        WHERE id = ?1 AND checkout_state = ?5 AND payment_id IS NULL
        "#,
    )
    .bind(&order.id)
    .bind(&payment.id)
    .bind(CheckoutState::Committed)
    .bind(payment.created_at)
    .bind(CheckoutState::Validated)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(MarketError::conflict(format!(
            "order {} was paid concurrently",
            order_number
        )));
    }

    info!(
        order_number = %order_number,
        payment_id = %payment.id,
        amount = %payment.amount(),
        method = %method,
        "Payment committed"
    );
    Ok(payment)
}

/// Copies the customer's current cart lines into `ordered_food`.
async fn write_snapshot(
    conn: &mut SqliteConnection,
    order: &Order,
    payment_id: &str,
) -> MarketResult<Vec<OrderedFood>> {
    order
        .checkout_state
        .require(&order.order_number, CheckoutState::Committed)?;

    if order.payment_id.as_deref() != Some(payment_id) {
        return Err(MarketError::not_found("Payment", payment_id));
    }

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ordered_food WHERE order_id = ?1")
        .bind(&order.id)
        .fetch_one(&mut *conn)
        .await?;
    if existing > 0 {
        return Err(MarketError::conflict(format!(
            "order {} already has snapshot lines",
            order.order_number
        )));
    }

    let now = Utc::now();
    let lines = fetch_lines(conn, &order.user_id).await?;
    let mut snapshot = Vec::with_capacity(lines.len());

    for line in lines.iter().filter(|l| l.quantity > 0) {
        let row = OrderedFood {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            payment_id: payment_id.to_string(),
            user_id: order.user_id.clone(),
            food_item_id: line.food_item_id.clone(),
            vendor_id: line.vendor_id.clone(),
            title_snapshot: line.title.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            amount_cents: line.line_total().cents(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO ordered_food (
                id, order_id, payment_id, user_id, food_item_id, vendor_id,
                title_snapshot, quantity, unit_price_cents, amount_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&row.id)
        .bind(&row.order_id)
        .bind(&row.payment_id)
        .bind(&row.user_id)
        .bind(&row.food_item_id)
        .bind(&row.vendor_id)
        .bind(&row.title_snapshot)
        .bind(row.quantity)
        .bind(row.unit_price_cents)
        .bind(row.amount_cents)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await?;

        snapshot.push(row);
    }

    debug!(
        order_number = %order.order_number,
        lines = snapshot.len(),
        "Snapshot lines written"
    );
    Ok(snapshot)
}

/// True once the snapshot step has run for the order: lines were written,
/// or the order was flagged because they could not be.
async fn snapshot_taken(conn: &mut SqliteConnection, order: &Order) -> DbResult<bool> {
    if order.needs_reconciliation {
        return Ok(true);
    }
    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ordered_food WHERE order_id = ?1")
        .bind(&order.id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(lines > 0)
}

/// Compares the snapshot with `total_data`. A mismatch flags the order and
/// is returned as `Some`, leaving the caller to commit before surfacing it.
async fn flag_if_inconsistent(
    conn: &mut SqliteConnection,
    order: &Order,
    snapshot: &[OrderedFood],
) -> MarketResult<Option<CoreError>> {
    let err = match reconcile(&order.order_number, &order.total_data, snapshot) {
        Ok(()) => return Ok(None),
        Err(err) => err,
    };

    error!(
        order_number = %order.order_number,
        error = %err,
        "Snapshot does not match order totals, flagging for reconciliation"
    );

    sqlx::query(
        r#"
        UPDATE orders SET
            needs_reconciliation = 1,
            reconciliation_note = ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(err.to_string())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(Some(err))
}

// =============================================================================
// Order Committer
// =============================================================================

/// The checkout service.
///
/// ## Example
/// ```rust,ignore
/// let checkout = db.checkout();
/// let quote = checkout.prepare_checkout(&user_id).await?;
/// let order = checkout.place_order(&user_id, &form, &quote, PaymentMethod::PayPal).await?;
/// // ... customer pays at the provider ...
/// checkout
///     .complete_checkout(&user_id, &order.order_number, &txn_id, PaymentMethod::PayPal, "COMPLETED")
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderCommitter {
    pool: SqlitePool,
    locks: Arc<KeyedLocks>,
}

impl OrderCommitter {
    pub fn new(pool: SqlitePool, locks: Arc<KeyedLocks>) -> Self {
        OrderCommitter { pool, locks }
    }

    /// Computes everything `place_order` needs from one cart read and one
    /// snapshot of the active tax rules.
    ///
    /// ## Errors
    /// `CartEmpty` if the cart has no items (send the customer back to the
    /// marketplace).
    pub async fn prepare_checkout(&self, user_id: &str) -> MarketResult<CheckoutQuote> {
        let lines = {
            let mut conn = self.pool.acquire().await?;
            fetch_lines(&mut conn, user_id).await?
        };

        if CartAggregator::item_count(&lines) == 0 {
            return Err(MarketError::CartEmpty {
                user_id: user_id.to_string(),
            });
        }

        let engine = CatalogRepository::new(self.pool.clone()).tax_engine().await?;

        let quote = CheckoutQuote {
            vendor_ids: split::vendor_ids(&lines),
            total_data: split::split_by_vendor(&lines, &engine)?,
            amounts: CartAggregator::amounts(&lines, &engine)?,
        };

        debug!(
            user_id = %user_id,
            vendors = quote.vendor_ids.len(),
            grand_total = %quote.amounts.grand_total,
            "Checkout prepared"
        );
        Ok(quote)
    }

    /// Creates the order row (unpaid) with its frozen totals and vendor set.
    /// Payment and cart are untouched.
    ///
    /// ## Errors
    /// - `Validation` for a malformed form, an inconsistent quote or a
    ///   grand total of zero
    /// - `Conflict` if every generated order number collided
    pub async fn place_order(
        &self,
        user_id: &str,
        shipping: &ShippingDetails,
        quote: &CheckoutQuote,
        payment_method: PaymentMethod,
    ) -> MarketResult<Order> {
        validate_shipping_details(shipping)?;
        quote.validate()?;
        // The payment step only accepts a positive amount
        validate_payment_amount(quote.amounts.grand_total.cents())?;

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let now = Utc::now();
            let order_number = generate_order_number(user_id, now);
            let checkout_state =
                CheckoutState::Draft.transition(&order_number, CheckoutState::Validated)?;

            let order = Order {
                id: Uuid::new_v4().to_string(),
                order_number,
                user_id: user_id.to_string(),
                vendor_ids: quote.vendor_ids.clone(),
                shipping: shipping.clone(),
                total_data: quote.total_data.clone(),
                tax_data: quote.amounts.tax_breakdown.clone(),
                subtotal_cents: quote.amounts.subtotal.cents(),
                total_tax_cents: quote.amounts.total_tax().cents(),
                total_cents: quote.amounts.grand_total.cents(),
                payment_method,
                payment_id: None,
                status: OrderStatus::New,
                checkout_state,
                is_ordered: false,
                needs_reconciliation: false,
                reconciliation_note: None,
                created_at: now,
                updated_at: now,
            };

            let mut tx = self.pool.begin().await?;
            match insert_order(&mut tx, &order).await {
                Ok(()) => {
                    tx.commit().await?;
                    info!(
                        order_number = %order.order_number,
                        user_id = %user_id,
                        total = %order.total(),
                        vendors = order.vendor_ids.len(),
                        "Order placed"
                    );
                    return Ok(order);
                }
                Err(e) if e.is_unique_violation_on("orders.order_number") => {
                    drop(tx);
                    debug!(
                        order_number = %order.order_number,
                        attempt,
                        "Order number collision, regenerating"
                    );
                    tokio::time::sleep(ORDER_NUMBER_RETRY_PAUSE).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(MarketError::conflict(format!(
            "could not generate a unique order number after {} attempts",
            MAX_CONFLICT_RETRIES
        )))
    }

    /// Records the payment and marks the order as ordered.
    ///
    /// A storage failure marks the order `failed`; the customer starts a new
    /// checkout from the untouched cart.
    pub async fn commit_payment(
        &self,
        user_id: &str,
        order_number: &str,
        transaction_id: &str,
        method: PaymentMethod,
        status: &str,
    ) -> MarketResult<String> {
        let _order_guard = self.locks.order(order_number).await;

        let result = async {
            let mut tx = self.pool.begin().await?;
            let payment =
                record_payment(&mut tx, user_id, order_number, transaction_id, method, status)
                    .await?;
            tx.commit().await?;
            Ok::<_, MarketError>(payment.id)
        }
        .await;

        if let Err(MarketError::Database { source, .. }) = &result {
            error!(order_number = %order_number, error = %source, "Payment commit failed");
            self.mark_failed(order_number).await;
        }
        result
    }

    /// Writes one frozen row per cart line at current prices and checks the
    /// result against `total_data`.
    ///
    /// ## Errors
    /// `InconsistentState` if the snapshot disagrees (e.g. the cart was
    /// emptied after placement). The rows that were written and the
    /// reconciliation flag are committed before the error is returned.
    pub async fn snapshot_ordered_food(
        &self,
        order_number: &str,
        payment_id: &str,
        user_id: &str,
    ) -> MarketResult<Vec<OrderedFood>> {
        let _order_guard = self.locks.order(order_number).await;

        let mut tx = self.pool.begin().await.map_err(|e| paid(e.into()))?;
        let order = owned_order(&mut tx, order_number, user_id)
            .await
            .map_err(paid)?;
        let snapshot = write_snapshot(&mut tx, &order, payment_id)
            .await
            .map_err(paid)?;
        let mismatch = flag_if_inconsistent(&mut tx, &order, &snapshot)
            .await
            .map_err(paid)?;
        tx.commit().await.map_err(|e| paid(e.into()))?;

        match mismatch {
            Some(err) => Err(err.into()),
            None => Ok(snapshot),
        }
    }

    /// Clears the cart, moves the order to `notifications_queued` and
    /// queues the customer receipt and one alert per vendor.
    ///
    /// ## Errors
    /// `Conflict` unless the order is committed and `snapshot_ordered_food`
    /// has run for it. The cart is left untouched.
    pub async fn finalize(&self, order_number: &str, user_id: &str) -> MarketResult<()> {
        let _order_guard = self.locks.order(order_number).await;
        self.finalize_locked(order_number, user_id).await
    }

    /// Commit, snapshot and reconciliation in one transaction, then
    /// finalize. Returns the order as stored after finalize.
    ///
    /// ## Errors
    /// An `InconsistentState` is returned only after the flagged order was
    /// committed and finalized: the customer is charged exactly once and
    /// must not be asked to pay again.
    pub async fn complete_checkout(
        &self,
        user_id: &str,
        order_number: &str,
        transaction_id: &str,
        method: PaymentMethod,
        status: &str,
    ) -> MarketResult<Order> {
        let _order_guard = self.locks.order(order_number).await;

        let committed = async {
            let mut tx = self.pool.begin().await?;
            let payment =
                record_payment(&mut tx, user_id, order_number, transaction_id, method, status)
                    .await?;
            let order = owned_order(&mut tx, order_number, user_id).await?;
            let snapshot = write_snapshot(&mut tx, &order, &payment.id).await?;
            let mismatch = flag_if_inconsistent(&mut tx, &order, &snapshot).await?;
            tx.commit().await?;
            Ok::<_, MarketError>(mismatch)
        }
        .await;

        let mismatch = match committed {
            Ok(mismatch) => mismatch,
            Err(err) => {
                if let MarketError::Database { source, .. } = &err {
                    error!(order_number = %order_number, error = %source, "Checkout commit failed");
                    self.mark_failed(order_number).await;
                }
                return Err(err);
            }
        };

        self.finalize_locked(order_number, user_id)
            .await
            .map_err(paid)?;

        if let Some(err) = mismatch {
            return Err(err.into());
        }

        let mut conn = self.pool.acquire().await.map_err(|e| paid(e.into()))?;
        load_order(&mut conn, order_number)
            .await
            .map_err(|e| paid(e.into()))?
            .ok_or_else(|| MarketError::not_found("Order", order_number))
    }

    async fn finalize_locked(&self, order_number: &str, user_id: &str) -> MarketResult<()> {
        // Cart lock before the connection, the same order cart mutations use
        let _cart_guard = self.locks.cart(user_id).await;

        let order = {
            let mut tx = self.pool.begin().await.map_err(|e| paid(e.into()))?;
            let order = owned_order(&mut tx, order_number, user_id)
                .await
                .map_err(paid)?;
            if order.checkout_state == CheckoutState::Committed
                && !snapshot_taken(&mut tx, &order)
                    .await
                    .map_err(|e| paid(e.into()))?
            {
                return Err(MarketError::conflict(format!(
                    "order {} has no snapshot lines yet",
                    order_number
                )));
            }
            advance_state(&mut tx, &order, CheckoutState::NotificationsQueued)
                .await
                .map_err(paid)?;
            let removed = clear_cart(&mut tx, user_id)
                .await
                .map_err(|e| paid(e.into()))?;
            tx.commit().await.map_err(|e| paid(e.into()))?;

            info!(order_number = %order_number, cart_rows_removed = removed, "Order finalized");
            order
        };

        self.queue_notifications(&order).await;
        Ok(())
    }

    /// Best effort. Nothing here can fail the checkout.
    async fn queue_notifications(&self, order: &Order) {
        let outbox = NotificationOutboxRepository::new(self.pool.clone());
        let catalog = CatalogRepository::new(self.pool.clone());

        let loaded = async {
            let mut conn = self.pool.acquire().await?;
            let lines = load_ordered_food(&mut conn, &order.id).await?;
            let payment = match &order.payment_id {
                Some(id) => load_payment(&mut conn, id).await?,
                None => None,
            };
            Ok::<_, DbError>((lines, payment))
        }
        .await;

        let (lines, payment) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(order_number = %order.order_number, error = %e, "Could not load order for notifications");
                return;
            }
        };

        let mut events = Vec::with_capacity(order.total_data.len() + 1);
        match payment {
            Some(payment) => events.push(NotificationEvent::CustomerReceipt(
                CustomerReceipt::build(order, &payment, &lines),
            )),
            None => warn!(order_number = %order.order_number, "No payment on order, receipt skipped"),
        }

        for vendor_id in order.total_data.vendor_ids() {
            let vendor = match catalog.get_vendor(vendor_id).await {
                Ok(Some(vendor)) => vendor,
                Ok(None) => {
                    warn!(order_number = %order.order_number, vendor_id = %vendor_id, "Vendor missing, alert skipped");
                    continue;
                }
                Err(e) => {
                    warn!(order_number = %order.order_number, vendor_id = %vendor_id, error = %e, "Vendor lookup failed, alert skipped");
                    continue;
                }
            };
            if let Some(alert) = VendorAlert::build(order, vendor_id, &vendor.email, &lines) {
                events.push(NotificationEvent::VendorAlert(alert));
            }
        }

        for event in &events {
            if let Err(e) = outbox.enqueue(event).await {
                warn!(
                    order_number = %order.order_number,
                    kind = event.kind(),
                    recipient = %event.recipient(),
                    error = %e,
                    "Failed to queue notification"
                );
            }
        }

        debug!(order_number = %order.order_number, queued = events.len(), "Notifications queued");
    }

    async fn mark_failed(&self, order_number: &str) {
        let result = sqlx::query(
            r#"
            UPDATE orders SET checkout_state = ?2, updated_at = ?3
            WHERE order_number = ?1 AND checkout_state IN (?4, ?5)
            "#,
        )
        .bind(order_number)
        .bind(CheckoutState::Failed)
        .bind(Utc::now())
        .bind(CheckoutState::Draft)
        .bind(CheckoutState::Validated)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(order_number = %order_number, error = %e, "Could not mark order as failed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
