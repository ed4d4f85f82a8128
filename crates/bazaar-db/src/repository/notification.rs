//! # Notification Outbox Repository
//!
//! Queue of customer receipts and vendor alerts waiting for delivery.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  finalize(order)                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT cart cleared + checkout_state = notifications_queued           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO notification_outbox (kind, recipient, payload, ...)       │
//! │     one row per CustomerReceipt / VendorAlert                          │
//! │     a failed insert is logged; the order is already complete          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            DISPATCHER (bazaar-notify, async)                    │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT ... WHERE delivered_at IS NULL                       │   │
//! │  │               AND next_attempt_at <= now AND attempts < max     │   │
//! │  │  2. For each entry:                                             │   │
//! │  │     a. Hand the payload to the sink                             │   │
//! │  │     b. On success: delivered_at = now                           │   │
//! │  │     c. On failure: attempts += 1, last_error, next_attempt_at   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Delivery is at-least-once: a crash between send and mark_delivered    │
//! │  resends the entry.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::notification::NotificationEvent;
use bazaar_core::NotificationOutboxEntry;

#[derive(Debug, FromRow)]
struct OutboxRow {
    id: String,
    kind: String,
    order_number: String,
    recipient: String,
    subject: String,
    payload: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    next_attempt_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for NotificationOutboxEntry {
    fn from(row: OutboxRow) -> Self {
        NotificationOutboxEntry {
            id: row.id,
            kind: row.kind,
            order_number: row.order_number,
            recipient: row.recipient,
            subject: row.subject,
            payload: row.payload,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            next_attempt_at: row.next_attempt_at,
            delivered_at: row.delivered_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, kind, order_number, recipient, subject, payload,
           attempts, last_error, created_at, next_attempt_at, delivered_at
    FROM notification_outbox
"#;

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues an event for delivery, due immediately.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let receipt = CustomerReceipt::build(&order, &payment, &lines);
    /// repo.enqueue(&NotificationEvent::CustomerReceipt(receipt)).await?;
    /// ```
    pub async fn enqueue(&self, event: &NotificationEvent) -> DbResult<NotificationOutboxEntry> {
        let now = Utc::now();
        let payload =
            serde_json::to_string(event).map_err(|e| DbError::serialization("payload", e))?;

        let entry = NotificationOutboxEntry {
            id: Uuid::new_v4().to_string(),
            kind: event.kind().to_string(),
            order_number: event.order_number().to_string(),
            recipient: event.recipient().to_string(),
            subject: event.subject().to_string(),
            payload,
            attempts: 0,
            last_error: None,
            created_at: now,
            next_attempt_at: now,
            delivered_at: None,
        };

        debug!(
            kind = %entry.kind,
            order_number = %entry.order_number,
            recipient = %entry.recipient,
            "Queuing notification"
        );

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, order_number, recipient, subject, payload,
                attempts, last_error, created_at, next_attempt_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.kind)
        .bind(&entry.order_number)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.next_attempt_at)
        .bind(entry.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Entries due at `now` that have not used up their attempts, oldest first.
    pub async fn get_pending(
        &self,
        limit: u32,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<NotificationOutboxEntry>> {
        let sql = format!(
            "{} WHERE delivered_at IS NULL AND next_attempt_at <= ?1 AND attempts < ?2 \
             ORDER BY created_at LIMIT ?3",
            SELECT_COLUMNS
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(i64::from(max_attempts))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(NotificationOutboxEntry::from).collect())
    }

    /// Every entry queued for one order, in queue order.
    pub async fn get_for_order(&self, order_number: &str) -> DbResult<Vec<NotificationOutboxEntry>> {
        let sql = format!("{} WHERE order_number = ?1 ORDER BY created_at, rowid", SELECT_COLUMNS);
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(order_number)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(NotificationOutboxEntry::from).collect())
    }

    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Marking notification delivered");

        sqlx::query("UPDATE notification_outbox SET delivered_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Records a failed attempt and when to try again.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                next_attempt_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries, including those out of attempts.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes entries delivered more than `days_old` days ago.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            r#"
            DELETE FROM notification_outbox
            WHERE delivered_at IS NOT NULL
            AND delivered_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bazaar_core::notification::{VendorAlert, VENDOR_ALERT_SUBJECT};
    use bazaar_core::{Money, TaxBreakdown};

    fn alert(order_number: &str) -> NotificationEvent {
        NotificationEvent::VendorAlert(VendorAlert {
            recipient: "grill@vendor.test".to_string(),
            order_number: order_number.to_string(),
            created_at: Utc::now(),
            vendor_id: "v1".to_string(),
            vendor_subtotal: Money::from_cents(1000),
            vendor_tax_breakdown: TaxBreakdown::new(),
            vendor_total: Money::from_cents(1000),
            vendor_line_items: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_enqueue_and_deliver() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.notifications();

        let entry = repo.enqueue(&alert("N1")).await.unwrap();
        assert_eq!(entry.kind, "vendor_alert");
        assert_eq!(entry.subject, VENDOR_ALERT_SUBJECT);

        let pending = repo.get_pending(10, 3, Utc::now()).await.unwrap();
        assert_eq!(pending.len(), 1);
        let decoded: NotificationEvent = serde_json::from_str(&pending[0].payload).unwrap();
        assert_eq!(decoded.order_number(), "N1");
        assert_eq!(decoded.recipient(), "grill@vendor.test");

        repo.mark_delivered(&entry.id).await.unwrap();
        assert_eq!(repo.count_pending().await.unwrap(), 0);
        assert!(repo.get_pending(10, 3, Utc::now()).await.unwrap().is_empty());

        let all = repo.get_for_order("N1").await.unwrap();
        assert!(all[0].delivered_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_entries_wait_and_run_out() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.notifications();
        let entry = repo.enqueue(&alert("N2")).await.unwrap();

        let later = Utc::now() + Duration::seconds(30);
        repo.mark_failed(&entry.id, "smtp down", later).await.unwrap();

        // Not due yet
        assert!(repo.get_pending(10, 3, Utc::now()).await.unwrap().is_empty());
        let due = repo.get_pending(10, 3, later).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("smtp down"));

        // Out of attempts
        assert!(repo.get_pending(10, 1, later).await.unwrap().is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_and_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.notifications();
        let delivered = repo.enqueue(&alert("N3")).await.unwrap();
        repo.enqueue(&alert("N3")).await.unwrap();
        repo.mark_delivered(&delivered.id).await.unwrap();

        assert_eq!(repo.cleanup_old_entries(7).await.unwrap(), 0);

        sqlx::query("UPDATE notification_outbox SET delivered_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::days(30))
            .bind(&delivered.id)
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(repo.cleanup_old_entries(7).await.unwrap(), 1);
        assert_eq!(repo.get_for_order("N3").await.unwrap().len(), 1);
    }
}
