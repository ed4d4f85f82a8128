//! # Notification Dispatcher
//!
//! Drains `notification_outbox` on an interval.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Dispatcher Loop                                   │
//! │                                                                         │
//! │  every poll_interval                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  get_pending(batch_size, max_attempts, now)                            │
//! │       │                                                                 │
//! │       ▼  for each entry                                                 │
//! │  decode payload ──► render OutgoingMessage ──► sink.deliver()          │
//! │       │                                              │                  │
//! │       │ Ok                                           │ Err              │
//! │       ▼                                              ▼                  │
//! │  mark_delivered                  mark_failed(next = now + delay × n)   │
//! │                                  n == max_attempts → warn, give up     │
//! │                                                                         │
//! │  every cleanup tick: delete delivered entries older than N days        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A crash between `deliver` and `mark_delivered` sends the entry again on
//! the next run.

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::notification::NotificationEvent;
use bazaar_core::NotificationOutboxEntry;
use bazaar_db::Database;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::sink::{NotificationSink, OutgoingMessage};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Outcome of one pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
    /// Failures that used the entry's last attempt.
    pub exhausted: usize,
}

pub struct NotificationDispatcher<S: NotificationSink> {
    db: Arc<Database>,
    config: Arc<NotifyConfig>,
    sink: Arc<S>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    pub async fn shutdown(&self) -> NotifyResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| NotifyError::ChannelError("Shutdown channel closed".into()))
    }
}

impl<S: NotificationSink> NotificationDispatcher<S> {
    pub fn new(
        db: Arc<Database>,
        config: Arc<NotifyConfig>,
        sink: Arc<S>,
    ) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = NotificationDispatcher {
            db,
            config,
            sink,
            shutdown_rx,
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs until the handle asks for shutdown. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            poll_interval_secs = self.config.dispatch.poll_interval_secs,
            batch_size = self.config.dispatch.batch_size,
            max_attempts = self.config.dispatch.max_attempts,
            "Notification dispatcher starting"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut cleanup = tokio::time::interval(CLEANUP_INTERVAL);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_pending().await {
                        error!(?e, "Failed to dispatch notification batch");
                    }
                }

                _ = cleanup.tick() => {
                    if let Err(e) = self.cleanup().await {
                        error!(?e, "Failed to clean up delivered notifications");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Notification dispatcher stopped");
    }

    /// Delivers every entry due now, up to one batch.
    pub async fn dispatch_pending(&self) -> NotifyResult<DispatchStats> {
        let dispatch = &self.config.dispatch;
        let entries = self
            .db
            .notifications()
            .get_pending(dispatch.batch_size, dispatch.max_attempts, Utc::now())
            .await?;

        let mut stats = DispatchStats::default();
        if entries.is_empty() {
            debug!("No pending notifications");
            return Ok(stats);
        }

        info!(count = entries.len(), "Dispatching notifications");

        for entry in entries {
            match self.deliver(&entry).await {
                Ok(()) => {
                    if let Err(e) = self.db.notifications().mark_delivered(&entry.id).await {
                        error!(?e, id = %entry.id, "Failed to mark notification delivered");
                        continue;
                    }
                    stats.delivered += 1;
                }
                Err(err) => {
                    stats.failed += 1;
                    if self.record_failure(&entry, &err).await {
                        stats.exhausted += 1;
                    }
                }
            }
        }

        Ok(stats)
    }

    async fn deliver(&self, entry: &NotificationOutboxEntry) -> NotifyResult<()> {
        let event: NotificationEvent =
            serde_json::from_str(&entry.payload).map_err(|e| NotifyError::InvalidPayload {
                id: entry.id.clone(),
                reason: e.to_string(),
            })?;

        let message = OutgoingMessage::render(&event, &self.config.mail);
        self.sink.deliver(&message).await?;

        debug!(
            id = %entry.id,
            kind = %entry.kind,
            order_number = %entry.order_number,
            recipient = %entry.recipient,
            "Notification delivered"
        );
        Ok(())
    }

    /// Schedules the next attempt. Returns true when none is left.
    async fn record_failure(&self, entry: &NotificationOutboxEntry, err: &NotifyError) -> bool {
        let attempts = entry.attempts + 1;
        let next_attempt_at = Utc::now() + self.config.retry_delay(attempts);

        if let Err(e) = self
            .db
            .notifications()
            .mark_failed(&entry.id, &err.to_string(), next_attempt_at)
            .await
        {
            error!(?e, id = %entry.id, "Failed to record notification failure");
        }

        let exhausted = attempts >= i64::from(self.config.dispatch.max_attempts);
        if exhausted {
            warn!(
                id = %entry.id,
                kind = %entry.kind,
                order_number = %entry.order_number,
                recipient = %entry.recipient,
                attempts,
                error = %err,
                "Giving up on notification after max attempts"
            );
        } else {
            warn!(
                id = %entry.id,
                attempts,
                retryable = err.is_retryable(),
                error = %err,
                %next_attempt_at,
                "Notification delivery failed, will retry"
            );
        }

        exhausted
    }

    async fn cleanup(&self) -> NotifyResult<()> {
        let days = self.config.dispatch.cleanup_after_days;
        if days == 0 {
            return Ok(());
        }

        let removed = self.db.notifications().cleanup_old_entries(days).await?;
        if removed > 0 {
            info!(removed, days, "Removed delivered notifications");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::notification::{CustomerReceipt, ReceiptLine};
    use bazaar_core::{Money, PaymentMethod, TaxBreakdown};
    use bazaar_db::DbConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<OutgoingMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl NotificationSink for RecordingSink {
        async fn deliver(&self, message: &OutgoingMessage) -> NotifyResult<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        async fn deliver(&self, message: &OutgoingMessage) -> NotifyResult<()> {
            Err(NotifyError::DeliveryFailed {
                recipient: message.to.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }

    fn receipt(order_number: &str) -> NotificationEvent {
        let mut tax = TaxBreakdown::new();
        tax.add("VAT", "10.00", Money::from_cents(250));
        NotificationEvent::CustomerReceipt(CustomerReceipt {
            recipient: "jane@example.com".to_string(),
            customer_name: "Jane Doe".to_string(),
            order_number: order_number.to_string(),
            created_at: Utc::now(),
            payment_method: PaymentMethod::PayPal,
            transaction_id: "TX-1".to_string(),
            subtotal: Money::from_cents(2500),
            tax_breakdown: tax,
            total: Money::from_cents(2750),
            line_items: vec![ReceiptLine {
                food_item_id: "f1".to_string(),
                title: "Ramen".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(1250),
                amount: Money::from_cents(2500),
            }],
        })
    }

    async fn setup() -> Arc<Database> {
        Arc::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    fn config(retry_delay_secs: u64) -> Arc<NotifyConfig> {
        let mut config = NotifyConfig::default();
        config.dispatch.retry_delay_secs = retry_delay_secs;
        config.dispatch.poll_interval_secs = 1;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_delivers_and_marks_entries() {
        let db = setup().await;
        db.notifications().enqueue(&receipt("N1")).await.unwrap();
        db.notifications().enqueue(&receipt("N2")).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _handle) = NotificationDispatcher::new(db.clone(), config(3), sink.clone());

        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.failed, 0);

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "jane@example.com");
        assert!(sent[0].body.contains("Ramen x2"));

        assert_eq!(db.notifications().count_pending().await.unwrap(), 0);

        // Nothing left on the next pass
        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats, DispatchStats::default());
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_schedules_retry() {
        let db = setup().await;
        db.notifications().enqueue(&receipt("N1")).await.unwrap();

        let (dispatcher, _handle) =
            NotificationDispatcher::new(db.clone(), config(3), Arc::new(FailingSink));

        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.exhausted, 0);

        let entry = &db.notifications().get_for_order("N1").await.unwrap()[0];
        assert_eq!(entry.attempts, 1);
        assert!(entry.last_error.as_deref().unwrap().contains("connection refused"));
        assert!(entry.next_attempt_at > Utc::now());

        // Not due yet
        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats, DispatchStats::default());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let db = setup().await;
        db.notifications().enqueue(&receipt("N1")).await.unwrap();

        // Zero delay makes each failure due again immediately
        let (dispatcher, _handle) =
            NotificationDispatcher::new(db.clone(), config(0), Arc::new(FailingSink));

        for _ in 0..2 {
            let stats = dispatcher.dispatch_pending().await.unwrap();
            assert_eq!(stats.exhausted, 0);
        }
        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats.exhausted, 1);

        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats, DispatchStats::default());

        let entry = &db.notifications().get_for_order("N1").await.unwrap()[0];
        assert_eq!(entry.attempts, 3);
        assert!(entry.delivered_at.is_none());
        assert_eq!(db.notifications().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_payload_is_recorded_as_failure() {
        let db = setup().await;
        let entry = db.notifications().enqueue(&receipt("N1")).await.unwrap();
        sqlx::query("UPDATE notification_outbox SET payload = '{\"kind\":\"fax\"}' WHERE id = ?1")
            .bind(&entry.id)
            .execute(db.pool())
            .await
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, _handle) = NotificationDispatcher::new(db.clone(), config(3), sink.clone());

        let stats = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert!(sink.sent().is_empty());

        let stored = &db.notifications().get_for_order("N1").await.unwrap()[0];
        assert!(stored.last_error.as_deref().unwrap().contains("unreadable payload"));
    }

    #[tokio::test]
    async fn test_run_loop_delivers_then_stops() {
        let db = setup().await;
        db.notifications().enqueue(&receipt("N1")).await.unwrap();

        let sink = Arc::new(RecordingSink::default());
        let (dispatcher, handle) = NotificationDispatcher::new(db.clone(), config(3), sink.clone());
        let task = tokio::spawn(dispatcher.run());

        // First interval tick fires immediately
        for _ in 0..100 {
            if !sink.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.sent().len(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(handle.shutdown().await.is_err());
    }
}
