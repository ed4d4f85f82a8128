//! # Keyed Locks
//!
//! In-process async mutexes keyed by string, used to serialize all cart
//! mutations of one owner and all checkout steps of one order.
//!
//! ```text
//!   add_item(u1) ──┐
//!   add_item(u1) ──┼──► lock "cart:u1" ──► one at a time
//!   decrease(u1) ──┘
//!   add_item(u2) ─────► lock "cart:u2" ──► runs in parallel with u1
//! ```
//!
//! This only covers one process. The SQL statements behind it (atomic
//! upsert, conditional updates on the observed value) keep the invariants
//! when several processes share a database.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        KeyedLocks {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for and takes the lock for `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            // Drop entries nobody holds or waits on
            inflight.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    pub async fn cart(&self, user_id: &str) -> OwnedMutexGuard<()> {
        self.acquire(&format!("cart:{}", user_id)).await
    }

    pub async fn order(&self, order_number: &str) -> OwnedMutexGuard<()> {
        self.acquire(&format!("order:{}", order_number)).await
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
