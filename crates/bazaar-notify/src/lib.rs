//! # bazaar-notify: Notification Dispatcher for Bazaar
//!
//! Delivers the customer receipts and vendor alerts that checkout writes to
//! the notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderCommitter::finalize ──► notification_outbox (bazaar-db)          │
//! │                                        │                                │
//! │                                        ▼                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bazaar-notify (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  NotificationDispatcher ──► OutgoingMessage ──► NotificationSink│   │
//! │  │  (poll, retry, cleanup)     (plain text)        (TracingSink)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Layered `NotifyConfig` (defaults, TOML, environment)
//! - [`dispatcher`] - The polling worker and its shutdown handle
//! - [`error`] - `NotifyError`
//! - [`sink`] - Message rendering and the delivery trait

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod sink;

pub use config::NotifyConfig;
pub use dispatcher::{DispatchStats, DispatcherHandle, NotificationDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use sink::{NotificationSink, OutgoingMessage, TracingSink};
