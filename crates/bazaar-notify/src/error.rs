//! # Notify Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Notify Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Database     │  │       Delivery          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  DatabaseError  │  │  DeliveryFailed         │ │
//! │  │  ConfigLoad     │  │                 │  │  InvalidPayload         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid notify configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// The sink rejected the message. The entry is retried later.
    #[error("Delivery to {recipient} failed: {reason}")]
    DeliveryFailed { recipient: String, reason: String },

    /// The outbox payload does not decode as a notification event.
    #[error("Outbox entry {id} has an unreadable payload: {reason}")]
    InvalidPayload { id: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<bazaar_db::DbError> for NotifyError {
    fn from(err: bazaar_db::DbError) -> Self {
        NotifyError::DatabaseError(err.to_string())
    }
}

impl From<std::io::Error> for NotifyError {
    fn from(err: std::io::Error) -> Self {
        NotifyError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for NotifyError {
    fn from(err: toml::de::Error) -> Self {
        NotifyError::ConfigLoadFailed(err.to_string())
    }
}

impl NotifyError {
    /// True when a later attempt at the same entry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifyError::DeliveryFailed { .. } | NotifyError::DatabaseError(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NotifyError::InvalidConfig(_) | NotifyError::ConfigLoadFailed(_)
        )
    }
}
