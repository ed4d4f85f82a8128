//! # Error Types
//!
//! Storage errors and the service-level error taxonomy.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (bazaar-core)           │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← adds context and categorization│                             │
//! │       │                                   │                             │
//! │       └──────────────┬────────────────────┘                             │
//! │                      ▼                                                  │
//! │  MarketError (CartStore, OrderCommitter)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ErrorResponse { code, message } ← serialized by the HTTP layer         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use bazaar_core::{CoreError, ValidationError};

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate order number (retried by the committer)
    /// - Second payment linked to the same order
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Cart row referencing a non-existent food item
    /// - Food item referencing a non-existent vendor
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. `quantity >= 1`).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A persisted JSON column could not be encoded or decoded.
    #[error("Corrupt {column} column: {reason}")]
    Serialization { column: String, reason: String },

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn serialization(column: impl Into<String>, err: serde_json::Error) -> Self {
        DbError::Serialization {
            column: column.into(),
            reason: err.to_string(),
        }
    }

    /// True if this is a UNIQUE violation on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

/// Convert sqlx errors to DbError.
///
/// Input rejected before it reached SQLite; reported like a CHECK failure.
impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::CheckViolation {
            message: err.to_string(),
        }
    }
}

/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Market Error
// =============================================================================

/// Errors returned by the cart and checkout services.
///
/// ## Recovery Policy
/// | Variant | Caller does |
/// |---|---|
/// | `Validation` | show message, user fixes input |
/// | `NotFound` | redirect or message |
/// | `Conflict` | already retried internally; user may retry |
/// | `CartEmpty` | redirect to the marketplace |
/// | `InconsistentState` | order is paid and flagged; never ask to pay again |
/// | `Database` | retry prompt, unless the payment was already committed |
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Lost race (cart quantity, order number) or out-of-order checkout step.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cart is empty for user {user_id}")]
    CartEmpty { user_id: String },

    /// Snapshot disagrees with the recorded totals. The order stays paid
    /// and is flagged for manual reconciliation.
    #[error("Order {order_number} needs reconciliation: {detail}")]
    InconsistentState { order_number: String, detail: String },

    #[error("Database error: {source}")]
    Database {
        source: DbError,
        /// Whether the customer's payment was already recorded when this
        /// failed. If so the system owns recovery.
        payment_committed: bool,
    },
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    CartEmpty,
    InconsistentState,
    DatabaseError,
}

/// What the HTTP layer serializes for a failed call.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Cart item not found: food-1", "retryable": true }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl MarketError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        MarketError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        MarketError::Conflict(message.into())
    }

    /// Wraps a storage failure that happened after the payment was recorded.
    pub fn after_payment(source: DbError) -> Self {
        MarketError::Database {
            source,
            payment_committed: true,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MarketError::Validation(_) => ErrorCode::ValidationError,
            MarketError::NotFound { .. } => ErrorCode::NotFound,
            MarketError::Conflict(_) => ErrorCode::Conflict,
            MarketError::CartEmpty { .. } => ErrorCode::CartEmpty,
            MarketError::InconsistentState { .. } => ErrorCode::InconsistentState,
            MarketError::Database { .. } => ErrorCode::DatabaseError,
        }
    }

    /// Whether the customer may be shown a retry prompt. False once money
    /// has been captured.
    pub fn is_retryable_by_user(&self) -> bool {
        match self {
            MarketError::InconsistentState { .. } => false,
            MarketError::Database {
                payment_committed, ..
            } => !payment_committed,
            _ => true,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            // Storage details stay in the logs
            MarketError::Database { source, .. } => {
                tracing::error!(error = %source, "Database operation failed");
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        ErrorResponse {
            code: self.code(),
            message,
            retryable: self.is_retryable_by_user(),
        }
    }
}

impl From<DbError> for MarketError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => MarketError::NotFound { entity, id },
            DbError::CheckViolation { message } => MarketError::Validation(message),
            other => MarketError::Database {
                source: other,
                payment_committed: false,
            },
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        MarketError::from(DbError::from(err))
    }
}

impl From<CoreError> for MarketError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => MarketError::NotFound { entity, id },
            CoreError::InvalidTransition { .. } => MarketError::Conflict(err.to_string()),
            CoreError::InconsistentState { ref order_number, .. } => {
                MarketError::InconsistentState {
                    order_number: order_number.clone(),
                    detail: err.to_string(),
                }
            }
            CoreError::InvalidArgument { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => MarketError::Validation(err.to_string()),
        }
    }
}

impl From<bazaar_core::ValidationError> for MarketError {
    fn from(err: bazaar_core::ValidationError) -> Self {
        MarketError::Validation(err.to_string())
    }
}

/// Result type for cart and checkout services.
pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::Money;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::InconsistentState).unwrap();
        assert_eq!(json, "\"INCONSISTENT_STATE\"");
        let json = serde_json::to_string(&ErrorCode::CartEmpty).unwrap();
        assert_eq!(json, "\"CART_EMPTY\"");
    }

    #[test]
    fn test_core_error_mapping() {
        let err: MarketError = CoreError::not_found("Cart item", "f1").into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: MarketError = CoreError::QuantityTooLarge {
            requested: 1000,
            max: 999,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err: MarketError = CoreError::InconsistentState {
            order_number: "N1".to_string(),
            expected: Money::from_cents(100),
            actual: Money::zero(),
            detail: "no snapshot lines".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::InconsistentState);
        assert!(!err.is_retryable_by_user());
    }

    #[test]
    fn test_retryable_after_payment() {
        let before: MarketError = DbError::PoolExhausted.into();
        assert!(before.is_retryable_by_user());

        let after = MarketError::after_payment(DbError::PoolExhausted);
        assert!(!after.is_retryable_by_user());
        assert_eq!(after.to_response().message, "Database operation failed");
    }

    #[test]
    fn test_unique_violation_detection() {
        let err = DbError::duplicate("orders.order_number", "N1");
        assert!(err.is_unique_violation_on("orders.order_number"));
        assert!(!err.is_unique_violation_on("orders.payment_id"));
    }
}
