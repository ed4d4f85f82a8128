//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule failures                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── MarketError      - What the HTTP layer sees (with ErrorCode)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → MarketError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// An argument violates a precondition (e.g. negative subtotal for tax).
    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Cart has reached the maximum number of distinct items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity would exceed the maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A checkout step was invoked out of order.
    ///
    /// ## When This Occurs
    /// - `commit_payment` on an order that already has a payment
    /// - `finalize` before the payment was committed
    #[error("Order {order_number} cannot move from {from} to {to}")]
    InvalidTransition {
        order_number: String,
        from: String,
        to: String,
    },

    /// Snapshot lines disagree with the totals recorded at order placement.
    ///
    /// ## User Workflow
    /// ```text
    /// place_order  (total_data: X=20.00, Y=5.00)
    ///      │
    ///      ▼
    /// commit_payment ✓   ← customer money captured
    ///      │
    ///      ▼
    /// cart emptied concurrently
    ///      │
    ///      ▼
    /// snapshot_ordered_food → 0 lines → InconsistentState
    ///      │
    ///      ▼
    /// order stays is_ordered = true, flagged for reconciliation
    /// ```
    #[error("Order {order_number} is inconsistent: expected {expected}, found {actual} ({detail})")]
    InconsistentState {
        order_number: String,
        expected: Money,
        actual: Money,
        detail: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidArgument error.
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state is mutated; the user fixes the input and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. malformed email, bad percentage).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Values that must agree with each other do not.
    #[error("{field} is inconsistent: {reason}")]
    Mismatch { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
