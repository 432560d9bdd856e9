//! # Error Types
//!
//! Domain-specific error types for innkeep-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  innkeep-core errors (this file)                                       │
//! │  ├── CoreError        - Lifecycle and rendering failures               │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  innkeep-db errors                                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  innkeep-engine errors                                                 │
//! │  └── EngineError      - What callers of the booking service see        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::lifecycle::Transition;
use crate::types::BookingStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The booking's status does not permit the transition.
    ///
    /// ## When This Occurs
    /// - Check-in on a `cancelled` booking
    /// - Confirming a deposit on a `waitlisted` booking
    /// - Any transition out of `paid` or `cancelled`
    #[error("Cannot {transition} a booking that is {status}")]
    InvalidTransition {
        status: BookingStatus,
        transition: Transition,
    },

    /// The status permits the transition but the actor does not.
    ///
    /// ## When This Occurs
    /// - Customer cancels a `confirmed` booking
    /// - Customer tries to confirm their own deposit
    /// - Anyone but the scheduler tries to promote from the waitlist
    #[error("{actor} may not {transition}")]
    NotPermitted {
        actor: &'static str,
        transition: Transition,
    },

    /// Bank account details needed for a QR transfer are missing.
    #[error("Bank transfer account is not configured: {0}")]
    BankNotConfigured(&'static str),

    /// The QR image link could not be built from the bank details.
    #[error("Invalid QR link: {0}")]
    QrLink(#[from] url::ParseError),

    /// Payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
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

    /// Invalid format (e.g., invalid UUID, malformed token).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Check-out is not after check-in.
    #[error("check-out must be after check-in")]
    EmptyInterval,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
