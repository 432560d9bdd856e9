//! # Engine Error Types
//!
//! What a caller of `BookingService` can be told.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Booking      │  │    Sessions     │  │     Infrastructure      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Conflict       │  │  NotFound       │  │  Database (retry once   │ │
//! │  │  InvalidTrans.  │  │  ExpiredSession │  │   when transient)       │ │
//! │  │  NotPermitted   │  │                 │  │  Config                 │ │
//! │  │  Validation     │  │                 │  │  Payment                │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A voucher that cannot be applied is not an error: checkout succeeds and
//! the settlement carries `voucher_warning`.

use thiserror::Error;

use innkeep_core::{BookingStatus, CoreError, ValidationError};
use innkeep_db::DbError;

use crate::config::ConfigError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested interval collides with a booking that holds the room.
    #[error("Room {room_id} is taken for that interval (booking {blocking_booking_id})")]
    Conflict {
        room_id: String,
        blocking_booking_id: String,
    },

    /// Unknown booking, room, customer, voucher or payment token.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The payment session outlived its TTL.
    ///
    /// Readers treat this exactly like `NotFound`; see [`EngineError::is_not_found`].
    #[error("Payment session {token} has expired")]
    ExpiredSession { token: String },

    #[error("Cannot {action} a booking that is {status}")]
    InvalidTransition {
        status: BookingStatus,
        action: String,
    },

    #[error("{actor} may not {action}")]
    NotPermitted { actor: &'static str, action: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// QR rendering or payload encoding failed.
    #[error("Payment error: {0}")]
    Payment(#[source] CoreError),

    #[error("Database error: {0}")]
    Database(#[source] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn not_permitted(actor: &'static str, action: impl Into<String>) -> Self {
        EngineError::NotPermitted {
            actor,
            action: action.into(),
        }
    }

    /// `NotFound` or `ExpiredSession`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. } | EngineError::ExpiredSession { .. }
        )
    }

    /// Lock contention worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Database(e) if e.is_transient())
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { status, transition } => EngineError::InvalidTransition {
                status,
                action: transition.to_string(),
            },
            CoreError::NotPermitted { actor, transition } => {
                EngineError::not_permitted(actor, transition.to_string())
            }
            CoreError::Validation(v) => EngineError::Validation(v),
            other => EngineError::Payment(other),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            DbError::Validation(v) => EngineError::Validation(v),
            other => EngineError::Database(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::lifecycle::Transition;

    #[test]
    fn test_core_errors_keep_their_category() {
        let err: EngineError = CoreError::InvalidTransition {
            status: BookingStatus::Cancelled,
            transition: Transition::CheckIn,
        }
        .into();
        assert_eq!(err.to_string(), "Cannot check in a booking that is cancelled");

        let err: EngineError = CoreError::NotPermitted {
            actor: "customer",
            transition: Transition::ConfirmDeposit,
        }
        .into();
        assert!(matches!(err, EngineError::NotPermitted { actor: "customer", .. }));

        let err: EngineError = CoreError::BankNotConfigured("bank_id").into();
        assert!(matches!(err, EngineError::Payment(_)));
    }

    #[test]
    fn test_db_not_found_is_lifted() {
        let err: EngineError = DbError::not_found("Booking", "b-1").into();
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let err: EngineError = DbError::Busy("database is locked".into()).into();
        assert!(err.is_transient());

        let err: EngineError = DbError::Validation(ValidationError::Required {
            field: "full_name".into(),
        })
        .into();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_expired_reads_as_not_found() {
        let err = EngineError::ExpiredSession { token: "abc".into() };
        assert!(err.is_not_found());
    }
}
