//! # Validation Module
//!
//! Input validation for booking requests and catalog writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web layer (outside this workspace)                           │
//! │  ├── Form parsing, required fields                                     │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: innkeep-engine operations                                    │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints (identity number, tokens, voucher code)        │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::availability::StayInterval;
use crate::error::ValidationError;
use crate::types::RentalMode;
use crate::{MAX_SERVICE_QUANTITY, MAX_STAY_HOURS, MAX_STAY_NIGHTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identity document number (CMND/CCCD/passport).
///
/// ## Rules
/// - Must not be empty
/// - At most 30 characters
/// - Letters and digits only
///
/// ## Example
/// ```rust
/// use innkeep_core::validation::validate_identity_number;
///
/// assert!(validate_identity_number("079203001234").is_ok());
/// assert!(validate_identity_number("B1234567").is_ok());
/// assert!(validate_identity_number("").is_err());
/// assert!(validate_identity_number("12-34").is_err());
/// ```
pub fn validate_identity_number(value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: "identity_number".to_string(),
        });
    }

    if value.len() > 30 {
        return Err(ValidationError::TooLong {
            field: "identity_number".to_string(),
            max: 30,
        });
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "identity_number".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (customer, room, service item).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a token supplied by a caller (payment or chat token).
///
/// Payment tokens are 32 lowercase hex chars, chat tokens hyphenated UUIDs;
/// anything else cannot exist in storage and is refused early.
pub fn validate_token(token: &str) -> ValidationResult<()> {
    if token.is_empty() {
        return Err(ValidationError::Required {
            field: "token".to_string(),
        });
    }
    if token.len() > 64 || !token.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "token".to_string(),
            reason: "unrecognised token".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Stay Validators
// =============================================================================

/// Validates a requested stay and returns it as an interval.
///
/// ## Rules
/// - Check-out strictly after check-in
/// - At most 90 nights (`by_day`) or 72 hours (`by_hour`)
pub fn validate_stay(
    mode: RentalMode,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ValidationResult<StayInterval> {
    let interval = StayInterval::new(start, end)?;
    let length = end - start;

    let (too_long, field, max) = match mode {
        RentalMode::ByDay => (length.num_days() > MAX_STAY_NIGHTS, "nights", MAX_STAY_NIGHTS),
        RentalMode::ByHour => (length.num_hours() > MAX_STAY_HOURS, "hours", MAX_STAY_HOURS),
    };
    if too_long {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max,
        });
    }

    Ok(interval)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a service usage quantity (1..=99).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_SERVICE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_SERVICE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a price in đồng. Zero is allowed (complimentary items).
pub fn validate_price(dong: i64) -> ValidationResult<()> {
    if dong < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Voucher discount: 1..=100 percent.
pub fn validate_discount_percent(pct: i64) -> ValidationResult<()> {
    if !(1..=100).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 1,
            max: 100,
        });
    }
    Ok(())
}

/// Any whole percentage setting: 0..=100.
pub fn validate_percent(field: &str, pct: u32) -> ValidationResult<()> {
    if pct > 100 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_validate_identity_number() {
        assert!(validate_identity_number("079203001234").is_ok());
        assert!(validate_identity_number("  B1234567 ").is_ok());
        assert!(validate_identity_number("").is_err());
        assert!(validate_identity_number("   ").is_err());
        assert!(validate_identity_number("12 34").is_err());
        assert!(validate_identity_number(&"9".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("full_name", "Nguyễn Văn An").is_ok());
        assert!(validate_name("full_name", "").is_err());
        assert!(validate_name("full_name", &"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("0f3c2a9be1d44c5e8a7b6c5d4e3f2a1b").is_ok());
        assert!(validate_token("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_token("").is_err());
        assert!(validate_token("'; DROP TABLE bookings; --").is_err());
    }

    #[test]
    fn test_validate_stay() {
        assert!(validate_stay(RentalMode::ByDay, t0(), t0() + Duration::days(2)).is_ok());
        assert!(matches!(
            validate_stay(RentalMode::ByDay, t0(), t0()),
            Err(ValidationError::EmptyInterval)
        ));
        assert!(validate_stay(RentalMode::ByDay, t0(), t0() + Duration::days(91)).is_err());
        assert!(validate_stay(RentalMode::ByHour, t0(), t0() + Duration::hours(3)).is_ok());
        assert!(validate_stay(RentalMode::ByHour, t0(), t0() + Duration::hours(73)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(99).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(100).is_err());
    }

    #[test]
    fn test_validate_percentages() {
        assert!(validate_discount_percent(10).is_ok());
        assert!(validate_discount_percent(0).is_err());
        assert!(validate_discount_percent(101).is_err());
        assert!(validate_percent("deposit_percent", 0).is_ok());
        assert!(validate_percent("deposit_percent", 100).is_ok());
        assert!(validate_percent("deposit_percent", 101).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(450_000).is_ok());
        assert!(validate_price(-1).is_err());
    }
}
