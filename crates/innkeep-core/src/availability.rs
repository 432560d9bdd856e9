//! # Availability
//!
//! Half-open stay intervals and the "is this room free" predicate.
//!
//! ```text
//!   existing   [──────────────)
//!   request                   [──────────)     touches, does NOT overlap
//!   request          [──────────)              overlaps
//!
//!   overlap(a, b)  ⇔  a.start < b.end  ∧  b.start < a.end
//! ```
//!
//! The predicate is pure. innkeep-engine feeds it the claims it reads inside
//! the same write transaction that inserts the new booking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Booking, BookingStatus};

// =============================================================================
// Stay Interval
// =============================================================================

/// A non-empty half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl StayInterval {
    /// Rejects `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyInterval);
        }
        Ok(StayInterval { start, end })
    }

    #[inline]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[inline]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[inline]
    pub fn overlaps(&self, other: &StayInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// =============================================================================
// Claims
// =============================================================================

/// The part of a booking the checker cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub booking_id: String,
    pub room_id: String,
    pub status: BookingStatus,
    pub interval: StayInterval,
}

impl Claim {
    /// Builds a claim from a stored booking.
    ///
    /// Rows written by this workspace always satisfy `check_out_at >
    /// check_in_at`; a degenerate row is reported as a validation error.
    pub fn from_booking(booking: &Booking) -> Result<Self, ValidationError> {
        Ok(Claim {
            booking_id: booking.id.clone(),
            room_id: booking.room_id.clone(),
            status: booking.status,
            interval: StayInterval::new(booking.check_in_at, booking.check_out_at)?,
        })
    }

    fn blocks(&self, room_id: &str, interval: &StayInterval, excluding: Option<&str>) -> bool {
        self.room_id == room_id
            && self.status.is_blocking()
            && excluding != Some(self.booking_id.as_str())
            && self.interval.overlaps(interval)
    }
}

/// First blocking claim that collides with the requested interval.
pub fn first_conflict<'a>(
    claims: &'a [Claim],
    room_id: &str,
    interval: &StayInterval,
    excluding_booking: Option<&str>,
) -> Option<&'a Claim> {
    claims
        .iter()
        .find(|claim| claim.blocks(room_id, interval, excluding_booking))
}

/// `true` iff no blocking claim on `room_id` overlaps `interval`.
///
/// `excluding_booking` lets an edit ignore the booking being edited.
pub fn is_available(
    claims: &[Claim],
    room_id: &str,
    interval: &StayInterval,
    excluding_booking: Option<&str>,
) -> bool {
    first_conflict(claims, room_id, interval, excluding_booking).is_none()
}

// =============================================================================
// Unit Tests
// =============================================================================
