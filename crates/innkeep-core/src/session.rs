//! # Payment Session Rules
//!
//! Expiry and payload shape of deposit sessions. Storage lives in
//! innkeep-db, the open/confirm flow in innkeep-engine.
//!
//! ```text
//!   created_at                        created_at + ttl
//!       │◄────────── live ────────────►│◄──── expired (treated as absent) ──
//!       ▼                              ▼
//!   ────●──────────────────────────────●──────────────────────────────────►
//!                                      now - created_at >= ttl
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::qr::TransferQr;
use crate::types::{PaymentMethod, PaymentStatus};

/// `true` once `now - created_at >= ttl`.
#[inline]
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - created_at >= ttl
}

/// What a polling client is told about a stored session.
pub fn payment_status(
    created_at: DateTime<Utc>,
    consumed: bool,
    now: DateTime<Utc>,
    ttl: Duration,
) -> PaymentStatus {
    match (is_expired(created_at, now, ttl), consumed) {
        (true, _) => PaymentStatus::Expired,
        (false, true) => PaymentStatus::Completed,
        (false, false) => PaymentStatus::Pending,
    }
}

/// JSON stored in `payment_sessions.payload`.
///
/// The token itself carries no booking information; this is where the
/// booking reference lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionPayload {
    pub booking_id: String,
    pub method: PaymentMethod,
    pub amount: Money,
    /// Only for QR transfers.
    pub transfer: Option<TransferQr>,
}

impl SessionPayload {
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary() {
        let ttl = Duration::seconds(300);
        assert!(!is_expired(t0(), t0(), ttl));
        assert!(!is_expired(t0(), t0() + Duration::seconds(299), ttl));
        assert!(is_expired(t0(), t0() + Duration::seconds(300), ttl));
        assert!(is_expired(t0(), t0() + Duration::hours(2), ttl));
    }

    #[test]
    fn test_payment_status() {
        let ttl = Duration::seconds(300);
        let live = t0() + Duration::seconds(10);
        let late = t0() + Duration::seconds(301);
        assert_eq!(payment_status(t0(), false, live, ttl), PaymentStatus::Pending);
        assert_eq!(payment_status(t0(), true, live, ttl), PaymentStatus::Completed);
        assert_eq!(payment_status(t0(), false, late, ttl), PaymentStatus::Expired);
        assert_eq!(payment_status(t0(), true, late, ttl), PaymentStatus::Expired);
    }

    #[test]
    fn test_payload_json() {
        let payload = SessionPayload {
            booking_id: "b-1".into(),
            method: PaymentMethod::Cash,
            amount: Money::from_dong(300_000),
            transfer: None,
        };
        let raw = payload.to_json().unwrap();
        assert!(raw.contains("\"method\":\"cash\""));
        assert_eq!(SessionPayload::from_json(&raw).unwrap(), payload);
        assert!(SessionPayload::from_json("{not json").is_err());
    }
}
