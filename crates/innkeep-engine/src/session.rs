//! # Payment Session Store
//!
//! Short-lived tokens binding a deposit attempt to a booking.
//!
//! ## Session Lifetime
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open ──► [ pending ] ──consume──► [ completed ]                       │
//! │              │                          │                               │
//! │              │ now - created_at >= TTL  │ now - created_at >= TTL       │
//! │              ▼                          ▼                               │
//! │          [ expired ] ◄──────────────────┘                               │
//! │              │                                                          │
//! │              │  get / consume → ExpiredSession (reads as NotFound)     │
//! │              ▼                                                          │
//! │          purge_expired() deletes the row                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry is decided by the clock on every read, never by whether the row
//! has been purged yet.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use innkeep_core::session::{is_expired, payment_status, SessionPayload};
use innkeep_core::validation::validate_token;
use innkeep_core::{PaymentSession, PaymentSessionKind, PaymentStatus};
use innkeep_db::{Database, SessionRepository};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct PaymentSessionStore {
    db: Database,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PaymentSessionStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        PaymentSessionStore { db, clock, ttl }
    }

    /// 128 bits from the OS generator, hex encoded.
    pub fn new_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session in its own transaction and returns the token.
    pub async fn open(&self, kind: PaymentSessionKind, payload: &SessionPayload) -> EngineResult<String> {
        let token = Self::new_token();
        let mut tx = self.db.begin().await?;
        Self::open_in(&mut tx, &token, kind, payload, self.clock.now(), false).await?;
        tx.commit().await?;
        Ok(token)
    }

    /// Writes a session row inside the caller's transaction.
    ///
    /// `consumed` records a session that is settled the moment it is
    /// created (cash handed to staff).
    pub(crate) async fn open_in(
        conn: &mut SqliteConnection,
        token: &str,
        kind: PaymentSessionKind,
        payload: &SessionPayload,
        now: DateTime<Utc>,
        consumed: bool,
    ) -> EngineResult<PaymentSession> {
        let session = PaymentSession {
            token: token.to_string(),
            kind,
            payload: payload.to_json()?,
            created_at: now,
            consumed_at: consumed.then_some(now),
        };
        SessionRepository::insert_in(conn, &session).await?;
        debug!(kind = ?kind, booking_id = %payload.booking_id, "Payment session opened");
        Ok(session)
    }

    /// Returns the payload of a live session.
    ///
    /// An expired session is reported as `ExpiredSession` and removed.
    pub async fn get(&self, token: &str) -> EngineResult<SessionPayload> {
        validate_token(token)?;
        let repo = self.db.sessions();
        let session = repo
            .get(token)
            .await?
            .ok_or_else(|| EngineError::not_found("PaymentSession", token))?;

        if is_expired(session.created_at, self.clock.now(), self.ttl) {
            repo.delete(token).await?;
            debug!("Expired payment session discarded on read");
            return Err(EngineError::ExpiredSession {
                token: token.to_string(),
            });
        }
        Ok(SessionPayload::from_json(&session.payload)?)
    }

    /// Marks a live session consumed inside the caller's transaction and
    /// returns its payload. Consuming an already consumed session returns
    /// the same payload again.
    ///
    /// Only `BookingService::confirm_deposit` calls this, in the transaction
    /// that confirms the booking, so a `completed` poll always means the
    /// booking moved too.
    pub(crate) async fn consume_in(
        &self,
        conn: &mut SqliteConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionPayload> {
        let (_, payload) = self.live_in(conn, token, now).await?;
        SessionRepository::mark_consumed_in(conn, token, now).await?;
        Ok(payload)
    }

    /// Fetches a session inside a transaction, applying the TTL rule.
    async fn live_in(
        &self,
        conn: &mut SqliteConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<(PaymentSession, SessionPayload)> {
        let session = SessionRepository::get_in(conn, token)
            .await?
            .ok_or_else(|| EngineError::not_found("PaymentSession", token))?;

        if is_expired(session.created_at, now, self.ttl) {
            return Err(EngineError::ExpiredSession {
                token: token.to_string(),
            });
        }
        let payload = SessionPayload::from_json(&session.payload)?;
        Ok((session, payload))
    }

    /// What a polling client sees. Unknown or malformed tokens are `Invalid`.
    pub async fn status(&self, token: &str) -> EngineResult<PaymentStatus> {
        if validate_token(token).is_err() {
            return Ok(PaymentStatus::Invalid);
        }
        let status = match self.db.sessions().get(token).await? {
            Some(session) => payment_status(
                session.created_at,
                session.consumed_at.is_some(),
                self.clock.now(),
                self.ttl,
            ),
            None => PaymentStatus::Invalid,
        };
        Ok(status)
    }

    /// Deletes every session past its TTL.
    pub async fn purge_expired(&self) -> EngineResult<u64> {
        let cutoff = self.clock.now() - self.ttl;
        Ok(self.db.sessions().purge_created_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use innkeep_core::{Money, PaymentMethod};
    use innkeep_db::DbConfig;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap()
    }

    async fn store() -> (PaymentSessionStore, Arc<ManualClock>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let store = PaymentSessionStore::new(db, clock.clone(), Duration::seconds(300));
        (store, clock)
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            booking_id: "b-1".into(),
            method: PaymentMethod::QrTransfer,
            amount: Money::from_dong(300_000),
            transfer: None,
        }
    }

    #[tokio::test]
    async fn test_get_until_ttl_then_gone() {
        let (store, clock) = store().await;
        let token = store.open(PaymentSessionKind::DepositQr, &payload()).await.unwrap();
        assert_eq!(token.len(), 32);

        clock.advance(Duration::seconds(299));
        assert_eq!(store.get(&token).await.unwrap(), payload());
        assert_eq!(store.status(&token).await.unwrap(), PaymentStatus::Pending);

        clock.advance(Duration::seconds(1));
        assert_eq!(store.status(&token).await.unwrap(), PaymentStatus::Expired);
        let err = store.get(&token).await.unwrap_err();
        assert!(matches!(err, EngineError::ExpiredSession { .. }));
        assert!(err.is_not_found());

        // The expired read removed the row.
        assert_eq!(store.status(&token).await.unwrap(), PaymentStatus::Invalid);
    }

    async fn consume(store: &PaymentSessionStore, token: &str) -> EngineResult<SessionPayload> {
        let mut tx = store.db.begin().await?;
        let payload = store.consume_in(&mut tx, token, store.clock.now()).await?;
        tx.commit().await?;
        Ok(payload)
    }

    #[tokio::test]
    async fn test_consume_is_idempotent_within_ttl() {
        let (store, clock) = store().await;
        let token = store.open(PaymentSessionKind::DepositQr, &payload()).await.unwrap();

        let first = consume(&store, &token).await.unwrap();
        let second = consume(&store, &token).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.status(&token).await.unwrap(), PaymentStatus::Completed);

        clock.advance(Duration::minutes(5));
        assert!(consume(&store, &token).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_tokens() {
        let (store, _) = store().await;
        assert!(store.get("0123abcd").await.unwrap_err().is_not_found());
        assert_eq!(store.status("0123abcd").await.unwrap(), PaymentStatus::Invalid);
        assert_eq!(store.status("not a token!").await.unwrap(), PaymentStatus::Invalid);
        assert!(matches!(
            store.get("not a token!").await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store().await;
        let old = store.open(PaymentSessionKind::DepositQr, &payload()).await.unwrap();
        clock.advance(Duration::minutes(4));
        let fresh = store.open(PaymentSessionKind::DepositQr, &payload()).await.unwrap();
        clock.advance(Duration::minutes(1));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.status(&old).await.unwrap(), PaymentStatus::Invalid);
        assert_eq!(store.status(&fresh).await.unwrap(), PaymentStatus::Pending);
    }
}
