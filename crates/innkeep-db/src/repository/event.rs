//! # Booking Event Repository
//!
//! The outbox email and chat collaborators drain.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TRANSITION (e.g. confirm deposit)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. UPDATE bookings SET status = 'confirmed' ...               │   │
//! │  │  2. INSERT INTO booking_events (booking_id, kind, payload)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← both or neither                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Collaborator: get_pending(n) → send mail / open chat → mark_delivered │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use innkeep_core::{BookingEvent, BookingEventKind};

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EventRepository { pool }
    }

    /// Undelivered events, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<BookingEvent>> {
        let events = sqlx::query_as::<_, BookingEvent>(
            "SELECT * FROM booking_events WHERE delivered_at IS NULL ORDER BY id LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn list_for_booking(&self, booking_id: &str) -> DbResult<Vec<BookingEvent>> {
        let events = sqlx::query_as::<_, BookingEvent>(
            "SELECT * FROM booking_events WHERE booking_id = ?1 ORDER BY id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    /// Marks an event delivered. Delivering twice is harmless.
    pub async fn mark_delivered(&self, id: i64, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE booking_events SET delivered_at = COALESCE(delivered_at, ?2) WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BookingEvent", id.to_string()));
        }
        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM booking_events WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn append_in(
        conn: &mut SqliteConnection,
        booking_id: &str,
        kind: BookingEventKind,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO booking_events (booking_id, kind, payload, created_at, delivered_at)
            VALUES (?1, ?2, ?3, ?4, NULL)
            "#,
        )
        .bind(booking_id)
        .bind(kind)
        .bind(payload.to_string())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!(event_id = id, booking_id = %booking_id, kind = ?kind, "Booking event queued");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{booking, db, fixture, t0};
    use crate::repository::BookingRepository;
    use innkeep_core::BookingStatus;

    #[tokio::test]
    async fn test_append_and_drain() {
        let db = db().await;
        let (room, customer) = fixture(&db).await;
        let b = booking(&room, &customer, BookingStatus::PendingConfirmation, 0);

        let mut tx = db.begin().await.unwrap();
        BookingRepository::insert_in(&mut tx, &b).await.unwrap();
        let first = EventRepository::append_in(
            &mut tx,
            &b.id,
            BookingEventKind::Created,
            &serde_json::json!({ "chat_token": b.chat_token }),
            t0(),
        )
        .await
        .unwrap();
        EventRepository::append_in(
            &mut tx,
            &b.id,
            BookingEventKind::DepositConfirmed,
            &serde_json::json!({ "auto": false }),
            t0(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let events = db.events();
        assert_eq!(events.count_pending().await.unwrap(), 2);
        let pending = events.get_pending(10).await.unwrap();
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[0].kind, BookingEventKind::Created);
        assert!(pending[0].payload.contains(&b.chat_token));

        events.mark_delivered(first, t0()).await.unwrap();
        events.mark_delivered(first, t0()).await.unwrap();
        assert_eq!(events.count_pending().await.unwrap(), 1);
        assert_eq!(events.list_for_booking(&b.id).await.unwrap().len(), 2);

        let err = events.mark_delivered(9_999, t0()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
