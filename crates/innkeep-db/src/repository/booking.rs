//! # Booking Repository
//!
//! Storage for the central entity. Bookings are never deleted.
//!
//! ## Guarded Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every status change is written with the status it was read with:     │
//! │                                                                         │
//! │    UPDATE bookings SET status = 'confirmed', ...                       │
//! │    WHERE id = ?1 AND status = 'pending_confirmation'                   │
//! │                                                                         │
//! │  rows_affected = 0  →  DbError::StaleState                             │
//! │                                                                         │
//! │  Together with `lock_in` (taken before the read) this makes a          │
//! │  scheduler tick and a staff action on the same booking serialize:      │
//! │  the second one reads the first one's result.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use innkeep_core::{Booking, BookingStatus};

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    pub async fn get_by_chat_token(&self, token: &str) -> DbResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE chat_token = ?1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    pub async fn list_for_room(&self, room_id: &str) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE room_id = ?1 ORDER BY julianday(check_in_at), rowid",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE customer_id = ?1 ORDER BY julianday(created_at) DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE status = ?1 ORDER BY julianday(created_at), rowid",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    /// Bookings the auto-confirmation scheduler may act on.
    ///
    /// ## Selection
    /// - `pending_confirmation`, QR deposit, token still attached
    /// - its session is gone, or unconsumed and created at or before
    ///   `session_cutoff` (now − TTL)
    /// - the booking was created at or before `grace_cutoff` (now − grace)
    ///
    /// Oldest first, at most `limit` rows. The result is only a hint: the
    /// transition re-checks status under the row lock.
    pub async fn auto_confirm_candidates(
        &self,
        session_cutoff: DateTime<Utc>,
        grace_cutoff: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT b.* FROM bookings b
            LEFT JOIN payment_sessions s ON s.token = b.payment_token
            WHERE b.status = 'pending_confirmation'
              AND b.deposit_method = 'qr_transfer'
              AND b.deposit_confirmed = 0
              AND b.payment_token IS NOT NULL
              AND (
                    s.token IS NULL
                 OR (s.consumed_at IS NULL AND julianday(s.created_at) <= julianday(?1))
              )
              AND julianday(b.created_at) <= julianday(?2)
            ORDER BY julianday(b.created_at), b.rowid
            LIMIT ?3
            "#,
        )
        .bind(session_cutoff)
        .bind(grace_cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = bookings.len(), "Auto-confirm candidates selected");
        Ok(bookings)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Takes the write lock on a booking row. `NotFound` if it does not exist.
    pub async fn lock_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE bookings SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Booking", id));
        }
        Ok(())
    }

    pub async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Booking", id))
    }

    /// Bookings on the room whose status holds it.
    pub async fn blocking_for_room_in(
        conn: &mut SqliteConnection,
        room_id: &str,
    ) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE room_id = ?1
              AND status IN ('pending_confirmation', 'confirmed', 'checked_in')
            "#,
        )
        .bind(room_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(bookings)
    }

    /// Waitlisted bookings on the room, earliest created first.
    pub async fn waitlisted_for_room_in(
        conn: &mut SqliteConnection,
        room_id: &str,
    ) -> DbResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE room_id = ?1 AND status = 'waitlisted'
            ORDER BY julianday(created_at), rowid
            "#,
        )
        .bind(room_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(bookings)
    }

    pub async fn insert_in(conn: &mut SqliteConnection, b: &Booking) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, customer_id, room_id, staff_id, rental_mode,
                check_in_at, check_out_at, actual_check_in_at, actual_check_out_at,
                units, status, chat_token, payment_token,
                deposit_amount, penalty_amount, room_charge, service_charge, total_due,
                payment_method, deposit_method, deposit_confirmed, voucher_id,
                auto_confirmed_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24, ?25
            )
            "#,
        )
        .bind(&b.id)
        .bind(&b.customer_id)
        .bind(&b.room_id)
        .bind(&b.staff_id)
        .bind(b.rental_mode)
        .bind(b.check_in_at)
        .bind(b.check_out_at)
        .bind(b.actual_check_in_at)
        .bind(b.actual_check_out_at)
        .bind(b.units)
        .bind(b.status)
        .bind(&b.chat_token)
        .bind(&b.payment_token)
        .bind(b.deposit_amount)
        .bind(b.penalty_amount)
        .bind(b.room_charge)
        .bind(b.service_charge)
        .bind(b.total_due)
        .bind(b.payment_method)
        .bind(b.deposit_method)
        .bind(b.deposit_confirmed)
        .bind(&b.voucher_id)
        .bind(b.auto_confirmed_at)
        .bind(b.created_at)
        .bind(b.updated_at)
        .execute(&mut *conn)
        .await?;

        debug!(booking_id = %b.id, status = %b.status, "Booking inserted");
        Ok(())
    }

    /// Writes every mutable column, provided the stored status is still
    /// `expected`.
    pub async fn save_guarded_in(
        conn: &mut SqliteConnection,
        b: &Booking,
        expected: BookingStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                staff_id = ?3,
                check_in_at = ?4,
                check_out_at = ?5,
                actual_check_in_at = ?6,
                actual_check_out_at = ?7,
                units = ?8,
                status = ?9,
                payment_token = ?10,
                deposit_amount = ?11,
                penalty_amount = ?12,
                room_charge = ?13,
                service_charge = ?14,
                total_due = ?15,
                payment_method = ?16,
                deposit_method = ?17,
                deposit_confirmed = ?18,
                voucher_id = ?19,
                auto_confirmed_at = ?20,
                updated_at = ?21
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(&b.id)
        .bind(expected)
        .bind(&b.staff_id)
        .bind(b.check_in_at)
        .bind(b.check_out_at)
        .bind(b.actual_check_in_at)
        .bind(b.actual_check_out_at)
        .bind(b.units)
        .bind(b.status)
        .bind(&b.payment_token)
        .bind(b.deposit_amount)
        .bind(b.penalty_amount)
        .bind(b.room_charge)
        .bind(b.service_charge)
        .bind(b.total_due)
        .bind(b.payment_method)
        .bind(b.deposit_method)
        .bind(b.deposit_confirmed)
        .bind(&b.voucher_id)
        .bind(b.auto_confirmed_at)
        .bind(b.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Booking", &b.id));
        }

        debug!(
            booking_id = %b.id,
            from = %expected,
            to = %b.status,
            "Booking saved"
        );
        Ok(())
    }
}
