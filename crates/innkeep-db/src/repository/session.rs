//! # Payment Session Repository
//!
//! Raw rows only. The TTL rule (an expired row is treated as absent) is
//! applied by `PaymentSessionStore` in innkeep-engine, which owns the clock.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use innkeep_core::PaymentSession;

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    pub async fn get(&self, token: &str) -> DbResult<Option<PaymentSession>> {
        let session =
            sqlx::query_as::<_, PaymentSession>("SELECT * FROM payment_sessions WHERE token = ?1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    pub async fn delete(&self, token: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM payment_sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes sessions created at or before `cutoff` (now − TTL).
    pub async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result =
            sqlx::query("DELETE FROM payment_sessions WHERE julianday(created_at) <= julianday(?1)")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired payment sessions");
        }
        Ok(purged)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Takes the write lock through the session row. `false` if there is none.
    pub async fn lock_in(conn: &mut SqliteConnection, token: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE payment_sessions SET token = token WHERE token = ?1")
            .bind(token)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_in(conn: &mut SqliteConnection, session: &PaymentSession) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_sessions (token, kind, payload, created_at, consumed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&session.token)
        .bind(session.kind)
        .bind(&session.payload)
        .bind(session.created_at)
        .bind(session.consumed_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_in(
        conn: &mut SqliteConnection,
        token: &str,
    ) -> DbResult<Option<PaymentSession>> {
        let session =
            sqlx::query_as::<_, PaymentSession>("SELECT * FROM payment_sessions WHERE token = ?1")
                .bind(token)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(session)
    }

    /// Stamps `consumed_at` once. Returns `false` if it was already set.
    pub async fn mark_consumed_in(
        conn: &mut SqliteConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_sessions SET consumed_at = ?2 WHERE token = ?1 AND consumed_at IS NULL",
        )
        .bind(token)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_in(conn: &mut SqliteConnection, token: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM payment_sessions WHERE token = ?1")
            .bind(token)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};
    use chrono::Duration;
    use innkeep_core::PaymentSessionKind;

    fn session(token: &str, created_at: DateTime<Utc>) -> PaymentSession {
        PaymentSession {
            token: token.to_string(),
            kind: PaymentSessionKind::DepositQr,
            payload: "{}".to_string(),
            created_at,
            consumed_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_consume_delete() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        assert!(!SessionRepository::lock_in(&mut tx, "aa11").await.unwrap());
        SessionRepository::insert_in(&mut tx, &session("aa11", t0())).await.unwrap();
        assert!(SessionRepository::lock_in(&mut tx, "aa11").await.unwrap());
        assert!(SessionRepository::mark_consumed_in(&mut tx, "aa11", t0()).await.unwrap());
        assert!(!SessionRepository::mark_consumed_in(&mut tx, "aa11", t0()).await.unwrap());
        let stored = SessionRepository::get_in(&mut tx, "aa11").await.unwrap().unwrap();
        assert_eq!(stored.consumed_at, Some(t0()));
        assert_eq!(stored.kind, PaymentSessionKind::DepositQr);
        assert!(SessionRepository::delete_in(&mut tx, "aa11").await.unwrap());
        assert!(!SessionRepository::delete_in(&mut tx, "aa11").await.unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_respects_cutoff() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        SessionRepository::insert_in(&mut tx, &session("old", t0())).await.unwrap();
        SessionRepository::insert_in(&mut tx, &session("new", t0() + Duration::minutes(10)))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let repo = db.sessions();
        let purged = repo.purge_created_before(t0() + Duration::minutes(5)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(repo.get("old").await.unwrap().is_none());
        assert!(repo.get("new").await.unwrap().is_some());
        assert!(repo.delete("new").await.unwrap());
    }
}
