//! # Voucher Repository
//!
//! Codes are issued per customer and consumed at most once. Consumption is
//! a guarded update run inside the checkout transaction:
//!
//! ```text
//!   UPDATE vouchers SET is_used = 1, used_at = ?
//!   WHERE id = ? AND is_used = 0        ← loser of a race gets StaleState
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use innkeep_core::Voucher;

#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    /// Inserts a voucher with the given code.
    pub async fn insert(
        &self,
        code: &str,
        customer_id: &str,
        discount_percent: i64,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DbResult<Voucher> {
        let voucher = Voucher {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            customer_id: customer_id.to_string(),
            discount_percent,
            is_used: false,
            created_at: now,
            expires_at,
            used_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO vouchers (id, code, customer_id, discount_percent, is_used, created_at, expires_at, used_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, NULL)
            "#,
        )
        .bind(&voucher.id)
        .bind(&voucher.code)
        .bind(&voucher.customer_id)
        .bind(voucher.discount_percent)
        .bind(voucher.created_at)
        .bind(voucher.expires_at)
        .execute(&self.pool)
        .await?;

        debug!(voucher_id = %voucher.id, customer_id = %customer_id, "Voucher issued");
        Ok(voucher)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(voucher)
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Voucher>> {
        let vouchers = sqlx::query_as::<_, Voucher>(
            "SELECT * FROM vouchers WHERE customer_id = ?1 ORDER BY julianday(created_at)",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vouchers)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn get_by_code_in(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>("SELECT * FROM vouchers WHERE code = ?1")
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(voucher)
    }

    /// Marks the voucher used. `StaleState` if it already was.
    pub async fn consume_in(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE vouchers SET is_used = 1, used_at = ?2 WHERE id = ?1 AND is_used = 0",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Voucher", id));
        }
        debug!(voucher_id = %id, "Voucher consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, fixture, t0};
    use chrono::Duration;

    #[tokio::test]
    async fn test_issue_and_consume_once() {
        let db = db().await;
        let (_, customer) = fixture(&db).await;
        let repo = db.vouchers();

        let v = repo
            .insert("VC0A1B2C3D", &customer.id, 10, Some(t0() + Duration::days(30)), t0())
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let found = VoucherRepository::get_by_code_in(&mut tx, "VC0A1B2C3D")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, v.id);
        VoucherRepository::consume_in(&mut tx, &v.id, t0()).await.unwrap();
        let again = VoucherRepository::consume_in(&mut tx, &v.id, t0()).await;
        assert!(matches!(again, Err(DbError::StaleState { .. })));
        tx.commit().await.unwrap();

        let loaded = repo.get_by_code("VC0A1B2C3D").await.unwrap().unwrap();
        assert!(loaded.is_used);
        assert_eq!(loaded.used_at, Some(t0()));
        assert_eq!(repo.list_for_customer(&customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = db().await;
        let (_, customer) = fixture(&db).await;
        let repo = db.vouchers();
        repo.insert("VCDEADBEEF", &customer.id, 10, None, t0()).await.unwrap();
        let err = repo
            .insert("VCDEADBEEF", &customer.id, 20, None, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
