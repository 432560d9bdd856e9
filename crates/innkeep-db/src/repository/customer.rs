//! # Customer Repository
//!
//! Customers are keyed by identity document number. Registering an existing
//! number updates contact fields only; the id and the number never change.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use innkeep_core::validation::{validate_identity_number, validate_name};
use innkeep_core::{Customer, CustomerContact};

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Finds the customer by identity number or creates one.
    ///
    /// A blank or malformed identity number, or a blank name, is rejected
    /// with [`DbError::Validation`] before any SQL runs.
    pub async fn upsert(
        &self,
        identity_number: &str,
        contact: &CustomerContact,
        now: DateTime<Utc>,
    ) -> DbResult<Customer> {
        validate_identity_number(identity_number)?;
        validate_name("full_name", &contact.full_name)?;
        let identity_number = identity_number.trim();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, identity_number, full_name, phone, email, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (identity_number) DO UPDATE SET
                full_name = excluded.full_name,
                phone = excluded.phone,
                email = excluded.email,
                address = excluded.address
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(identity_number)
        .bind(contact.full_name.trim())
        .bind(&contact.phone)
        .bind(&contact.email)
        .bind(&contact.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(customer_id = %customer.id, "Customer upserted");
        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn get_by_identity_number(&self, identity_number: &str) -> DbResult<Option<Customer>> {
        let customer =
            sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE identity_number = ?1")
                .bind(identity_number.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(customer)
    }

    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Customer> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};
    use chrono::Duration;
    use innkeep_core::ValidationError;

    #[tokio::test]
    async fn test_upsert_creates_then_updates_contact_only() {
        let db = db().await;
        let repo = db.customers();

        let first = repo
            .upsert(
                "079203001234",
                &CustomerContact {
                    full_name: "Le Van Hung".into(),
                    phone: Some("0901111111".into()),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap();

        let second = repo
            .upsert(
                " 079203001234 ",
                &CustomerContact {
                    full_name: "Le Van Hung".into(),
                    phone: Some("0902222222".into()),
                    email: Some("hung@example.vn".into()),
                    address: None,
                },
                t0() + Duration::days(3),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, t0());
        assert_eq!(second.phone.as_deref(), Some("0902222222"));
        assert_eq!(second.email.as_deref(), Some("hung@example.vn"));

        let by_number = repo
            .get_by_identity_number("079203001234")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id, first.id);
    }

    #[tokio::test]
    async fn test_upsert_rejects_blank_identity() {
        let db = db().await;
        let repo = db.customers();

        let err = repo
            .upsert(
                "   ",
                &CustomerContact {
                    full_name: "Pham Thu Ha".into(),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::Required { ref field }) if field == "identity_number"
        ));

        let err = repo
            .upsert("079203001234", &CustomerContact::default(), t0())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::Required { ref field }) if field == "full_name"
        ));

        assert!(repo.get_by_identity_number("").await.unwrap().is_none());
        assert!(repo.get_by_identity_number("079203001234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let db = db().await;
        assert!(db.customers().get_by_id("nobody").await.unwrap().is_none());

        let mut tx = db.begin().await.unwrap();
        let err = CustomerRepository::get_in(&mut tx, "nobody").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
