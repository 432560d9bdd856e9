//! # Service Repository
//!
//! Catalog items and per-booking usage. A usage row freezes the item's price
//! at recording time, so later catalog edits never change an open bill.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use innkeep_core::validation::{validate_name, validate_price};
use innkeep_core::{ServiceItem, ServiceUsage, ServiceUsageStatus};

#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    pub async fn create_item(
        &self,
        name: &str,
        category: &str,
        unit_price: i64,
    ) -> DbResult<ServiceItem> {
        validate_name("service_name", name)?;
        validate_name("category", category)?;
        validate_price(unit_price)?;

        let item = ServiceItem {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            category: category.trim().to_string(),
            unit_price,
        };

        sqlx::query(
            "INSERT INTO service_items (id, name, category, unit_price) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    pub async fn list_items(&self) -> DbResult<Vec<ServiceItem>> {
        let items =
            sqlx::query_as::<_, ServiceItem>("SELECT * FROM service_items ORDER BY category, name")
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    pub async fn usages_for_booking(&self, booking_id: &str) -> DbResult<Vec<ServiceUsage>> {
        let usages = sqlx::query_as::<_, ServiceUsage>(
            "SELECT * FROM service_usages WHERE booking_id = ?1 ORDER BY julianday(used_at), rowid",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(usages)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn get_item_in(conn: &mut SqliteConnection, id: &str) -> DbResult<ServiceItem> {
        sqlx::query_as::<_, ServiceItem>("SELECT * FROM service_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("ServiceItem", id))
    }

    pub async fn record_usage_in(
        conn: &mut SqliteConnection,
        booking_id: &str,
        item: &ServiceItem,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<ServiceUsage> {
        let usage = ServiceUsage {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.to_string(),
            service_item_id: item.id.clone(),
            quantity,
            unit_price: item.unit_price,
            used_at: now,
            status: ServiceUsageStatus::Unpaid,
        };

        sqlx::query(
            r#"
            INSERT INTO service_usages (id, booking_id, service_item_id, quantity, unit_price, used_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&usage.id)
        .bind(&usage.booking_id)
        .bind(&usage.service_item_id)
        .bind(usage.quantity)
        .bind(usage.unit_price)
        .bind(usage.used_at)
        .bind(usage.status)
        .execute(&mut *conn)
        .await?;

        debug!(booking_id = %booking_id, item = %item.name, quantity, "Service usage recorded");
        Ok(usage)
    }

    pub async fn usages_for_booking_in(
        conn: &mut SqliteConnection,
        booking_id: &str,
    ) -> DbResult<Vec<ServiceUsage>> {
        let usages = sqlx::query_as::<_, ServiceUsage>(
            "SELECT * FROM service_usages WHERE booking_id = ?1 ORDER BY julianday(used_at), rowid",
        )
        .bind(booking_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(usages)
    }

    /// Marks every unpaid usage of the booking paid. Returns the row count.
    pub async fn mark_paid_in(conn: &mut SqliteConnection, booking_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE service_usages SET status = 'paid' WHERE booking_id = ?1 AND status = 'unpaid'",
        )
        .bind(booking_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{booking, db, fixture, t0};
    use crate::repository::BookingRepository;
    use innkeep_core::BookingStatus;

    #[tokio::test]
    async fn test_usage_snapshots_price_and_marks_paid() {
        let db = db().await;
        let (room, customer) = fixture(&db).await;
        let services = db.services();
        let water = services.create_item("Mineral water", "minibar", 15_000).await.unwrap();
        let b = booking(&room, &customer, BookingStatus::CheckedIn, 0);

        let mut tx = db.begin().await.unwrap();
        BookingRepository::insert_in(&mut tx, &b).await.unwrap();
        let item = ServiceRepository::get_item_in(&mut tx, &water.id).await.unwrap();
        ServiceRepository::record_usage_in(&mut tx, &b.id, &item, 3, t0())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Price change after the fact does not touch the recorded usage.
        sqlx::query("UPDATE service_items SET unit_price = 99000 WHERE id = ?1")
            .bind(&water.id)
            .execute(db.pool())
            .await
            .unwrap();

        let usages = services.usages_for_booking(&b.id).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].line_total().dong(), 45_000);
        assert_eq!(usages[0].status, ServiceUsageStatus::Unpaid);

        let mut tx = db.begin().await.unwrap();
        assert_eq!(ServiceRepository::mark_paid_in(&mut tx, &b.id).await.unwrap(), 1);
        assert_eq!(ServiceRepository::mark_paid_in(&mut tx, &b.id).await.unwrap(), 0);
        tx.commit().await.unwrap();

        let usages = services.usages_for_booking(&b.id).await.unwrap();
        assert_eq!(usages[0].status, ServiceUsageStatus::Paid);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let db = db().await;
        let mut tx = db.begin().await.unwrap();
        let err = ServiceRepository::get_item_in(&mut tx, "none").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
