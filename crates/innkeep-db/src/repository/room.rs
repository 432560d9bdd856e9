//! # Room Repository
//!
//! Room types, rooms and the free/occupied flag.
//!
//! `lock_in` is the per-room write lock every booking-creating or
//! interval-changing transaction takes first:
//! ```text
//!   BEGIN
//!   UPDATE rooms SET updated_at = updated_at WHERE id = ?   ← write lock
//!   SELECT ... FROM bookings WHERE room_id = ? AND status IN (blocking)
//!   INSERT INTO bookings ...
//!   COMMIT
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use innkeep_core::validation::{validate_name, validate_price};
use innkeep_core::{Room, RoomStatus, RoomType};

#[derive(Debug, Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RoomRepository { pool }
    }

    pub async fn create_room_type(
        &self,
        name: &str,
        capacity: i64,
        base_price: i64,
    ) -> DbResult<RoomType> {
        validate_name("room_type_name", name)?;
        validate_price(base_price)?;

        let room_type = RoomType {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            capacity,
            base_price,
        };

        sqlx::query(
            "INSERT INTO room_types (id, name, capacity, base_price) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&room_type.id)
        .bind(&room_type.name)
        .bind(room_type.capacity)
        .bind(room_type.base_price)
        .execute(&self.pool)
        .await?;

        debug!(room_type_id = %room_type.id, name = %room_type.name, "Created room type");
        Ok(room_type)
    }

    pub async fn create_room(
        &self,
        name: &str,
        room_type_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Room> {
        validate_name("room_name", name)?;

        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            status: RoomStatus::Free,
            room_type_id: room_type_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, status, room_type_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&room.id)
        .bind(&room.name)
        .bind(room.status)
        .bind(&room.room_type_id)
        .bind(room.created_at)
        .bind(room.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name),
            other => other,
        })?;

        debug!(room_id = %room.id, name = %room.name, "Created room");
        Ok(room)
    }

    pub async fn get_room(&self, id: &str) -> DbResult<Option<Room>> {
        let room = sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room)
    }

    pub async fn get_room_type(&self, id: &str) -> DbResult<Option<RoomType>> {
        let room_type = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(room_type)
    }

    pub async fn list_rooms(&self) -> DbResult<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>("SELECT * FROM rooms ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }

    pub async fn list_room_types(&self) -> DbResult<Vec<RoomType>> {
        let types = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types ORDER BY base_price")
            .fetch_all(&self.pool)
            .await?;
        Ok(types)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Takes the write lock on a room row. `NotFound` if it does not exist.
    pub async fn lock_in(conn: &mut SqliteConnection, room_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE rooms SET updated_at = updated_at WHERE id = ?1")
            .bind(room_id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Room", room_id));
        }
        Ok(())
    }

    pub async fn room_type_for_room_in(
        conn: &mut SqliteConnection,
        room_id: &str,
    ) -> DbResult<RoomType> {
        sqlx::query_as::<_, RoomType>(
            r#"
            SELECT t.* FROM room_types t
            INNER JOIN rooms r ON r.room_type_id = t.id
            WHERE r.id = ?1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Room", room_id))
    }

    pub async fn set_status_in(
        conn: &mut SqliteConnection,
        room_id: &str,
        status: RoomStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE rooms SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(room_id)
            .bind(status)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Room", room_id));
        }
        debug!(room_id = %room_id, status = ?status, "Room status changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = db().await;
        let rooms = db.rooms();
        let deluxe = rooms.create_room_type("Deluxe", 2, 500_000).await.unwrap();
        let room = rooms.create_room("101", &deluxe.id, t0()).await.unwrap();

        let loaded = rooms.get_room(&room.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "101");
        assert_eq!(loaded.status, RoomStatus::Free);
        assert_eq!(loaded.created_at, t0());

        let ty = rooms.get_room_type(&deluxe.id).await.unwrap().unwrap();
        assert_eq!(ty.base_price().dong(), 500_000);
        assert!(rooms.get_room("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_room_name() {
        let db = db().await;
        let rooms = db.rooms();
        let ty = rooms.create_room_type("Single", 1, 300_000).await.unwrap();
        rooms.create_room("201", &ty.id, t0()).await.unwrap();
        let err = rooms.create_room("201", &ty.id, t0()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_catalog_input_is_validated() {
        let db = db().await;
        let rooms = db.rooms();
        assert!(matches!(
            rooms.create_room_type("  ", 2, 400_000).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            rooms.create_room_type("Suite", 2, -1).await,
            Err(DbError::Validation(_))
        ));

        let ty = rooms.create_room_type("Suite", 2, 900_000).await.unwrap();
        assert!(matches!(
            rooms.create_room("", &ty.id, t0()).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.services().create_item("Late snack", "kitchen", -5_000).await,
            Err(DbError::Validation(_))
        ));
        assert!(rooms.list_rooms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_and_status_in_transaction() {
        let db = db().await;
        let rooms = db.rooms();
        let ty = rooms.create_room_type("Twin", 2, 400_000).await.unwrap();
        let room = rooms.create_room("301", &ty.id, t0()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        RoomRepository::lock_in(&mut tx, &room.id).await.unwrap();
        let found = RoomRepository::room_type_for_room_in(&mut tx, &room.id)
            .await
            .unwrap();
        assert_eq!(found.id, ty.id);
        RoomRepository::set_status_in(&mut tx, &room.id, RoomStatus::Occupied, t0())
            .await
            .unwrap();
        assert!(matches!(
            RoomRepository::lock_in(&mut tx, "missing").await,
            Err(DbError::NotFound { .. })
        ));
        tx.commit().await.unwrap();

        let loaded = rooms.get_room(&room.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RoomStatus::Occupied);
    }
}
