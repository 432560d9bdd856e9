//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use innkeep_core::qr::BankAccount;
use innkeep_core::{
    Actor, Booking, BookingEventKind, Customer, CustomerContact, RentalMode, Room, ServiceItem,
};
use innkeep_db::{Database, DbConfig};
use innkeep_engine::{BookingRequest, BookingService, Clock, HotelConfig, ManualClock};

pub const BASE_PRICE: i64 = 500_000;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
}

/// Check-in time `n` days after the first bookable afternoon.
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 2, 14, 0, 0).unwrap() + Duration::days(n)
}

pub fn test_config() -> HotelConfig {
    let mut config = HotelConfig::default();
    config.bank = BankAccount {
        bank_id: "970436".into(),
        account_no: "0071000123456".into(),
        account_name: "INNKEEP HOTEL".into(),
    };
    config
}

pub struct Harness {
    pub service: BookingService,
    pub clock: Arc<ManualClock>,
    pub room: Room,
    pub customer: Customer,
    pub guest: Actor,
    pub staff: Actor,
}

impl Harness {
    pub async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::with_database(db).await
    }

    pub async fn with_database(db: Database) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let service = BookingService::new(db.clone(), Arc::new(test_config()), clock.clone());

        let room_type = db
            .rooms()
            .create_room_type("Deluxe", 2, BASE_PRICE)
            .await
            .unwrap();
        let room = db.rooms().create_room("201", &room_type.id, t0()).await.unwrap();
        let customer = db
            .customers()
            .upsert(
                "079203001234",
                &CustomerContact {
                    full_name: "Tran Thi Mai".into(),
                    email: Some("mai@example.com".into()),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap();

        Harness {
            service,
            clock,
            guest: Actor::customer(customer.id.clone()),
            staff: Actor::staff("staff-1"),
            room,
            customer,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn add_customer(&self, identity_number: &str) -> Customer {
        self.service
            .database()
            .customers()
            .upsert(
                identity_number,
                &CustomerContact {
                    full_name: "Le Van Binh".into(),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap()
    }

    pub async fn add_service_item(&self, name: &str, unit_price: i64) -> ServiceItem {
        self.service
            .database()
            .services()
            .create_item(name, "minibar", unit_price)
            .await
            .unwrap()
    }

    pub fn request(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BookingRequest {
        BookingRequest::new(&self.customer.id, &self.room.id, RentalMode::ByDay, start, end)
            .without_waitlist()
    }

    /// A pending two-night booking starting on `day(offset)`.
    pub async fn book(&self, offset: i64) -> Booking {
        self.service
            .request_booking(&self.request(day(offset), day(offset + 2)), &self.guest)
            .await
            .unwrap()
    }

    pub async fn event_kinds(&self, booking_id: &str) -> Vec<BookingEventKind> {
        self.service
            .database()
            .events()
            .list_for_booking(booking_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }
}
