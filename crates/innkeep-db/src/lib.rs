//! # innkeep-db: Database Layer for Innkeep
//!
//! SQLite storage for rooms, customers, bookings, vouchers, services,
//! payment sessions and the booking event outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Innkeep Data Flow                                │
//! │                                                                         │
//! │  BookingService::confirm_deposit (innkeep-engine)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     innkeep-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BookingRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ RoomRepo      │    │ 001_initial_ │  │   │
//! │  │   │ begin() → tx  │    │ SessionRepo   │    │ schema.sql   │  │   │
//! │  │   │               │    │ EventRepo ... │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use innkeep_db::{Database, DbConfig, BookingRepository};
//!
//! let db = Database::new(DbConfig::new("innkeep.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! BookingRepository::lock_in(&mut tx, &booking_id).await?;
//! let booking = BookingRepository::fetch_in(&mut tx, &booking_id).await?;
//! // ... decide, then save_guarded_in + EventRepository::append_in
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    BookingRepository, CustomerRepository, EventRepository, RoomRepository, ServiceRepository,
    SessionRepository, SettingsRepository, VoucherRepository,
};
