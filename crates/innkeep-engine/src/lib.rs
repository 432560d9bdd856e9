//! # innkeep-engine: Booking Lifecycle for Innkeep
//!
//! Turns the rules in `innkeep-core` into transactional operations on top of
//! `innkeep-db`, and runs the background auto-confirmation job.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          innkeep-engine                                 │
//! │                                                                         │
//! │   callers (front desk, guest app, daemon)                              │
//! │        │  Actor::{Customer, Staff, System}                              │
//! │        ▼                                                                │
//! │  ┌───────────────────────┐      ┌───────────────────────────────┐      │
//! │  │    BookingService     │◄─────│    AutoConfirmScheduler       │      │
//! │  │                       │      │  tick → candidates →          │      │
//! │  │  request / deposit /  │      │  auto_confirm (re-checked)    │      │
//! │  │  check-in / check-out │      └───────────────────────────────┘      │
//! │  │  cancel / reschedule  │                                             │
//! │  └──────┬─────────┬──────┘                                             │
//! │         │         │                                                     │
//! │         │   ┌─────▼───────────────┐    ┌───────────────────────────┐   │
//! │         │   │ PaymentSessionStore │    │ HotelConfig               │   │
//! │         │   │ token + TTL         │    │ defaults → toml → settings│   │
//! │         │   └─────────────────────┘    │ table → INNKEEP_* env     │   │
//! │         ▼                              └───────────────────────────┘   │
//! │   innkeep-db (one SQLite transaction per transition)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`booking`] - `BookingService`, every lifecycle transition
//! - [`clock`] - injectable time source
//! - [`config`] - `HotelConfig` loading and validation
//! - [`error`] - `EngineError`
//! - [`scheduler`] - auto-confirm loop
//! - [`session`] - payment session tokens and TTL
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use innkeep_db::{Database, DbConfig};
//! use innkeep_engine::{AutoConfirmScheduler, BookingService, HotelConfig, SystemClock};
//!
//! let config = HotelConfig::load(None)?;
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//! let config = config.with_settings(&db.settings().all().await?)?;
//!
//! let service = BookingService::new(db, Arc::new(config.clone()), Arc::new(SystemClock));
//! let (scheduler, handle) = AutoConfirmScheduler::new(service.clone(), config.scheduler);
//! tokio::spawn(scheduler.run());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking;
pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use booking::{BookingRequest, BookingService, Checkout, CheckoutRequest, DepositSession};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ConfigResult, HotelConfig};
pub use error::{EngineError, EngineResult};
pub use scheduler::{AutoConfirmScheduler, SchedulerHandle, TickReport};
pub use session::PaymentSessionStore;
