//! # Repository Module
//!
//! Database repository implementations for Innkeep.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-backed methods (&self)           Transaction functions (*_in)    │
//! │  ───────────────────────────           ──────────────────────────────  │
//! │  db.bookings().get_by_id(id)           BookingRepository::lock_in(     │
//! │  db.events().get_pending(50)               &mut *tx, id)               │
//! │  db.rooms().list_rooms()               BookingRepository::save_guarded │
//! │                                            _in(&mut *tx, &b, expected) │
//! │  One statement, autocommit.            Composed by innkeep-engine into │
//! │  Reads for UIs and the scheduler's     one unit of work: lock, read,   │
//! │  candidate scan.                       check, write, append event.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`RoomRepository`] - Room types, rooms, room status
//! - [`CustomerRepository`] - Customer upsert by identity number
//! - [`BookingRepository`] - Bookings, claims, guarded saves, scheduler scan
//! - [`VoucherRepository`] - Issue and consume vouchers
//! - [`ServiceRepository`] - Service catalog and usage
//! - [`SessionRepository`] - Payment session rows
//! - [`EventRepository`] - Booking event outbox
//! - [`SettingsRepository`] - `system_settings` key/value rows

pub mod booking;
pub mod customer;
pub mod event;
pub mod room;
pub mod service;
pub mod session;
pub mod settings;
pub mod voucher;

pub use booking::BookingRepository;
pub use customer::CustomerRepository;
pub use event::EventRepository;
pub use room::RoomRepository;
pub use service::ServiceRepository;
pub use session::SessionRepository;
pub use settings::SettingsRepository;
pub use voucher::VoucherRepository;
