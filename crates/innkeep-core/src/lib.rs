//! # innkeep-core: Pure Business Logic for Innkeep
//!
//! This crate holds the hotel reservation rules as pure functions with zero
//! I/O dependencies. Clocks, randomness and storage are supplied by callers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Innkeep Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Web layer (routing, auth, templates, chat)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ explicit actor + ids                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   innkeep-engine: BookingService, sessions, scheduler           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ innkeep-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌───────────┐ ┌────────────┐ ┌───────────┐ ┌───────────────┐  │   │
//! │  │  │  types    │ │availability│ │ lifecycle │ │   pricing     │  │   │
//! │  │  │  money    │ │ intervals  │ │ guards    │ │ deposit, bill │  │   │
//! │  │  └───────────┘ └────────────┘ └───────────┘ └───────────────┘  │   │
//! │  │  ┌───────────┐ ┌────────────┐ ┌───────────────────────────────┐│   │
//! │  │  │  session  │ │     qr     │ │ status_message / validation   ││   │
//! │  │  └───────────┘ └────────────┘ └───────────────────────────────┘│   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 innkeep-db (SQLite repositories)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Room, Booking, Voucher, ...)
//! - [`money`] - Integer đồng
//! - [`availability`] - Half-open intervals and the availability predicate
//! - [`lifecycle`] - Booking transition table
//! - [`pricing`] - Room charge, deposit, penalty, voucher, settlement
//! - [`session`] - Payment session expiry and payload
//! - [`qr`] - Bank-transfer QR rendering
//! - [`status_message`] - Status text and severity for the UI
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use innkeep_core::money::Money;
//! use innkeep_core::pricing::{deposit_amount, PricingPolicy};
//!
//! let room_charge = Money::from_dong(1_200_000);
//! let deposit = deposit_amount(room_charge, &PricingPolicy::default());
//! assert_eq!(deposit.dong(), 360_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod qr;
pub mod session;
pub mod status_message;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Share of the room charge collected as a deposit unless configured.
pub const DEFAULT_DEPOSIT_PERCENT: u32 = 30;

/// Hourly rate as a share of the nightly base price unless configured.
pub const DEFAULT_HOURLY_RATE_PERCENT: u32 = 20;

/// Lifetime of a payment session.
pub const PAYMENT_SESSION_TTL_SECS: i64 = 300;

/// Longest stay accepted in one `by_day` booking.
pub const MAX_STAY_NIGHTS: i64 = 90;

/// Longest stay accepted in one `by_hour` booking.
pub const MAX_STAY_HOURS: i64 = 72;

/// Maximum quantity of a service item in one usage record.
pub const MAX_SERVICE_QUANTITY: i64 = 99;
