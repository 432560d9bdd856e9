//! # Domain Types
//!
//! Core domain types used throughout Innkeep.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    RoomType     │◄──│      Room       │◄──│    Booking      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  capacity       │   │  name (unique)  │   │  status         │       │
//! │  │  base_price     │   │  status         │   │  interval       │       │
//! │  └─────────────────┘   └─────────────────┘   │  chat_token     │       │
//! │                                              │  payment_token  │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   │  money columns  │       │
//! │  │    Customer     │◄──│    Voucher      │   └───────┬─────────┘       │
//! │  │  identity_number│   │  single use     │           │                 │
//! │  └─────────────────┘   └─────────────────┘   ┌───────▼─────────┐       │
//! │                                              │  ServiceUsage   │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   │  price snapshot │       │
//! │  │ PaymentSession  │   │  BookingEvent   │   └─────────────────┘       │
//! │  │  token, TTL     │   │  outbox row     │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Relations are plain identifier fields. Nothing here loads anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Room Status
// =============================================================================

/// Operational status of a physical room.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Free,
    Occupied,
}

impl Default for RoomStatus {
    fn default() -> Self {
        RoomStatus::Free
    }
}

// =============================================================================
// Rental Mode / Payment Method
// =============================================================================

/// How a stay is billed.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RentalMode {
    /// Whole days, rounded up.
    ByDay,
    /// Whole hours, rounded up.
    ByHour,
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid at the front desk.
    Cash,
    /// Bank transfer initiated by scanning a QR code.
    QrTransfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::QrTransfer => "qr_transfer",
        }
    }
}

// =============================================================================
// Booking Status
// =============================================================================

/// Lifecycle status of a booking.
///
/// ## State Diagram
/// ```text
///                 ┌────────────┐  promote   ┌──────────────────────┐
///   create ──────►│ waitlisted │───────────►│ pending_confirmation │◄── create
///   (no room)     └─────┬──────┘            └──┬────────┬──────────┘
///                       │                      │confirm │reject/cancel
///                       │cancel                ▼        ▼
///                       │               ┌───────────┐ ┌───────────┐
///                       └──────────────►│ cancelled │◄┤ confirmed │
///                                       └───────────┘ └─────┬─────┘
///                                             ▲             │check-in
///                                             │cancel ┌─────▼─────┐
///                                             └───────┤ checked_in│
///                                                     └─────┬─────┘
///                                                           │check-out
///                                                     ┌─────▼─────┐
///                                                     │   paid    │
///                                                     └───────────┘
/// ```
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting deposit or staff confirmation. Holds the room.
    PendingConfirmation,
    /// Deposit accepted. Holds the room.
    Confirmed,
    /// Guest is in the room. Holds the room.
    CheckedIn,
    /// Stay completed and settled.
    Paid,
    /// Rejected or voided.
    Cancelled,
    /// Accepted onto the waiting list for a full room. Holds nothing.
    Waitlisted,
}

impl BookingStatus {
    /// Statuses that reserve a room against overlapping bookings.
    pub const BLOCKING: [BookingStatus; 3] = [
        BookingStatus::PendingConfirmation,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
    ];

    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::PendingConfirmation,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
        BookingStatus::Paid,
        BookingStatus::Cancelled,
        BookingStatus::Waitlisted,
    ];

    /// Persisted label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingConfirmation => "pending_confirmation",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Waitlisted => "waitlisted",
        }
    }

    #[inline]
    pub const fn is_blocking(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingConfirmation | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }

    /// `paid` and `cancelled` accept no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: BookingStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Who is asking for a transition.
///
/// Authentication happens outside this crate; callers pass the already
/// resolved principal explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Customer { customer_id: String },
    Staff { staff_id: String },
    /// The auto-confirmation scheduler and other internal jobs.
    System,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Actor::Customer { customer_id: id.into() }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Actor::Staff { staff_id: id.into() }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Actor::Customer { .. } => "customer",
            Actor::Staff { .. } => "staff",
            Actor::System => "system",
        }
    }

    /// Staff id to stamp on a booking, if any.
    pub fn staff_id(&self) -> Option<&str> {
        match self {
            Actor::Staff { staff_id } => Some(staff_id),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Customer { customer_id } => write!(f, "customer:{}", customer_id),
            Actor::Staff { staff_id } => write!(f, "staff:{}", staff_id),
            Actor::System => f.write_str("system"),
        }
    }
}

// =============================================================================
// Room Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RoomType {
    pub id: String,
    pub name: String,
    /// Maximum number of guests.
    pub capacity: i64,
    /// Nightly price in đồng.
    pub base_price: i64,
}

impl RoomType {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_dong(self.base_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Room {
    pub id: String,
    /// Display name, e.g. "101".
    pub name: String,
    pub status: RoomStatus,
    pub room_type_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Customer
// =============================================================================

/// A guest, identified by their identity document number.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    /// Unique. Never changes after creation.
    pub identity_number: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Contact fields accepted when registering or updating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerContact {
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Booking
// =============================================================================

/// The central entity. Never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub room_id: String,
    pub staff_id: Option<String>,
    pub rental_mode: RentalMode,

    /// Requested interval, half-open `[check_in_at, check_out_at)`.
    #[ts(as = "String")]
    pub check_in_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub check_out_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub actual_check_in_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub actual_check_out_at: Option<DateTime<Utc>>,

    /// Nights or hours, depending on `rental_mode`.
    pub units: i64,
    pub status: BookingStatus,

    /// Handed to the messaging subsystem at creation.
    pub chat_token: String,
    /// Present only while a QR deposit session is open.
    pub payment_token: Option<String>,

    pub deposit_amount: i64,
    pub penalty_amount: i64,
    pub room_charge: i64,
    pub service_charge: i64,
    pub total_due: i64,

    pub payment_method: Option<PaymentMethod>,
    pub deposit_method: Option<PaymentMethod>,
    pub deposit_confirmed: bool,
    pub voucher_id: Option<String>,

    /// Non-null only when the scheduler confirmed the deposit.
    #[ts(as = "Option<String>")]
    pub auto_confirmed_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[inline]
    pub fn deposit(&self) -> Money {
        Money::from_dong(self.deposit_amount)
    }

    #[inline]
    pub fn room_charge(&self) -> Money {
        Money::from_dong(self.room_charge)
    }

    #[inline]
    pub fn total_due(&self) -> Money {
        Money::from_dong(self.total_due)
    }

    /// Deposit that counts against the final bill.
    pub fn deposit_paid(&self) -> Money {
        if self.deposit_confirmed {
            self.deposit()
        } else {
            Money::zero()
        }
    }

    #[inline]
    pub fn is_auto_confirmed(&self) -> bool {
        self.auto_confirmed_at.is_some()
    }
}

// =============================================================================
// Voucher
// =============================================================================

/// Single-use discount code owned by one customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Voucher {
    pub id: String,
    pub code: String,
    pub customer_id: String,
    pub discount_percent: i64,
    pub is_used: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub used_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Services
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ServiceUsageStatus {
    Unpaid,
    Paid,
}

/// A catalog entry (minibar, laundry, breakfast, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit_price: i64,
}

/// One recorded consumption. Price is frozen at recording time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceUsage {
    pub id: String,
    pub booking_id: String,
    pub service_item_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[ts(as = "String")]
    pub used_at: DateTime<Utc>,
    pub status: ServiceUsageStatus,
}

impl ServiceUsage {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_dong(self.unit_price).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Payment Sessions
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSessionKind {
    DepositCash,
    DepositQr,
}

impl PaymentSessionKind {
    pub const fn for_method(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => PaymentSessionKind::DepositCash,
            PaymentMethod::QrTransfer => PaymentSessionKind::DepositQr,
        }
    }
}

/// Stored session row. `payload` is JSON (see `session::SessionPayload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentSession {
    pub token: String,
    pub kind: PaymentSessionKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Answer given to a client polling a deposit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Live and not yet confirmed.
    Pending,
    /// Confirmed while still inside its TTL.
    Completed,
    /// Stored but past its TTL.
    Expired,
    /// Unknown token.
    Invalid,
}

// =============================================================================
// Booking Events (outbox)
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Waitlisted,
    DepositSessionOpened,
    DepositConfirmed,
    DepositRejected,
    CheckedIn,
    CheckedOut,
    Cancelled,
    Promoted,
    Rescheduled,
}

/// A state change waiting to be picked up by email/chat collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BookingEvent {
    pub id: i64,
    pub booking_id: String,
    pub kind: BookingEventKind,
    /// JSON object.
    pub payload: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
