//! # Pricing & Deposit Calculator
//!
//! Stateless functions for everything with a price on it.
//!
//! ## Settlement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  RoomType.base_price ──► unit_rate(mode) × billable_units ─► room      │
//! │                                                   │                     │
//! │                                                   └─► deposit (pct)     │
//! │                                                                         │
//! │  unpaid ServiceUsage Σ qty × unit_price ─────────────────► service     │
//! │                                                                         │
//! │  actual check-out − (scheduled + grace), per started hour ─► penalty   │
//! │                                                                         │
//! │  voucher pct × (room + service), if valid ───────────────► discount    │
//! │                                                                         │
//! │  total = max(0, room + service + penalty − deposit − discount)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::availability::StayInterval;
use crate::money::Money;
use crate::types::{RentalMode, ServiceUsage, ServiceUsageStatus, Voucher};

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

// =============================================================================
// Policy
// =============================================================================

/// Configured percentages, copied out of `HotelConfig` at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Share of the room charge required up front.
    pub deposit_percent: u32,
    /// Hourly rate as a share of the nightly base price.
    pub hourly_rate_percent: u32,
    /// Minutes after scheduled check-out before penalties start.
    pub late_grace_minutes: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            deposit_percent: crate::DEFAULT_DEPOSIT_PERCENT,
            hourly_rate_percent: crate::DEFAULT_HOURLY_RATE_PERCENT,
            late_grace_minutes: 0,
        }
    }
}

// =============================================================================
// Room Charge
// =============================================================================

/// Whole billable units in a stay, rounded up, never less than one.
pub fn billable_units(mode: RentalMode, interval: &StayInterval) -> i64 {
    let seconds = (interval.end() - interval.start()).num_seconds();
    let per_unit = match mode {
        RentalMode::ByDay => SECONDS_PER_DAY,
        RentalMode::ByHour => SECONDS_PER_HOUR,
    };
    ceil_div(seconds, per_unit).max(1)
}

/// Price of one unit for the rental mode.
pub fn unit_rate(mode: RentalMode, base_price: Money, policy: &PricingPolicy) -> Money {
    match mode {
        RentalMode::ByDay => base_price,
        RentalMode::ByHour => base_price.percent(policy.hourly_rate_percent),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomCharge {
    pub units: i64,
    pub amount: Money,
}

pub fn room_charge(
    mode: RentalMode,
    interval: &StayInterval,
    base_price: Money,
    policy: &PricingPolicy,
) -> RoomCharge {
    let units = billable_units(mode, interval);
    RoomCharge {
        units,
        amount: unit_rate(mode, base_price, policy).multiply_quantity(units),
    }
}

/// Required deposit, rounded half up to the đồng.
///
/// ## Example
/// ```rust
/// use innkeep_core::money::Money;
/// use innkeep_core::pricing::{deposit_amount, PricingPolicy};
///
/// let deposit = deposit_amount(Money::from_dong(1_000_000), &PricingPolicy::default());
/// assert_eq!(deposit.dong(), 300_000);
/// ```
pub fn deposit_amount(room_charge: Money, policy: &PricingPolicy) -> Money {
    room_charge.percent(policy.deposit_percent)
}

/// Sum of `quantity × unit_price` over unpaid usage.
pub fn service_charge(usages: &[ServiceUsage]) -> Money {
    usages
        .iter()
        .filter(|u| u.status == ServiceUsageStatus::Unpaid)
        .map(ServiceUsage::line_total)
        .sum()
}

/// Each started hour past `scheduled_out + grace` costs one hourly rate.
pub fn late_penalty(
    scheduled_out: DateTime<Utc>,
    actual_out: DateTime<Utc>,
    base_price: Money,
    policy: &PricingPolicy,
) -> Money {
    let deadline = scheduled_out + Duration::minutes(policy.late_grace_minutes);
    let overage = (actual_out - deadline).num_seconds();
    if overage <= 0 {
        return Money::zero();
    }
    let hours = ceil_div(overage, SECONDS_PER_HOUR);
    unit_rate(RentalMode::ByHour, base_price, policy).multiply_quantity(hours)
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    (value + divisor - 1) / divisor
}

// =============================================================================
// Vouchers
// =============================================================================

/// Why a voucher was not applied. Never fatal to checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoucherRejection {
    #[error("voucher has expired")]
    Expired,
    #[error("voucher has already been used")]
    AlreadyUsed,
    #[error("voucher belongs to another customer")]
    WrongCustomer,
}

/// Checks owner, single use and expiry (expired at `now >= expires_at`).
pub fn check_voucher(
    voucher: &Voucher,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<(), VoucherRejection> {
    if voucher.customer_id != customer_id {
        return Err(VoucherRejection::WrongCustomer);
    }
    if voucher.is_used {
        return Err(VoucherRejection::AlreadyUsed);
    }
    if matches!(voucher.expires_at, Some(expiry) if now >= expiry) {
        return Err(VoucherRejection::Expired);
    }
    Ok(())
}

/// `discount_percent × (room + service)`.
///
/// ## Example
/// ```rust
/// use innkeep_core::money::Money;
/// use innkeep_core::pricing::voucher_discount;
///
/// let d = voucher_discount(10, Money::from_dong(800_000), Money::from_dong(200_000));
/// assert_eq!(d.dong(), 100_000);
/// ```
pub fn voucher_discount(discount_percent: u32, room: Money, service: Money) -> Money {
    (room + service).percent(discount_percent)
}

// =============================================================================
// Settlement
// =============================================================================

/// Everything `settle` needs, already resolved by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementInput {
    pub room_charge: Money,
    pub service_charge: Money,
    pub penalty: Money,
    pub deposit_paid: Money,
    /// Discount percent of a voucher that passed `check_voucher`.
    pub voucher_percent: Option<u32>,
}

/// Checkout summary returned to staff and stored on the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub room_charge: Money,
    pub service_charge: Money,
    pub penalty: Money,
    pub deposit_paid: Money,
    pub voucher_discount: Money,
    pub total_due: Money,
    /// Set when a voucher code was offered but could not be applied.
    pub voucher_warning: Option<VoucherRejection>,
}

pub fn settle(input: SettlementInput, voucher_warning: Option<VoucherRejection>) -> Settlement {
    let voucher_discount = input
        .voucher_percent
        .map(|pct| voucher_discount(pct, input.room_charge, input.service_charge))
        .unwrap_or_default();

    let total_due = (input.room_charge + input.service_charge + input.penalty
        - input.deposit_paid
        - voucher_discount)
        .floor_zero();

    Settlement {
        room_charge: input.room_charge,
        service_charge: input.service_charge,
        penalty: input.penalty,
        deposit_paid: input.deposit_paid,
        voucher_discount,
        total_due,
        voucher_warning,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
