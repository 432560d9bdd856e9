//! # Money Module
//!
//! Provides the `Money` type for room charges, deposits and service totals.
//!
//! ## Integer Đồng
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The Vietnamese đồng has no minor unit in practice, so every amount    │
//! │  in the system is a whole number of đồng stored as i64.                │
//! │                                                                         │
//! │    1.200.000 ₫ × 30% = 360.000 ₫        exact                          │
//! │      333.333 ₫ × 30% =  99.999,9 ₫  →  100.000 ₫ (round half up)       │
//! │                                                                         │
//! │  Percentages are whole numbers (deposit 30, voucher 10, hourly 20).    │
//! │  The only rounding point is `Money::percent`.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use innkeep_core::money::Money;
//!
//! let nightly = Money::from_dong(500_000);
//! let stay = nightly * 2;
//! assert_eq!(stay.percent(30), Money::from_dong(300_000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole đồng.
///
/// ## Where Money is Used
/// ```text
/// RoomType.base_price ──► room_charge ──┬──► deposit (percent)
///                                       │
/// ServiceUsage.qty × unit_price ──► service_charge
///                                       │
///                                       ▼
///            room + service + penalty − deposit − voucher = total_due
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole đồng.
    ///
    /// ## Example
    /// ```rust
    /// use innkeep_core::money::Money;
    ///
    /// let price = Money::from_dong(450_000);
    /// assert_eq!(price.dong(), 450_000);
    /// ```
    #[inline]
    pub const fn from_dong(dong: i64) -> Self {
        Money(dong)
    }

    /// Returns the value in đồng.
    #[inline]
    pub const fn dong(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity (nights, hours, service units).
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Takes a whole-number percentage, rounding half up to the nearest đồng.
    ///
    /// ## Implementation
    /// `(amount * pct + 50) / 100` in i128 so large stays cannot overflow.
    /// Negative amounts round half away from zero so `(-x).percent(p)` is
    /// `-(x.percent(p))`.
    ///
    /// ## Example
    /// ```rust
    /// use innkeep_core::money::Money;
    ///
    /// assert_eq!(Money::from_dong(1_000_000).percent(10).dong(), 100_000);
    /// assert_eq!(Money::from_dong(333_333).percent(30).dong(), 100_000);
    /// assert_eq!(Money::from_dong(5).percent(50).dong(), 3);
    /// ```
    pub fn percent(&self, pct: u32) -> Money {
        let scaled = self.0.unsigned_abs() as i128 * pct as i128;
        let rounded = ((scaled + 50) / 100) as i64;
        if self.0 < 0 {
            Money(-rounded)
        } else {
            Money(rounded)
        }
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats with `.` thousands separators and a trailing ` ₫`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{} ₫", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
