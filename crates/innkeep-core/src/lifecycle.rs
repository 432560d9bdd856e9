//! # Booking Lifecycle
//!
//! The transition table of the booking state machine, as a pure function.
//!
//! ## Transition Table
//! ```text
//! ┌────────────────┬──────────────────────────┬──────────────┬─────────────────┐
//! │ Transition     │ From                     │ To           │ Actors          │
//! ├────────────────┼──────────────────────────┼──────────────┼─────────────────┤
//! │ OpenDeposit    │ pending_confirmation     │ (unchanged)  │ customer, staff │
//! │ ConfirmDeposit │ pending_confirmation     │ confirmed    │ staff, system   │
//! │ RejectDeposit  │ pending_confirmation     │ cancelled    │ staff           │
//! │ CheckIn        │ confirmed                │ checked_in   │ staff           │
//! │ CheckOut       │ checked_in               │ paid         │ staff           │
//! │ Cancel         │ any non-terminal         │ cancelled    │ staff, system   │
//! │                │ pending_confirmation     │ cancelled    │ customer        │
//! │ Promote        │ waitlisted               │ pending_conf │ system          │
//! │ Reschedule     │ pending, confirmed,      │ (unchanged)  │ staff           │
//! │                │ waitlisted               │              │                 │
//! └────────────────┴──────────────────────────┴──────────────┴─────────────────┘
//! ```
//!
//! A status outside the "From" column is `InvalidTransition`; a status inside
//! it with the wrong actor is `NotPermitted`. Ownership (is this customer the
//! booking's customer?) is checked by the caller, which has the booking row.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::{Actor, BookingStatus};

use BookingStatus::*;

/// A requested lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    OpenDeposit,
    ConfirmDeposit,
    RejectDeposit,
    CheckIn,
    CheckOut,
    Cancel,
    Promote,
    Reschedule,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Transition::OpenDeposit => "open a deposit session for",
            Transition::ConfirmDeposit => "confirm deposit",
            Transition::RejectDeposit => "reject deposit",
            Transition::CheckIn => "check in",
            Transition::CheckOut => "check out",
            Transition::Cancel => "cancel",
            Transition::Promote => "promote",
            Transition::Reschedule => "reschedule",
        };
        f.write_str(verb)
    }
}

impl Transition {
    /// Statuses the transition may start from, for any actor.
    pub fn sources(&self) -> &'static [BookingStatus] {
        match self {
            Transition::OpenDeposit
            | Transition::ConfirmDeposit
            | Transition::RejectDeposit => &[PendingConfirmation],
            Transition::CheckIn => &[Confirmed],
            Transition::CheckOut => &[CheckedIn],
            Transition::Cancel => &[PendingConfirmation, Confirmed, CheckedIn, Waitlisted],
            Transition::Promote => &[Waitlisted],
            Transition::Reschedule => &[PendingConfirmation, Confirmed, Waitlisted],
        }
    }

    fn permits(&self, actor: &Actor, from: BookingStatus) -> bool {
        match (self, actor) {
            (Transition::OpenDeposit, Actor::Customer { .. } | Actor::Staff { .. }) => true,
            (Transition::ConfirmDeposit, Actor::Staff { .. } | Actor::System) => true,
            (
                Transition::RejectDeposit
                | Transition::CheckIn
                | Transition::CheckOut
                | Transition::Reschedule,
                Actor::Staff { .. },
            ) => true,
            (Transition::Cancel, Actor::Staff { .. } | Actor::System) => true,
            (Transition::Cancel, Actor::Customer { .. }) => from == PendingConfirmation,
            (Transition::Promote, Actor::System) => true,
            _ => false,
        }
    }

    fn target(&self, from: BookingStatus) -> BookingStatus {
        match self {
            Transition::OpenDeposit | Transition::Reschedule => from,
            Transition::ConfirmDeposit => Confirmed,
            Transition::RejectDeposit | Transition::Cancel => Cancelled,
            Transition::CheckIn => CheckedIn,
            Transition::CheckOut => Paid,
            Transition::Promote => PendingConfirmation,
        }
    }
}

/// Computes the status after `transition`, or explains why it is refused.
///
/// ## Example
/// ```rust
/// use innkeep_core::lifecycle::{next_status, Transition};
/// use innkeep_core::{Actor, BookingStatus};
///
/// let next = next_status(BookingStatus::Confirmed, Transition::CheckIn, &Actor::staff("s1"));
/// assert_eq!(next.unwrap(), BookingStatus::CheckedIn);
///
/// let refused = next_status(BookingStatus::Cancelled, Transition::CheckIn, &Actor::staff("s1"));
/// assert!(refused.is_err());
/// ```
pub fn next_status(
    current: BookingStatus,
    transition: Transition,
    actor: &Actor,
) -> CoreResult<BookingStatus> {
    if !transition.sources().contains(&current) {
        return Err(CoreError::InvalidTransition {
            status: current,
            transition,
        });
    }
    if !transition.permits(actor, current) {
        return Err(CoreError::NotPermitted {
            actor: actor.label(),
            transition,
        });
    }
    Ok(transition.target(current))
}

// =============================================================================
// Unit Tests
// =============================================================================
