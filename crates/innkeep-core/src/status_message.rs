//! # Status Messages
//!
//! Fixed text and severity shown next to a booking's status.
//! The UI also asks for the legacy `waiting` label, which is the same as
//! `waitlisted`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::BookingStatus;

/// Label accepted as an alias of `waitlisted`.
pub const WAITING_LABEL: &str = "waiting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

/// Static text, so this is only ever serialized outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub title: &'static str,
    pub message: &'static str,
    pub severity: Severity,
}

const fn msg(title: &'static str, message: &'static str, severity: Severity) -> StatusMessage {
    StatusMessage {
        title,
        message,
        severity,
    }
}

pub fn status_message(status: BookingStatus) -> StatusMessage {
    match status {
        BookingStatus::PendingConfirmation => msg(
            "Awaiting confirmation",
            "Your booking has been received and is waiting for deposit confirmation.",
            Severity::Warning,
        ),
        BookingStatus::Confirmed => msg(
            "Booking confirmed",
            "Your deposit has been received and the room is held for you.",
            Severity::Success,
        ),
        BookingStatus::CheckedIn => msg(
            "Checked in",
            "Welcome! You are checked in. Enjoy your stay.",
            Severity::Info,
        ),
        BookingStatus::Paid => msg(
            "Stay completed",
            "Your stay is settled. Thank you for staying with us.",
            Severity::Success,
        ),
        BookingStatus::Cancelled => msg(
            "Booking cancelled",
            "This booking has been cancelled.",
            Severity::Danger,
        ),
        BookingStatus::Waitlisted => msg(
            "On the waiting list",
            "The room is full for these dates. We will confirm as soon as it frees up.",
            Severity::Info,
        ),
    }
}

/// Lookup by persisted label, including `waiting`.
pub fn status_message_for_label(label: &str) -> Option<StatusMessage> {
    if label == WAITING_LABEL {
        return Some(status_message(BookingStatus::Waitlisted));
    }
    label.parse::<BookingStatus>().ok().map(status_message)
}
