//! # Booking Service
//!
//! Every lifecycle transition as one SQLite transaction.
//!
//! ## Shape of a Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ONE TRANSACTION                                 │
//! │                                                                         │
//! │  1. lock      UPDATE ... SET updated_at = updated_at WHERE id = ?      │
//! │               (first statement, so the write lock is held before any   │
//! │                read and concurrent writers queue on busy_timeout)       │
//! │  2. read      fetch booking / claims / session                         │
//! │  3. decide    innkeep_core::lifecycle::next_status(status, t, actor)   │
//! │  4. write     save_guarded_in(.., expected)   WHERE status = expected  │
//! │  5. record    booking_events row for email / chat collaborators        │
//! │  6. promote   waitlisted bookings that fit now (cancel, reject,        │
//! │               checkout, reschedule)                                    │
//! │                                                                         │
//! │  COMMIT, or drop the transaction and nothing happened                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A transient storage failure (lock contention past the busy timeout) is
//! retried once from step 1; anything else goes back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use innkeep_core::availability::{self, Claim, StayInterval};
use innkeep_core::lifecycle::{next_status, Transition};
use innkeep_core::pricing::{self, Settlement, SettlementInput, VoucherRejection};
use innkeep_core::qr::render_transfer_qr;
use innkeep_core::session::{is_expired, SessionPayload};
use innkeep_core::status_message::{self, StatusMessage};
use innkeep_core::validation::{
    validate_discount_percent, validate_quantity, validate_stay, validate_token,
};
use innkeep_core::{
    Actor, Booking, BookingEvent, BookingEventKind, BookingStatus, PaymentMethod,
    PaymentSessionKind, PaymentStatus, RentalMode, RoomStatus, ServiceUsage, ValidationError,
    Voucher,
};
use innkeep_db::{
    BookingRepository, CustomerRepository, Database, DbError, EventRepository, RoomRepository,
    ServiceRepository, SessionRepository, VoucherRepository,
};

use crate::clock::Clock;
use crate::config::HotelConfig;
use crate::error::{EngineError, EngineResult};
use crate::session::PaymentSessionStore;

const VOUCHER_CODE_ATTEMPTS: usize = 3;

// =============================================================================
// Requests & Results
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer_id: String,
    pub room_id: String,
    pub rental_mode: RentalMode,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: DateTime<Utc>,
    /// Accept a waitlisted booking when the room is taken (the default).
    /// When false the request fails with `Conflict` instead.
    #[serde(default = "default_waitlist")]
    pub waitlist_if_full: bool,
}

fn default_waitlist() -> bool {
    true
}

impl BookingRequest {
    pub fn new(
        customer_id: impl Into<String>,
        room_id: impl Into<String>,
        rental_mode: RentalMode,
        check_in_at: DateTime<Utc>,
        check_out_at: DateTime<Utc>,
    ) -> Self {
        BookingRequest {
            customer_id: customer_id.into(),
            room_id: room_id.into(),
            rental_mode,
            check_in_at,
            check_out_at,
            waitlist_if_full: default_waitlist(),
        }
    }

    /// Fail with `Conflict` rather than joining the waitlist.
    pub fn without_waitlist(mut self) -> Self {
        self.waitlist_if_full = false;
        self
    }
}

/// What the customer needs to pay a deposit.
#[derive(Debug, Clone, Serialize)]
pub struct DepositSession {
    pub token: String,
    pub payload: SessionPayload,
    pub booking: Booking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method: PaymentMethod,
    pub voucher_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub booking: Booking,
    pub settlement: Settlement,
}

// =============================================================================
// Booking Service
// =============================================================================

/// The booking state machine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BookingService {
    db: Database,
    config: Arc<HotelConfig>,
    clock: Arc<dyn Clock>,
    sessions: PaymentSessionStore,
}

impl BookingService {
    pub fn new(db: Database, config: Arc<HotelConfig>, clock: Arc<dyn Clock>) -> Self {
        let sessions = PaymentSessionStore::new(db.clone(), clock.clone(), config.session_ttl());
        BookingService {
            db,
            config,
            clock,
            sessions,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &HotelConfig {
        &self.config
    }

    pub fn sessions(&self) -> &PaymentSessionStore {
        &self.sessions
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Availability & Creation
    // =========================================================================

    /// `true` iff no blocking booking on the room overlaps `[start, end)`.
    pub async fn is_available(
        &self,
        room_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding_booking: Option<&str>,
    ) -> EngineResult<bool> {
        let interval = StayInterval::new(start, end)?;
        let mut conn = self.db.pool().acquire().await?;
        let claims = claims_in(&mut conn, room_id).await?;
        Ok(availability::is_available(
            &claims,
            room_id,
            &interval,
            excluding_booking,
        ))
    }

    /// Creates a booking, `pending_confirmation` when the room is free and
    /// `waitlisted` when it is not (if the request allows it).
    pub async fn request_booking(
        &self,
        request: &BookingRequest,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        retry_once("request_booking", move || {
            self.request_booking_once(request, actor)
        })
        .await
    }

    async fn request_booking_once(
        &self,
        request: &BookingRequest,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        match actor {
            Actor::Customer { customer_id } if *customer_id != request.customer_id => {
                return Err(EngineError::not_permitted(
                    actor.label(),
                    "book for another customer",
                ));
            }
            Actor::System => {
                return Err(EngineError::not_permitted(actor.label(), "request a booking"));
            }
            _ => {}
        }
        let interval = validate_stay(
            request.rental_mode,
            request.check_in_at,
            request.check_out_at,
        )?;
        let now = self.clock.now();
        let policy = self.config.policy();

        let mut tx = self.db.begin().await?;
        RoomRepository::lock_in(&mut tx, &request.room_id).await?;
        CustomerRepository::get_in(&mut tx, &request.customer_id).await?;
        let room_type = RoomRepository::room_type_for_room_in(&mut tx, &request.room_id).await?;
        let claims = claims_in(&mut tx, &request.room_id).await?;

        let status = match availability::first_conflict(&claims, &request.room_id, &interval, None)
        {
            None => BookingStatus::PendingConfirmation,
            Some(_) if request.waitlist_if_full => BookingStatus::Waitlisted,
            Some(claim) => {
                return Err(EngineError::Conflict {
                    room_id: request.room_id.clone(),
                    blocking_booking_id: claim.booking_id.clone(),
                });
            }
        };

        let charge = pricing::room_charge(
            request.rental_mode,
            &interval,
            room_type.base_price(),
            &policy,
        );
        let deposit = pricing::deposit_amount(charge.amount, &policy);

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            customer_id: request.customer_id.clone(),
            room_id: request.room_id.clone(),
            staff_id: actor.staff_id().map(str::to_string),
            rental_mode: request.rental_mode,
            check_in_at: interval.start(),
            check_out_at: interval.end(),
            actual_check_in_at: None,
            actual_check_out_at: None,
            units: charge.units,
            status,
            chat_token: Uuid::new_v4().to_string(),
            payment_token: None,
            deposit_amount: deposit.dong(),
            penalty_amount: 0,
            room_charge: charge.amount.dong(),
            service_charge: 0,
            total_due: charge.amount.dong(),
            payment_method: None,
            deposit_method: None,
            deposit_confirmed: false,
            voucher_id: None,
            auto_confirmed_at: None,
            created_at: now,
            updated_at: now,
        };

        BookingRepository::insert_in(&mut tx, &booking).await?;
        let kind = match status {
            BookingStatus::Waitlisted => BookingEventKind::Waitlisted,
            _ => BookingEventKind::Created,
        };
        append_event(
            &mut tx,
            &booking,
            kind,
            json!({ "actor": actor.to_string(), "deposit_amount": deposit.dong() }),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            room_id = %booking.room_id,
            status = %booking.status,
            "Booking requested"
        );
        Ok(booking)
    }

    // =========================================================================
    // Deposit
    // =========================================================================

    /// Starts a deposit payment.
    ///
    /// - Cash: staff takes the money, so the booking is confirmed in the
    ///   same transaction and the session is stored already consumed.
    /// - QR transfer: opens a session, renders the transfer QR and attaches
    ///   the token to the booking. Any earlier session is discarded.
    pub async fn open_deposit_session(
        &self,
        booking_id: &str,
        method: PaymentMethod,
        actor: &Actor,
    ) -> EngineResult<DepositSession> {
        retry_once("open_deposit_session", move || {
            self.open_deposit_session_once(booking_id, method, actor)
        })
        .await
    }

    async fn open_deposit_session_once(
        &self,
        booking_id: &str,
        method: PaymentMethod,
        actor: &Actor,
    ) -> EngineResult<DepositSession> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        ensure_owner(actor, &booking, "pay a deposit for")?;
        next_status(booking.status, Transition::OpenDeposit, actor)?;
        if method == PaymentMethod::Cash && !matches!(actor, Actor::Staff { .. }) {
            return Err(EngineError::not_permitted(
                actor.label(),
                "record a cash deposit",
            ));
        }

        if let Some(previous) = booking.payment_token.take() {
            SessionRepository::delete_in(&mut tx, &previous).await?;
            debug!(booking_id = %booking.id, "Previous deposit session discarded");
        }

        let token = PaymentSessionStore::new_token();
        let deposit = booking.deposit();
        booking.deposit_method = Some(method);

        let payload = match method {
            PaymentMethod::Cash => {
                let payload = SessionPayload {
                    booking_id: booking.id.clone(),
                    method,
                    amount: deposit,
                    transfer: None,
                };
                PaymentSessionStore::open_in(
                    &mut tx,
                    &token,
                    PaymentSessionKind::DepositCash,
                    &payload,
                    now,
                    true,
                )
                .await?;
                confirm_in(&mut tx, &mut booking, actor, now).await?;
                payload
            }
            PaymentMethod::QrTransfer => {
                let transfer = render_transfer_qr(&self.config.bank, deposit, &token)?;
                let payload = SessionPayload {
                    booking_id: booking.id.clone(),
                    method,
                    amount: deposit,
                    transfer: Some(transfer),
                };
                PaymentSessionStore::open_in(
                    &mut tx,
                    &token,
                    PaymentSessionKind::DepositQr,
                    &payload,
                    now,
                    false,
                )
                .await?;

                let expected = booking.status;
                booking.payment_token = Some(token.clone());
                booking.updated_at = now;
                BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
                append_event(
                    &mut tx,
                    &booking,
                    BookingEventKind::DepositSessionOpened,
                    json!({
                        "actor": actor.to_string(),
                        "method": method,
                        "amount": deposit.dong(),
                    }),
                    now,
                )
                .await?;
                payload
            }
        };

        tx.commit().await?;
        info!(booking_id = %booking.id, method = method.as_str(), "Deposit session opened");

        Ok(DepositSession {
            token,
            payload,
            booking,
        })
    }

    /// Confirms the deposit behind a payment token.
    ///
    /// Staff or system only. Confirming a booking whose deposit is already
    /// confirmed returns it unchanged.
    pub async fn confirm_deposit(&self, token: &str, actor: &Actor) -> EngineResult<Booking> {
        retry_once("confirm_deposit", move || {
            self.confirm_deposit_once(token, actor)
        })
        .await
    }

    async fn confirm_deposit_once(&self, token: &str, actor: &Actor) -> EngineResult<Booking> {
        validate_token(token)?;
        if matches!(actor, Actor::Customer { .. }) {
            return Err(EngineError::not_permitted(
                actor.label(),
                Transition::ConfirmDeposit.to_string(),
            ));
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        if !SessionRepository::lock_in(&mut tx, token).await? {
            return Err(EngineError::not_found("PaymentSession", token));
        }
        // Rolled back with everything else unless the booking confirms.
        let payload = self.sessions.consume_in(&mut tx, token, now).await?;

        BookingRepository::lock_in(&mut tx, &payload.booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, &payload.booking_id).await?;

        if booking.deposit_confirmed {
            debug!(booking_id = %booking.id, "Deposit already confirmed");
            return Ok(booking);
        }
        if booking.payment_token.as_deref() != Some(token) {
            return Err(EngineError::not_found("PaymentSession", token));
        }

        confirm_in(&mut tx, &mut booking, actor, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, actor = %actor, "Deposit confirmed");
        Ok(booking)
    }

    /// Scheduler entry point: confirms a stalled QR deposit as `system`.
    ///
    /// Eligibility is re-checked under the booking's row lock, so a booking
    /// that a human moved on since selection is left alone (`Ok(None)`).
    pub async fn auto_confirm(&self, booking_id: &str) -> EngineResult<Option<Booking>> {
        retry_once("auto_confirm", move || self.auto_confirm_once(booking_id)).await
    }

    async fn auto_confirm_once(&self, booking_id: &str) -> EngineResult<Option<Booking>> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        if !self.auto_confirm_eligible(&mut tx, &booking, now).await? {
            debug!(
                booking_id = %booking.id,
                status = %booking.status,
                "No longer eligible for auto-confirmation"
            );
            return Ok(None);
        }

        if let Some(token) = booking.payment_token.as_deref() {
            SessionRepository::delete_in(&mut tx, token).await?;
        }
        confirm_in(&mut tx, &mut booking, &Actor::System, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, "Deposit auto-confirmed");
        Ok(Some(booking))
    }

    async fn auto_confirm_eligible(
        &self,
        conn: &mut SqliteConnection,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        if booking.status != BookingStatus::PendingConfirmation
            || booking.deposit_confirmed
            || booking.deposit_method != Some(PaymentMethod::QrTransfer)
            || now - booking.created_at < self.config.auto_confirm_grace()
        {
            return Ok(false);
        }
        let Some(token) = booking.payment_token.as_deref() else {
            return Ok(false);
        };
        let eligible = match SessionRepository::get_in(conn, token).await? {
            None => true,
            Some(session) => {
                session.consumed_at.is_none()
                    && is_expired(session.created_at, now, self.sessions.ttl())
            }
        };
        Ok(eligible)
    }

    /// Staff declines the deposit evidence. The booking is cancelled and
    /// the room goes to the waitlist.
    pub async fn reject_deposit(
        &self,
        booking_id: &str,
        reason: &str,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        retry_once("reject_deposit", move || {
            self.reject_deposit_once(booking_id, reason, actor)
        })
        .await
    }

    async fn reject_deposit_once(
        &self,
        booking_id: &str,
        reason: &str,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        let expected = booking.status;
        booking.status = next_status(expected, Transition::RejectDeposit, actor)?;
        if let Some(token) = booking.payment_token.take() {
            SessionRepository::delete_in(&mut tx, &token).await?;
        }
        stamp_staff(&mut booking, actor);
        booking.updated_at = now;

        BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
        append_event(
            &mut tx,
            &booking,
            BookingEventKind::DepositRejected,
            json!({ "actor": actor.to_string(), "reason": reason.trim() }),
            now,
        )
        .await?;
        let promoted = promote_waitlist_in(&mut tx, &booking.room_id, now).await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, promoted = promoted.len(), "Deposit rejected");
        Ok(booking)
    }

    // =========================================================================
    // Stay
    // =========================================================================

    pub async fn check_in(&self, booking_id: &str, actor: &Actor) -> EngineResult<Booking> {
        retry_once("check_in", move || self.check_in_once(booking_id, actor)).await
    }

    async fn check_in_once(&self, booking_id: &str, actor: &Actor) -> EngineResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        let expected = booking.status;
        booking.status = next_status(expected, Transition::CheckIn, actor)?;
        booking.actual_check_in_at = Some(now);
        stamp_staff(&mut booking, actor);
        booking.updated_at = now;

        BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
        RoomRepository::set_status_in(&mut tx, &booking.room_id, RoomStatus::Occupied, now).await?;
        append_event(
            &mut tx,
            &booking,
            BookingEventKind::CheckedIn,
            json!({ "actor": actor.to_string() }),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(booking_id = %booking.id, room_id = %booking.room_id, "Guest checked in");
        Ok(booking)
    }

    /// Settles the stay and frees the room.
    ///
    /// Unpaid services are marked paid and the voucher (if any) consumed in
    /// the same transaction. A voucher that cannot be applied leaves the
    /// checkout intact and shows up as `settlement.voucher_warning`.
    pub async fn check_out(
        &self,
        booking_id: &str,
        request: &CheckoutRequest,
        actor: &Actor,
    ) -> EngineResult<Checkout> {
        retry_once("check_out", move || {
            self.check_out_once(booking_id, request, actor)
        })
        .await
    }

    async fn check_out_once(
        &self,
        booking_id: &str,
        request: &CheckoutRequest,
        actor: &Actor,
    ) -> EngineResult<Checkout> {
        let now = self.clock.now();
        let policy = self.config.policy();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        let expected = booking.status;
        let next = next_status(expected, Transition::CheckOut, actor)?;

        let code = request
            .voucher_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase);

        let (voucher_percent, voucher_warning) = match code {
            None => (None, None),
            Some(code) => {
                let voucher = VoucherRepository::get_by_code_in(&mut tx, &code)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Voucher", &code))?;
                match redeem_in(&mut tx, &voucher, &booking.customer_id, now).await? {
                    Ok(percent) => {
                        booking.voucher_id = Some(voucher.id.clone());
                        (Some(percent), None)
                    }
                    Err(rejection) => {
                        warn!(
                            booking_id = %booking.id,
                            voucher = %code,
                            reason = %rejection,
                            "Voucher not applied"
                        );
                        (None, Some(rejection))
                    }
                }
            }
        };

        let room_type = RoomRepository::room_type_for_room_in(&mut tx, &booking.room_id).await?;
        let usages = ServiceRepository::usages_for_booking_in(&mut tx, &booking.id).await?;
        let service_charge = pricing::service_charge(&usages);
        let penalty =
            pricing::late_penalty(booking.check_out_at, now, room_type.base_price(), &policy);

        let settlement = pricing::settle(
            SettlementInput {
                room_charge: booking.room_charge(),
                service_charge,
                penalty,
                deposit_paid: booking.deposit_paid(),
                voucher_percent,
            },
            voucher_warning,
        );

        ServiceRepository::mark_paid_in(&mut tx, &booking.id).await?;

        booking.status = next;
        booking.actual_check_out_at = Some(now);
        booking.penalty_amount = penalty.dong();
        booking.service_charge = service_charge.dong();
        booking.total_due = settlement.total_due.dong();
        booking.payment_method = Some(request.payment_method);
        stamp_staff(&mut booking, actor);
        booking.updated_at = now;

        BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
        RoomRepository::set_status_in(&mut tx, &booking.room_id, RoomStatus::Free, now).await?;
        append_event(
            &mut tx,
            &booking,
            BookingEventKind::CheckedOut,
            json!({
                "actor": actor.to_string(),
                "payment_method": request.payment_method,
                "total_due": settlement.total_due.dong(),
                "voucher_warning": settlement.voucher_warning,
            }),
            now,
        )
        .await?;
        let promoted = promote_waitlist_in(&mut tx, &booking.room_id, now).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            total_due = settlement.total_due.dong(),
            promoted = promoted.len(),
            "Guest checked out"
        );
        Ok(Checkout {
            booking,
            settlement,
        })
    }

    /// Cancels a booking. Customers may only cancel their own pending ones.
    pub async fn cancel(&self, booking_id: &str, actor: &Actor) -> EngineResult<Booking> {
        retry_once("cancel", move || self.cancel_once(booking_id, actor)).await
    }

    async fn cancel_once(&self, booking_id: &str, actor: &Actor) -> EngineResult<Booking> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        ensure_owner(actor, &booking, "cancel")?;
        let expected = booking.status;
        booking.status = next_status(expected, Transition::Cancel, actor)?;
        if let Some(token) = booking.payment_token.take() {
            SessionRepository::delete_in(&mut tx, &token).await?;
        }
        stamp_staff(&mut booking, actor);
        booking.updated_at = now;

        BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
        if expected == BookingStatus::CheckedIn {
            RoomRepository::set_status_in(&mut tx, &booking.room_id, RoomStatus::Free, now)
                .await?;
        }
        append_event(
            &mut tx,
            &booking,
            BookingEventKind::Cancelled,
            json!({ "actor": actor.to_string(), "previous_status": expected }),
            now,
        )
        .await?;

        let promoted = if expected.is_blocking() {
            promote_waitlist_in(&mut tx, &booking.room_id, now).await?
        } else {
            Vec::new()
        };
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            actor = %actor,
            promoted = promoted.len(),
            "Booking cancelled"
        );
        Ok(booking)
    }

    /// Moves a booking to a new interval on the same room.
    ///
    /// A holding booking that no longer fits fails with `Conflict`; a
    /// waitlisted one that now fits is promoted. An open QR session is
    /// dropped because its amount may be stale.
    pub async fn reschedule(
        &self,
        booking_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        retry_once("reschedule", move || {
            self.reschedule_once(booking_id, start, end, actor)
        })
        .await
    }

    async fn reschedule_once(
        &self,
        booking_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor: &Actor,
    ) -> EngineResult<Booking> {
        let now = self.clock.now();
        let policy = self.config.policy();
        let mut tx = self.db.begin().await?;
        BookingRepository::lock_in(&mut tx, booking_id).await?;
        let mut booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;

        let expected = booking.status;
        let mut next = next_status(expected, Transition::Reschedule, actor)?;
        let interval = validate_stay(booking.rental_mode, start, end)?;

        let room_type = RoomRepository::room_type_for_room_in(&mut tx, &booking.room_id).await?;
        let claims = claims_in(&mut tx, &booking.room_id).await?;
        let conflict = availability::first_conflict(
            &claims,
            &booking.room_id,
            &interval,
            Some(booking.id.as_str()),
        );

        match (expected, conflict) {
            (BookingStatus::Waitlisted, None) => {
                next = next_status(expected, Transition::Promote, &Actor::System)?;
            }
            (BookingStatus::Waitlisted, Some(_)) => {}
            (_, Some(claim)) => {
                return Err(EngineError::Conflict {
                    room_id: booking.room_id.clone(),
                    blocking_booking_id: claim.booking_id.clone(),
                });
            }
            (_, None) => {}
        }

        let charge = pricing::room_charge(
            booking.rental_mode,
            &interval,
            room_type.base_price(),
            &policy,
        );
        booking.check_in_at = interval.start();
        booking.check_out_at = interval.end();
        booking.units = charge.units;
        booking.room_charge = charge.amount.dong();
        booking.total_due = charge.amount.dong();
        if !booking.deposit_confirmed {
            booking.deposit_amount = pricing::deposit_amount(charge.amount, &policy).dong();
            if let Some(token) = booking.payment_token.take() {
                SessionRepository::delete_in(&mut tx, &token).await?;
            }
        }
        booking.status = next;
        stamp_staff(&mut booking, actor);
        booking.updated_at = now;

        BookingRepository::save_guarded_in(&mut tx, &booking, expected).await?;
        append_event(
            &mut tx,
            &booking,
            BookingEventKind::Rescheduled,
            json!({
                "actor": actor.to_string(),
                "check_in_at": booking.check_in_at,
                "check_out_at": booking.check_out_at,
                "room_charge": booking.room_charge,
            }),
            now,
        )
        .await?;
        if next != expected {
            append_event(
                &mut tx,
                &booking,
                BookingEventKind::Promoted,
                json!({ "actor": Actor::System.to_string() }),
                now,
            )
            .await?;
        }
        if expected.is_blocking() {
            promote_waitlist_in(&mut tx, &booking.room_id, now).await?;
        }
        tx.commit().await?;

        info!(booking_id = %booking.id, status = %booking.status, "Booking rescheduled");
        Ok(booking)
    }

    // =========================================================================
    // Services & Vouchers
    // =========================================================================

    /// Records consumption of a catalog item during a stay. Staff only.
    pub async fn record_service_usage(
        &self,
        booking_id: &str,
        service_item_id: &str,
        quantity: i64,
        actor: &Actor,
    ) -> EngineResult<ServiceUsage> {
        if !matches!(actor, Actor::Staff { .. }) {
            return Err(EngineError::not_permitted(
                actor.label(),
                "record service usage",
            ));
        }
        validate_quantity(quantity)?;

        retry_once("record_service_usage", move || async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;
            BookingRepository::lock_in(&mut tx, booking_id).await?;
            let booking = BookingRepository::fetch_in(&mut tx, booking_id).await?;
            if booking.status != BookingStatus::CheckedIn {
                return Err(EngineError::InvalidTransition {
                    status: booking.status,
                    action: "record service usage on".to_string(),
                });
            }
            let item = ServiceRepository::get_item_in(&mut tx, service_item_id).await?;
            let usage =
                ServiceRepository::record_usage_in(&mut tx, &booking.id, &item, quantity, now)
                    .await?;
            tx.commit().await?;
            Ok(usage)
        })
        .await
    }

    /// Issues a single-use voucher (`VC` + 8 hex digits). Staff only.
    pub async fn issue_voucher(
        &self,
        customer_id: &str,
        discount_percent: i64,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> EngineResult<Voucher> {
        if !matches!(actor, Actor::Staff { .. }) {
            return Err(EngineError::not_permitted(actor.label(), "issue vouchers"));
        }
        validate_discount_percent(discount_percent)?;
        let now = self.clock.now();
        if matches!(expires_at, Some(expiry) if expiry <= now) {
            return Err(ValidationError::InvalidFormat {
                field: "expires_at".to_string(),
                reason: "must be in the future".to_string(),
            }
            .into());
        }
        if self.db.customers().get_by_id(customer_id).await?.is_none() {
            return Err(EngineError::not_found("Customer", customer_id));
        }

        let vouchers = self.db.vouchers();
        for attempt in 1..=VOUCHER_CODE_ATTEMPTS {
            let code = new_voucher_code();
            match vouchers
                .insert(&code, customer_id, discount_percent, expires_at, now)
                .await
            {
                Ok(voucher) => {
                    info!(customer_id = %customer_id, discount_percent, "Voucher issued");
                    return Ok(voucher);
                }
                Err(DbError::UniqueViolation { .. }) => {
                    debug!(attempt, "Voucher code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Database(DbError::Internal(
            "could not generate a unique voucher code".to_string(),
        )))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_booking(&self, booking_id: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_id(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", booking_id))
    }

    pub async fn get_booking_by_chat_token(&self, chat_token: &str) -> EngineResult<Booking> {
        self.db
            .bookings()
            .get_by_chat_token(chat_token)
            .await?
            .ok_or_else(|| EngineError::not_found("Booking", chat_token))
    }

    pub fn get_status_message(&self, status: BookingStatus) -> StatusMessage {
        status_message::status_message(status)
    }

    /// Accepts persisted labels and the `waiting` alias.
    pub fn get_status_message_for_label(&self, label: &str) -> Option<StatusMessage> {
        status_message::status_message_for_label(label)
    }

    pub async fn payment_status(&self, token: &str) -> EngineResult<PaymentStatus> {
        self.sessions.status(token).await
    }

    /// Undelivered state-change events, oldest first.
    pub async fn pending_events(&self, limit: u32) -> EngineResult<Vec<BookingEvent>> {
        Ok(self.db.events().get_pending(limit).await?)
    }

    pub async fn mark_event_delivered(&self, event_id: i64) -> EngineResult<()> {
        Ok(self
            .db
            .events()
            .mark_delivered(event_id, self.clock.now())
            .await?)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn retry_once<T, F, Fut>(operation: &'static str, mut attempt: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    match attempt().await {
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Transient storage failure, retrying once");
            attempt().await
        }
        result => result,
    }
}

async fn claims_in(conn: &mut SqliteConnection, room_id: &str) -> EngineResult<Vec<Claim>> {
    let holding = BookingRepository::blocking_for_room_in(conn, room_id).await?;
    let claims = holding
        .iter()
        .map(Claim::from_booking)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(claims)
}

/// Applies the confirm-deposit transition to a locked booking.
async fn confirm_in(
    conn: &mut SqliteConnection,
    booking: &mut Booking,
    actor: &Actor,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let expected = booking.status;
    booking.status = next_status(expected, Transition::ConfirmDeposit, actor)?;
    booking.deposit_confirmed = true;
    booking.payment_token = None;
    if matches!(actor, Actor::System) {
        booking.auto_confirmed_at = Some(now);
    }
    stamp_staff(booking, actor);
    booking.updated_at = now;

    BookingRepository::save_guarded_in(conn, booking, expected).await?;
    append_event(
        conn,
        booking,
        BookingEventKind::DepositConfirmed,
        json!({
            "actor": actor.to_string(),
            "auto": booking.is_auto_confirmed(),
            "method": booking.deposit_method,
            "deposit_amount": booking.deposit_amount,
        }),
        now,
    )
    .await
}

/// Promotes waitlisted bookings on the room that fit now, earliest first.
async fn promote_waitlist_in(
    conn: &mut SqliteConnection,
    room_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<Vec<Booking>> {
    let waiting = BookingRepository::waitlisted_for_room_in(conn, room_id).await?;
    if waiting.is_empty() {
        return Ok(Vec::new());
    }

    let mut claims = claims_in(conn, room_id).await?;
    let mut promoted = Vec::new();
    for mut candidate in waiting {
        let interval = StayInterval::new(candidate.check_in_at, candidate.check_out_at)?;
        if !availability::is_available(&claims, room_id, &interval, None) {
            continue;
        }

        let expected = candidate.status;
        candidate.status = next_status(expected, Transition::Promote, &Actor::System)?;
        candidate.updated_at = now;
        BookingRepository::save_guarded_in(conn, &candidate, expected).await?;
        append_event(
            conn,
            &candidate,
            BookingEventKind::Promoted,
            json!({ "actor": Actor::System.to_string() }),
            now,
        )
        .await?;

        info!(booking_id = %candidate.id, room_id = %room_id, "Promoted from waitlist");
        claims.push(Claim::from_booking(&candidate)?);
        promoted.push(candidate);
    }
    Ok(promoted)
}

/// Checks and consumes a voucher. The outer `Err` is a storage failure, the
/// inner one a reason to skip the discount.
async fn redeem_in(
    conn: &mut SqliteConnection,
    voucher: &Voucher,
    customer_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<Result<u32, VoucherRejection>> {
    if let Err(rejection) = pricing::check_voucher(voucher, customer_id, now) {
        return Ok(Err(rejection));
    }
    match VoucherRepository::consume_in(conn, &voucher.id, now).await {
        Ok(()) => Ok(Ok(voucher.discount_percent.clamp(0, 100) as u32)),
        Err(DbError::StaleState { .. }) => Ok(Err(VoucherRejection::AlreadyUsed)),
        Err(e) => Err(e.into()),
    }
}

/// Event payload: identifiers collaborators always need, plus `extra`.
async fn append_event(
    conn: &mut SqliteConnection,
    booking: &Booking,
    kind: BookingEventKind,
    extra: serde_json::Value,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut payload = json!({
        "chat_token": booking.chat_token,
        "customer_id": booking.customer_id,
        "room_id": booking.room_id,
        "status": booking.status,
    });
    if let (Some(base), serde_json::Value::Object(extra)) = (payload.as_object_mut(), extra) {
        base.extend(extra);
    }
    EventRepository::append_in(conn, &booking.id, kind, &payload, now).await?;
    Ok(())
}

fn ensure_owner(actor: &Actor, booking: &Booking, action: &str) -> EngineResult<()> {
    match actor {
        Actor::Customer { customer_id } if *customer_id != booking.customer_id => Err(
            EngineError::not_permitted(actor.label(), format!("{} another customer's booking", action)),
        ),
        _ => Ok(()),
    }
}

/// First staff member to touch the booking is recorded on it.
fn stamp_staff(booking: &mut Booking, actor: &Actor) {
    if booking.staff_id.is_none() {
        booking.staff_id = actor.staff_id().map(str::to_string);
    }
}

fn new_voucher_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("VC{}", hex[..8].to_uppercase())
}
