//! End-to-end booking lifecycle against an in-memory database.

mod common;

use chrono::Duration;
use common::{day, Harness};
use innkeep_core::pricing::VoucherRejection;
use innkeep_core::{
    BookingEventKind, BookingStatus, Money, PaymentMethod, PaymentStatus, RentalMode, RoomStatus,
};
use innkeep_engine::{CheckoutRequest, EngineError};

// =============================================================================
// Full stay
// =============================================================================

#[tokio::test]
async fn test_qr_deposit_stay_and_late_checkout() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    assert_eq!(booking.status, BookingStatus::PendingConfirmation);
    assert_eq!(booking.room_charge, 1_000_000);
    assert_eq!(booking.deposit_amount, 300_000);
    assert_eq!(booking.chat_token.len(), 36);

    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();
    assert_eq!(session.token.len(), 32);
    assert_eq!(session.payload.amount, Money::from_dong(300_000));
    let transfer = session.payload.transfer.as_ref().unwrap();
    assert!(transfer.reference.contains(&session.token));
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Pending
    );

    h.clock.advance(Duration::minutes(2));
    let confirmed = h
        .service
        .confirm_deposit(&session.token, &h.staff)
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.deposit_confirmed);
    assert!(!confirmed.is_auto_confirmed());
    assert_eq!(confirmed.staff_id.as_deref(), Some("staff-1"));
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Completed
    );

    h.clock.set(day(0));
    let checked_in = h.service.check_in(&booking.id, &h.staff).await.unwrap();
    assert_eq!(checked_in.status, BookingStatus::CheckedIn);
    let room = h.service.database().rooms().get_room(&h.room.id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::Occupied);

    let water = h.add_service_item("Water", 20_000).await;
    h.service
        .record_service_usage(&booking.id, &water.id, 2, &h.staff)
        .await
        .unwrap();

    // 90 minutes late: two started hours at 20% of the nightly rate.
    h.clock.set(day(2) + Duration::minutes(90));
    let checkout = h
        .service
        .check_out(
            &booking.id,
            &CheckoutRequest {
                payment_method: PaymentMethod::Cash,
                voucher_code: None,
            },
            &h.staff,
        )
        .await
        .unwrap();

    let s = &checkout.settlement;
    assert_eq!(s.room_charge.dong(), 1_000_000);
    assert_eq!(s.service_charge.dong(), 40_000);
    assert_eq!(s.penalty.dong(), 200_000);
    assert_eq!(s.deposit_paid.dong(), 300_000);
    assert_eq!(s.total_due.dong(), 940_000);
    assert_eq!(checkout.booking.status, BookingStatus::Paid);
    assert_eq!(checkout.booking.total_due, 940_000);

    let room = h.service.database().rooms().get_room(&h.room.id).await.unwrap().unwrap();
    assert_eq!(room.status, RoomStatus::Free);

    assert_eq!(
        h.event_kinds(&booking.id).await,
        vec![
            BookingEventKind::Created,
            BookingEventKind::DepositSessionOpened,
            BookingEventKind::DepositConfirmed,
            BookingEventKind::CheckedIn,
            BookingEventKind::CheckedOut,
        ]
    );
}

#[tokio::test]
async fn test_cash_deposit_confirms_immediately_for_staff_only() {
    let h = Harness::new().await;
    let booking = h.book(0).await;

    let err = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::Cash, &h.guest)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotPermitted { actor: "customer", .. }));

    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::Cash, &h.staff)
        .await
        .unwrap();
    assert!(session.payload.transfer.is_none());
    assert_eq!(session.booking.status, BookingStatus::Confirmed);
    assert_eq!(session.booking.deposit_method, Some(PaymentMethod::Cash));
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Completed
    );
}

// =============================================================================
// Availability & Waitlist
// =============================================================================

#[tokio::test]
async fn test_overlap_conflicts_and_waitlist_promotes_on_cancel() {
    let h = Harness::new().await;
    let first = h.book(0).await;

    let overlapping = h.request(day(1), day(3));
    let err = h
        .service
        .request_booking(&overlapping, &h.guest)
        .await
        .unwrap_err();
    match err {
        EngineError::Conflict {
            blocking_booking_id,
            ..
        } => assert_eq!(blocking_booking_id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }

    let waiting = h
        .service
        .request_booking(
            &innkeep_engine::BookingRequest {
                waitlist_if_full: true,
                ..overlapping
            },
            &h.guest,
        )
        .await
        .unwrap();
    assert_eq!(waiting.status, BookingStatus::Waitlisted);

    let cancelled = h.service.cancel(&first.id, &h.guest).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let promoted = h.service.get_booking(&waiting.id).await.unwrap();
    assert_eq!(promoted.status, BookingStatus::PendingConfirmation);
    assert_eq!(
        h.event_kinds(&waiting.id).await,
        vec![BookingEventKind::Waitlisted, BookingEventKind::Promoted]
    );
}

#[tokio::test]
async fn test_back_to_back_stays_do_not_conflict() {
    let h = Harness::new().await;
    let first = h.book(0).await;
    assert!(
        h.service
            .is_available(&h.room.id, day(2), day(4), None)
            .await
            .unwrap()
    );
    assert!(
        !h.service
            .is_available(&h.room.id, day(1), day(4), None)
            .await
            .unwrap()
    );
    assert!(
        h.service
            .is_available(&h.room.id, day(1), day(4), Some(first.id.as_str()))
            .await
            .unwrap()
    );

    let second = h.book(2).await;
    assert_eq!(second.status, BookingStatus::PendingConfirmation);
}

#[tokio::test]
async fn test_reschedule_into_taken_interval_conflicts() {
    let h = Harness::new().await;
    let first = h.book(0).await;
    let second = h.book(4).await;

    let err = h
        .service
        .reschedule(&second.id, day(1), day(3), &h.staff)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));

    let moved = h
        .service
        .reschedule(&second.id, day(2), day(5), &h.staff)
        .await
        .unwrap();
    assert_eq!(moved.room_charge, 1_500_000);
    assert_eq!(moved.deposit_amount, 450_000);

    // Customers cannot move stays.
    let err = h
        .service
        .reschedule(&first.id, day(10), day(11), &h.guest)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotPermitted { .. }));
}

// =============================================================================
// Deposits & Sessions
// =============================================================================

#[tokio::test]
async fn test_confirm_after_ttl_is_not_found() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(300));
    let err = h
        .service
        .confirm_deposit(&session.token, &h.staff)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Expired
    );

    let unchanged = h.service.get_booking(&booking.id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::PendingConfirmation);
}

#[tokio::test]
async fn test_taken_room_waitlists_by_default() {
    let h = Harness::new().await;
    h.book(0).await;

    let request = innkeep_engine::BookingRequest::new(
        &h.customer.id,
        &h.room.id,
        RentalMode::ByDay,
        day(1),
        day(3),
    );
    let waiting = h.service.request_booking(&request, &h.guest).await.unwrap();
    assert_eq!(waiting.status, BookingStatus::Waitlisted);
}

#[tokio::test]
async fn test_completed_poll_means_booking_confirmed() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();

    let refused = h.service.confirm_deposit(&session.token, &h.guest).await;
    assert!(matches!(refused, Err(EngineError::NotPermitted { .. })));
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Pending
    );

    h.service.confirm_deposit(&session.token, &h.staff).await.unwrap();
    assert_eq!(
        h.service.payment_status(&session.token).await.unwrap(),
        PaymentStatus::Completed
    );
    let confirmed = h.service.get_booking(&booking.id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.deposit_confirmed);
}

#[tokio::test]
async fn test_confirm_twice_returns_same_booking() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();

    let first = h.service.confirm_deposit(&session.token, &h.staff).await.unwrap();
    h.clock.advance(Duration::seconds(30));
    let second = h.service.confirm_deposit(&session.token, &h.staff).await.unwrap();
    assert_eq!(first.status, BookingStatus::Confirmed);
    assert_eq!(second.status, BookingStatus::Confirmed);
    assert_eq!(first.updated_at, second.updated_at);

    let confirmations = h
        .event_kinds(&booking.id)
        .await
        .into_iter()
        .filter(|k| *k == BookingEventKind::DepositConfirmed)
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_customer_cannot_confirm_own_deposit() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let session = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();

    let err = h
        .service
        .confirm_deposit(&session.token, &h.guest)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotPermitted { actor: "customer", .. }));
}

#[tokio::test]
async fn test_reopening_deposit_discards_previous_session() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let first = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();
    let second = h
        .service
        .open_deposit_session(&booking.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();

    assert_ne!(first.token, second.token);
    assert_eq!(
        h.service.payment_status(&first.token).await.unwrap(),
        PaymentStatus::Invalid
    );
    assert!(h
        .service
        .confirm_deposit(&first.token, &h.staff)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_reject_deposit_cancels_and_promotes() {
    let h = Harness::new().await;
    let first = h.book(0).await;
    let waiting = h
        .service
        .request_booking(
            &innkeep_engine::BookingRequest {
                waitlist_if_full: true,
                ..h.request(day(0), day(2))
            },
            &h.guest,
        )
        .await
        .unwrap();

    let rejected = h
        .service
        .reject_deposit(&first.id, "transfer never arrived", &h.staff)
        .await
        .unwrap();
    assert_eq!(rejected.status, BookingStatus::Cancelled);
    assert_eq!(
        h.service.get_booking(&waiting.id).await.unwrap().status,
        BookingStatus::PendingConfirmation
    );
}

// =============================================================================
// Permissions & Invalid Transitions
// =============================================================================

#[tokio::test]
async fn test_customer_cancels_only_pending_bookings() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    h.service
        .open_deposit_session(&booking.id, PaymentMethod::Cash, &h.staff)
        .await
        .unwrap();

    let err = h.service.cancel(&booking.id, &h.guest).await.unwrap_err();
    assert!(matches!(err, EngineError::NotPermitted { .. }));

    let stranger = h.add_customer("001099012345").await;
    let other = h.book(5).await;
    let err = h
        .service
        .cancel(&other.id, &innkeep_core::Actor::customer(stranger.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotPermitted { .. }));
}

#[tokio::test]
async fn test_check_in_on_cancelled_booking_is_invalid() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    h.service.cancel(&booking.id, &h.staff).await.unwrap();

    let err = h.service.check_in(&booking.id, &h.staff).await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot check in a booking that is cancelled");
    assert!(h.service.get_booking("missing").await.unwrap_err().is_not_found());
}

// =============================================================================
// Vouchers
// =============================================================================

async fn stay_and_check_out(h: &Harness, offset: i64, code: &str) -> innkeep_engine::Checkout {
    let booking = h.book(offset).await;
    h.service
        .open_deposit_session(&booking.id, PaymentMethod::Cash, &h.staff)
        .await
        .unwrap();
    h.service.check_in(&booking.id, &h.staff).await.unwrap();
    h.clock.set(day(offset + 2));
    h.service
        .check_out(
            &booking.id,
            &CheckoutRequest {
                payment_method: PaymentMethod::QrTransfer,
                voucher_code: Some(code.to_string()),
            },
            &h.staff,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_voucher_discounts_once() {
    let h = Harness::new().await;
    let voucher = h
        .service
        .issue_voucher(&h.customer.id, 10, None, &h.staff)
        .await
        .unwrap();
    assert!(voucher.code.starts_with("VC"));

    let first = stay_and_check_out(&h, 0, &voucher.code.to_lowercase()).await;
    assert_eq!(first.settlement.voucher_discount.dong(), 100_000);
    assert_eq!(first.settlement.total_due.dong(), 600_000);
    assert_eq!(first.booking.voucher_id.as_deref(), Some(voucher.id.as_str()));
    assert!(first.settlement.voucher_warning.is_none());

    let second = stay_and_check_out(&h, 5, &voucher.code).await;
    assert_eq!(second.settlement.voucher_discount.dong(), 0);
    assert_eq!(second.settlement.total_due.dong(), 700_000);
    assert_eq!(
        second.settlement.voucher_warning,
        Some(VoucherRejection::AlreadyUsed)
    );
}

#[tokio::test]
async fn test_voucher_issuing_rules() {
    let h = Harness::new().await;
    assert!(matches!(
        h.service.issue_voucher(&h.customer.id, 10, None, &h.guest).await,
        Err(EngineError::NotPermitted { .. })
    ));
    assert!(matches!(
        h.service.issue_voucher(&h.customer.id, 0, None, &h.staff).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        h.service
            .issue_voucher(&h.customer.id, 10, Some(common::t0()), &h.staff)
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(h
        .service
        .issue_voucher("nobody", 10, None, &h.staff)
        .await
        .unwrap_err()
        .is_not_found());
}

// =============================================================================
// Status messages
// =============================================================================

#[tokio::test]
async fn test_status_message_by_chat_token() {
    let h = Harness::new().await;
    let booking = h.book(0).await;
    let found = h
        .service
        .get_booking_by_chat_token(&booking.chat_token)
        .await
        .unwrap();
    assert_eq!(found.id, booking.id);

    let message = h.service.get_status_message(found.status);
    assert_eq!(message.title, "Awaiting confirmation");
    assert_eq!(
        h.service.get_status_message_for_label("waiting"),
        Some(h.service.get_status_message(BookingStatus::Waitlisted))
    );
    assert!(h.service.get_status_message_for_label("bogus").is_none());
}

// =============================================================================
// Scenarios & Invariants
// =============================================================================

#[tokio::test]
async fn test_two_guests_one_room() {
    let h = Harness::new().await;
    let second_guest = h.add_customer("001099012345").await;

    // Guest one books days [D1, D3) and pays by QR.
    let first = h
        .service
        .request_booking(&h.request(day(1), day(3)), &h.guest)
        .await
        .unwrap();
    assert_eq!(first.status, BookingStatus::PendingConfirmation);
    let session = h
        .service
        .open_deposit_session(&first.id, PaymentMethod::QrTransfer, &h.guest)
        .await
        .unwrap();
    assert_eq!(session.booking.payment_token.as_deref(), Some(session.token.as_str()));
    let first = h.service.confirm_deposit(&session.token, &h.staff).await.unwrap();
    assert_eq!(first.status, BookingStatus::Confirmed);
    assert!(first.deposit_confirmed);
    assert!(first.payment_token.is_none());

    // Guest two wants [D2, D4) on the same room.
    let second = h
        .service
        .request_booking(
            &innkeep_engine::BookingRequest {
                customer_id: second_guest.id.clone(),
                waitlist_if_full: true,
                ..h.request(day(2), day(4))
            },
            &innkeep_core::Actor::customer(second_guest.id.clone()),
        )
        .await
        .unwrap();
    assert_eq!(second.status, BookingStatus::Waitlisted);

    // Guest one drops out; guest two moves up.
    h.service.cancel(&first.id, &h.staff).await.unwrap();
    let second = h.service.get_booking(&second.id).await.unwrap();
    assert_eq!(second.status, BookingStatus::PendingConfirmation);
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[tokio::test]
async fn test_holding_bookings_never_overlap() {
    let h = Harness::new().await;
    let mut rng = Lcg(0x1d2c_3b4a);
    let mut ids: Vec<String> = Vec::new();

    for _ in 0..60 {
        if ids.is_empty() || rng.next(3) > 0 {
            let start = rng.next(12) as i64;
            let nights = 1 + rng.next(3) as i64;
            let booking = h
                .service
                .request_booking(
                    &innkeep_engine::BookingRequest {
                        waitlist_if_full: true,
                        ..h.request(day(start), day(start + nights))
                    },
                    &h.guest,
                )
                .await
                .unwrap();
            ids.push(booking.id);
        } else {
            let id = &ids[rng.next(ids.len() as u64) as usize];
            // Already cancelled bookings refuse; that is fine here.
            let _ = h.service.cancel(id, &h.staff).await;
        }

        let all = h
            .service
            .database()
            .bookings()
            .list_for_room(&h.room.id)
            .await
            .unwrap();
        let holding: Vec<_> = all.iter().filter(|b| b.status.is_blocking()).collect();
        for (i, a) in holding.iter().enumerate() {
            for b in &holding[i + 1..] {
                let overlap = a.check_in_at < b.check_out_at && b.check_in_at < a.check_out_at;
                assert!(!overlap, "{} overlaps {}", a.id, b.id);
            }
        }

        // Nothing left waiting that would fit now.
        for waiting in all.iter().filter(|b| b.status == BookingStatus::Waitlisted) {
            assert!(!h
                .service
                .is_available(&h.room.id, waiting.check_in_at, waiting.check_out_at, None)
                .await
                .unwrap());
        }
    }
}
