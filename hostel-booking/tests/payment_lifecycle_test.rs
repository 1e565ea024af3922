use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use hostel_booking::{
    BookingRequest, BookingService, DateChange, DispatchSettings, OutboxDispatcher, PaymentOrchestrator, PaymentRequest,
    PaymentSettings, Verification,
};
use hostel_core::booking::{Booking, BookingStatus, PaymentStatus};
use hostel_core::document::{BankDetails, DocumentStatus, NewDocument};
use hostel_core::fees::FeeSchedule;
use hostel_core::listing::{Hostel, NewHostel, NewRoom, Room, RoomStatus, VerificationStatus};
use hostel_core::notification::{NotificationKind, OutboxStatus};
use hostel_core::payment::{GatewayTransactionStatus, PaymentRecordStatus};
use hostel_core::repository::{HostelRepository, RoomRepository, SettlementOutcome, StoreError};
use hostel_core::user::{Actor, Role, UserContact};
use hostel_core::CoreError;
use hostel_shared::EmailKind;
use hostel_store::memory::{FakeGateway, MemoryStore, RecordingMailer};
use rust_decimal::Decimal;
use uuid::Uuid;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn as_actor(user: &UserContact) -> Actor {
    Actor {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
    }
}

struct World {
    store: MemoryStore,
    gateway: FakeGateway,
    mailer: RecordingMailer,
    bookings: BookingService,
    payments: PaymentOrchestrator,
    landlord: UserContact,
    student: Actor,
    room: Room,
}

impl World {
    async fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let mailer = RecordingMailer::new();

        let landlord = store.insert_user("Kofi Mensah", "kofi@example.com", Role::Landlord).await;
        let student = store.insert_user("Ama Owusu", "ama@example.com", Role::Student).await;

        let mut hostel = NewHostel {
            landlord_id: landlord.id,
            name: "Unity Hall Annex".to_string(),
            location: "Ayeduase".to_string(),
            description: None,
            amenities: vec!["wifi".to_string()],
            images: vec![],
        }
        .into_hostel(Uuid::new_v4());
        hostel.verification_status = VerificationStatus::Approved;
        store.put_hostel(hostel.clone()).await;

        let room = NewRoom {
            hostel_id: hostel.id,
            room_number: "A1".to_string(),
            room_type: "2-in-1".to_string(),
            capacity: 2,
            price: d("300"),
            status: RoomStatus::Available,
        }
        .into_room(Uuid::new_v4());
        store.put_room(room.clone()).await;

        let mut document = NewDocument {
            landlord_id: landlord.id,
            hostel_id: hostel.id,
            id_document_url: "https://img.example.com/id.png".to_string(),
            property_proof_url: "https://img.example.com/deed.pdf".to_string(),
            bank: BankDetails {
                bank_name: "GCB Bank".to_string(),
                bank_code: "040".to_string(),
                account_number: "1234567890".to_string(),
                account_name: "Kofi Mensah".to_string(),
            },
        }
        .into_document(Uuid::new_v4());
        document.status = DocumentStatus::Approved;
        document.reviewed_at = Some(Utc::now());
        store.put_document(document).await;

        let shared = Arc::new(store.clone());
        let bookings = BookingService::new(shared.clone(), shared.clone(), shared.clone(), FeeSchedule::default());
        let payments = PaymentOrchestrator::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared,
            Arc::new(gateway.clone()),
            PaymentSettings::default(),
        );

        Self {
            store,
            gateway,
            mailer,
            bookings,
            payments,
            landlord,
            student: as_actor(&student),
            room,
        }
    }

    async fn another_student(&self, name: &str) -> Actor {
        let email = format!("{}@example.com", name.to_lowercase());
        as_actor(&self.store.insert_user(name, &email, Role::Student).await)
    }

    async fn book(&self, student: &Actor, start: &str, end: &str) -> Booking {
        self.bookings
            .create(
                student,
                BookingRequest {
                    room_id: Some(self.room.id),
                    hostel_id: Some(self.room.hostel_id),
                    start_date: Some(date(start)),
                    end_date: Some(date(end)),
                    hostel_fee: Some(self.room.price),
                },
            )
            .await
            .unwrap()
    }

    /// Initialises a payment and makes the gateway report it as paid.
    async fn pay(&self, student: &Actor, booking: &Booking, amount: Decimal) -> String {
        let init = self
            .payments
            .initialize(
                student,
                PaymentRequest {
                    booking_id: Some(booking.id),
                    amount: Some(amount),
                    email: None,
                    payment_method: None,
                },
            )
            .await
            .unwrap();
        let reference = init.payment.reference.clone();
        self.gateway
            .complete(&reference, GatewayTransactionStatus::Success, amount, "GHS")
            .await;
        reference
    }

    async fn admin(&self) -> Actor {
        as_actor(&self.store.insert_user("Admin", "admin@example.com", Role::Admin).await)
    }

    /// Adds a hostel owned by the same landlord with one room priced 300.
    async fn second_listing(&self, status: VerificationStatus, room_status: RoomStatus) -> (Hostel, Room) {
        let mut hostel = NewHostel {
            landlord_id: self.landlord.id,
            name: "Gaza Lodge".to_string(),
            location: "Kotei".to_string(),
            description: None,
            amenities: vec![],
            images: vec![],
        }
        .into_hostel(Uuid::new_v4());
        hostel.verification_status = status;
        self.store.put_hostel(hostel.clone()).await;

        let room = NewRoom {
            hostel_id: hostel.id,
            room_number: "B2".to_string(),
            room_type: "4-in-1".to_string(),
            capacity: 4,
            price: d("300"),
            status: room_status,
        }
        .into_room(Uuid::new_v4());
        self.store.put_room(room.clone()).await;
        (hostel, room)
    }

    fn dispatcher(&self, max_attempts: i32) -> OutboxDispatcher {
        OutboxDispatcher::new(
            Arc::new(self.store.clone()),
            Arc::new(self.mailer.clone()),
            DispatchSettings {
                max_attempts,
                ..Default::default()
            },
        )
    }
}

fn stay(room: &Room, hostel_id: Uuid, fee: Decimal) -> BookingRequest {
    BookingRequest {
        room_id: Some(room.id),
        hostel_id: Some(hostel_id),
        start_date: Some(date("2026-09-01")),
        end_date: Some(date("2026-12-15")),
        hostel_fee: Some(fee),
    }
}

fn outcome(verification: &Verification) -> SettlementOutcome {
    match verification {
        Verification::Settled(s) => s.outcome,
        Verification::AlreadyVerified(_) => SettlementOutcome::AlreadySettled,
    }
}

#[tokio::test]
async fn test_full_payment_confirms_and_second_verify_is_a_no_op() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    assert_eq!(booking.total_price, d("323.64"));

    let reference = w.pay(&w.student, &booking, booking.total_price).await;

    let first = w.payments.verify(&reference).await.unwrap();
    assert_eq!(outcome(&first), SettlementOutcome::Confirmed);

    let second = w.payments.verify(&reference).await.unwrap();
    assert!(matches!(second, Verification::AlreadyVerified(_)));

    let stored = w.store.booking(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(stored.amount_paid, booking.total_price);

    let emails = w.store.outbox().await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].message.kind, EmailKind::BookingFullyPaid);
}

#[tokio::test]
async fn test_partial_payments_accumulate() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;

    let first = w.pay(&w.student, &booking, d("100")).await;
    let settled = w.payments.verify(&first).await.unwrap();
    assert_eq!(
        outcome(&settled),
        SettlementOutcome::PartiallyPaid { remaining: d("223.64") }
    );

    let second = w.pay(&w.student, &booking, d("223.64")).await;
    let settled = w.payments.verify(&second).await.unwrap();
    assert_eq!(outcome(&settled), SettlementOutcome::Confirmed);

    let history = w.payments.history(booking.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|p| p.status == PaymentRecordStatus::Successful));
}

#[tokio::test]
async fn test_overpayment_is_rejected() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;

    let result = w
        .payments
        .initialize(
            &w.student,
            PaymentRequest {
                booking_id: Some(booking.id),
                amount: Some(d("400")),
                email: None,
                payment_method: None,
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::ValidationError(_))));
    assert!(w.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_unknown_reference_writes_nothing() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;

    let result = w.payments.verify("HSTL-0-NOTAREAL").await;
    assert!(matches!(result, Err(CoreError::VerificationFailed(_))));

    let stored = w.store.booking(booking.id).await.unwrap();
    assert_eq!(stored, booking);
    assert!(w.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_gateway_reporting_failure_leaves_payment_pending() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, booking.total_price).await;
    w.gateway
        .complete(&reference, GatewayTransactionStatus::Failed, booking.total_price, "GHS")
        .await;

    let result = w.payments.verify(&reference).await;
    assert!(matches!(result, Err(CoreError::VerificationFailed(_))));

    let stored = w.store.booking(booking.id).await.unwrap();
    assert_eq!(stored.amount_paid, Decimal::ZERO);
    assert_eq!(w.store.payments().await[0].status, PaymentRecordStatus::Pending);
}

#[tokio::test]
async fn test_second_pending_payment_is_refused_until_abandoned() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let request = PaymentRequest {
        booking_id: Some(booking.id),
        amount: Some(d("100")),
        email: None,
        payment_method: None,
    };

    let first = w.payments.initialize(&w.student, request.clone()).await.unwrap();
    match w.payments.initialize(&w.student, request.clone()).await {
        Err(CoreError::PendingPaymentExists(existing)) => assert_eq!(existing.id, first.payment.id),
        other => panic!("expected pending payment conflict, got {:?}", other.map(|i| i.payment.reference)),
    }

    w.store
        .age_payment(first.payment.id, Utc::now() - Duration::minutes(45))
        .await;
    let retry = w.payments.initialize(&w.student, request).await.unwrap();
    assert_ne!(retry.payment.id, first.payment.id);

    let payments = w.store.payments().await;
    let old = payments.iter().find(|p| p.id == first.payment.id).unwrap();
    assert_eq!(old.status, PaymentRecordStatus::Failed);
    assert_eq!(old.failure_reason.as_deref(), Some("abandoned"));
}

#[tokio::test]
async fn test_gateway_outage_fails_the_pending_row() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    w.gateway.fail_checkouts(true).await;

    let request = PaymentRequest {
        booking_id: Some(booking.id),
        amount: Some(booking.total_price),
        email: None,
        payment_method: None,
    };
    let result = w.payments.initialize(&w.student, request.clone()).await;
    assert!(matches!(result, Err(CoreError::Upstream(_))));
    assert_eq!(w.store.payments().await[0].status, PaymentRecordStatus::Failed);

    w.gateway.fail_checkouts(false).await;
    assert!(w.payments.initialize(&w.student, request).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_settlements_confirm_exactly_one() {
    let w = World::new().await;
    let other = w.another_student("Yaw").await;

    let first = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let second = w.book(&other, "2026-10-01", "2027-01-15").await;
    let ref_a = w.pay(&w.student, &first, first.total_price).await;
    let ref_b = w.pay(&other, &second, second.total_price).await;

    let (a, b) = tokio::join!(w.payments.verify(&ref_a), w.payments.verify(&ref_b));
    let outcomes = [outcome(&a.unwrap()), outcome(&b.unwrap())];

    let confirmed = outcomes.iter().filter(|o| **o == SettlementOutcome::Confirmed).count();
    let bumped = outcomes
        .iter()
        .filter(|o| matches!(o, SettlementOutcome::RoomUnavailable { .. }))
        .count();
    assert_eq!(confirmed, 1);
    assert_eq!(bumped, 1);

    let refunds = w
        .store
        .all_notifications()
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::RefundRequired)
        .count();
    assert_eq!(refunds, 2);
}

#[tokio::test]
async fn test_booking_over_confirmed_dates_is_rejected() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, booking.total_price).await;
    w.payments.verify(&reference).await.unwrap();

    let other = w.another_student("Esi").await;
    let result = w
        .bookings
        .create(
            &other,
            BookingRequest {
                room_id: Some(w.room.id),
                hostel_id: Some(w.room.hostel_id),
                // Sharing only the last day still overlaps.
                start_date: Some(date("2026-12-15")),
                end_date: Some(date("2027-03-01")),
                hostel_fee: Some(w.room.price),
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_cancel_twice_and_late_payment_flags_refund() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, booking.total_price).await;

    w.bookings.cancel(&w.student, booking.id).await.unwrap();
    let again = w.bookings.cancel(&w.student, booking.id).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));

    let settled = w.payments.verify(&reference).await.unwrap();
    assert_eq!(outcome(&settled), SettlementOutcome::NotPayable);
    assert_eq!(settled.payment().status, PaymentRecordStatus::Successful);

    let stored = w.store.booking(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.amount_paid, Decimal::ZERO);

    let landlord_refund = w
        .store
        .all_notifications()
        .await
        .into_iter()
        .any(|n| n.recipient_id == w.landlord.id && n.kind == NotificationKind::RefundRequired);
    assert!(landlord_refund);
}

#[tokio::test]
async fn test_subaccount_registered_once() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, d("50")).await;
    w.payments.verify(&reference).await.unwrap();
    w.pay(&w.student, &booking, d("50")).await;

    assert_eq!(w.gateway.subaccounts().await.len(), 1);
    let checkouts = w.gateway.checkouts().await;
    assert_eq!(checkouts.len(), 2);
    let shares = checkouts[0].split.shares;
    assert_eq!(shares.landlord_percent + shares.platform_percent, Decimal::ONE_HUNDRED);
}

#[tokio::test]
async fn test_only_owner_can_pay() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let other = w.another_student("Kwame").await;

    let result = w
        .payments
        .initialize(
            &other,
            PaymentRequest {
                booking_id: Some(booking.id),
                amount: Some(d("10")),
                email: None,
                payment_method: None,
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn test_outbox_retries_then_parks_dead_messages() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    w.bookings.cancel(&w.student, booking.id).await.unwrap();

    w.mailer.fail_next(1).await;
    let report = w.dispatcher(3).dispatch_once().await.unwrap();
    assert_eq!(report.retried, 1);

    let entry = &w.store.outbox().await[0];
    assert_eq!(entry.status, OutboxStatus::Pending);
    assert_eq!(entry.attempts, 1);
    assert!(entry.next_attempt_at > Utc::now());

    // Not due yet.
    let report = w.dispatcher(3).dispatch_once().await.unwrap();
    assert_eq!(report.delivered + report.retried + report.dead, 0);

    let other = w.another_student("Abena").await;
    let second = w.book(&other, "2027-02-01", "2027-05-01").await;
    w.bookings.cancel(&other, second.id).await.unwrap();
    w.mailer.fail_next(1).await;
    let report = w.dispatcher(1).dispatch_once().await.unwrap();
    assert_eq!(report.dead, 1);
    assert!(w.mailer.sent().await.is_empty());
}

#[tokio::test]
async fn test_outbox_delivers_cancellation_email() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    w.bookings.cancel(&w.student, booking.id).await.unwrap();

    let report = w.dispatcher(8).dispatch_once().await.unwrap();
    assert_eq!(report.delivered, 1);

    let sent = w.mailer.sent().await;
    assert_eq!(sent[0].kind, EmailKind::BookingCancelled);
    assert_eq!(sent[0].to, "ama@example.com");
    assert_eq!(w.store.outbox().await[0].status, OutboxStatus::Delivered);
}

#[tokio::test]
async fn test_booking_with_open_checkout_cannot_be_deleted() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, booking.total_price).await;

    let by_owner = w.bookings.delete(&w.student, booking.id).await;
    assert!(matches!(by_owner, Err(CoreError::Conflict(_))));
    let admin = w.admin().await;
    let by_admin = w.bookings.delete(&admin, booking.id).await;
    assert!(matches!(by_admin, Err(CoreError::Conflict(_))));

    // The charge still lands on the surviving booking.
    let settled = w.payments.verify(&reference).await.unwrap();
    assert_eq!(outcome(&settled), SettlementOutcome::Confirmed);
    assert_eq!(w.store.payments().await.len(), 1);
}

#[tokio::test]
async fn test_paid_hostel_and_room_cannot_be_deleted() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &booking, booking.total_price).await;
    w.payments.verify(&reference).await.unwrap();

    let hostel = HostelRepository::delete(&w.store, w.room.hostel_id).await;
    assert!(matches!(hostel, Err(StoreError::HasPayments("Hostel"))));
    let room = RoomRepository::delete(&w.store, w.room.id).await;
    assert!(matches!(room, Err(StoreError::HasPayments("Room"))));

    let history = w.payments.history(booking.id).await.unwrap();
    assert_eq!(history[0].status, PaymentRecordStatus::Successful);
}

#[tokio::test]
async fn test_delete_rules_for_owner_and_admin() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;

    let stranger = w.another_student("Kojo").await;
    let result = w.bookings.delete(&stranger, booking.id).await;
    assert!(matches!(result, Err(CoreError::Forbidden(_))));

    w.bookings.delete(&w.student, booking.id).await.unwrap();
    assert!(w.store.booking(booking.id).await.is_none());

    // Owners cannot delete once a booking leaves pending; admins can.
    let second = w.book(&w.student, "2027-01-10", "2027-05-30").await;
    w.bookings.cancel(&w.student, second.id).await.unwrap();
    let result = w.bookings.delete(&w.student, second.id).await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));

    let admin = w.admin().await;
    w.bookings.delete(&admin, second.id).await.unwrap();
    assert!(w.store.booking(second.id).await.is_none());
}

#[tokio::test]
async fn test_hostel_fee_must_match_room_price() {
    let w = World::new().await;
    let result = w.bookings.create(&w.student, stay(&w.room, w.room.hostel_id, d("250"))).await;
    assert!(matches!(result, Err(CoreError::ValidationError(_))));
}

#[tokio::test]
async fn test_unapproved_hostel_takes_no_bookings() {
    let w = World::new().await;
    let (hostel, room) = w.second_listing(VerificationStatus::Pending, RoomStatus::Available).await;

    let result = w.bookings.create(&w.student, stay(&room, hostel.id, room.price)).await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[tokio::test]
async fn test_room_under_maintenance_or_from_another_hostel_is_refused() {
    let w = World::new().await;
    let (hostel, room) = w.second_listing(VerificationStatus::Approved, RoomStatus::Maintenance).await;

    let maintenance = w.bookings.create(&w.student, stay(&room, hostel.id, room.price)).await;
    assert!(matches!(maintenance, Err(CoreError::Conflict(_))));

    let mismatched = w.bookings.create(&w.student, stay(&w.room, hostel.id, w.room.price)).await;
    assert!(matches!(mismatched, Err(CoreError::ValidationError(_))));
}

#[tokio::test]
async fn test_reschedule_onto_confirmed_dates_is_rejected() {
    let w = World::new().await;
    let taken = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let reference = w.pay(&w.student, &taken, taken.total_price).await;
    w.payments.verify(&reference).await.unwrap();

    let other = w.another_student("Efua").await;
    let mut request = stay(&w.room, w.room.hostel_id, w.room.price);
    request.start_date = Some(date("2027-01-10"));
    request.end_date = Some(date("2027-05-30"));
    let later = w.bookings.create(&other, request).await.unwrap();

    let clash = w
        .bookings
        .reschedule(
            &other,
            later.id,
            DateChange {
                start_date: Some(date("2026-11-01")),
                end_date: Some(date("2027-02-01")),
            },
        )
        .await;
    assert!(matches!(clash, Err(CoreError::Conflict(_))));
    assert_eq!(w.store.booking(later.id).await.unwrap().start_date, later.start_date);

    let moved = w
        .bookings
        .reschedule(
            &other,
            later.id,
            DateChange {
                start_date: Some(date("2027-02-01")),
                end_date: Some(date("2027-06-30")),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.start_date, date("2027-02-01"));
}

#[tokio::test]
async fn test_trailing_zeros_do_not_count_as_extra_decimals() {
    let w = World::new().await;
    let booking = w.book(&w.student, "2026-09-01", "2026-12-15").await;
    let request = |amount: &str| PaymentRequest {
        booking_id: Some(booking.id),
        amount: Some(d(amount)),
        email: None,
        payment_method: None,
    };

    let sub_cent = w.payments.initialize(&w.student, request("100.005")).await;
    assert!(matches!(sub_cent, Err(CoreError::ValidationError(_))));

    let init = w.payments.initialize(&w.student, request("100.000")).await.unwrap();
    assert_eq!(init.payment.amount, d("100"));
}
