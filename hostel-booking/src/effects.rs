//! Notifications and e-mails produced by booking, payment and document
//! state changes. Each function matches one of the composer signatures the
//! repositories accept and runs inside their transaction.

use hostel_core::booking::Booking;
use hostel_core::document::DocumentStatus;
use hostel_core::notification::{NewNotification, NotificationKind, SideEffects};
use hostel_core::repository::{BookingParties, DocumentReview, Settlement, SettlementOutcome};
use hostel_shared::{EmailKind, EmailMessage};

fn booking_note(booking: &Booking, recipient: uuid::Uuid, kind: NotificationKind, title: &str, message: String) -> NewNotification {
    NewNotification::new(recipient, kind, title, message).for_booking(
        booking.id,
        booking.user_id,
        booking.hostel_id,
        booking.room_id,
    )
}

fn student_email(parties: &BookingParties, booking: &Booking, kind: EmailKind, subject: &str, body: String) -> EmailMessage {
    EmailMessage::new(kind, parties.student.email.clone(), subject, body)
        .with_recipient_name(parties.student.name.clone())
        .about(booking.id)
}

pub fn booking_created(booking: &Booking, parties: &BookingParties) -> SideEffects {
    SideEffects::none().notify(booking_note(
        booking,
        parties.landlord_id,
        NotificationKind::BookingCreated,
        "New booking",
        format!(
            "{} booked room {} at {} from {} to {}.",
            parties.student.name, parties.room_number, parties.hostel_name, booking.start_date, booking.end_date
        ),
    ))
}

pub fn booking_cancelled(booking: &Booking, parties: &BookingParties) -> SideEffects {
    SideEffects::none()
        .notify(booking_note(
            booking,
            parties.landlord_id,
            NotificationKind::BookingCancelled,
            "Booking cancelled",
            format!(
                "{} cancelled their booking for room {} at {} ({} to {}).",
                parties.student.name, parties.room_number, parties.hostel_name, booking.start_date, booking.end_date
            ),
        ))
        .email(student_email(
            parties,
            booking,
            EmailKind::BookingCancelled,
            "Your booking has been cancelled",
            format!(
                "Hello {},\n\nYour booking for room {} at {} from {} to {} has been cancelled.",
                parties.student.name, parties.room_number, parties.hostel_name, booking.start_date, booking.end_date
            ),
        ))
}

pub fn settlement(settlement: &Settlement) -> SideEffects {
    let Settlement {
        payment,
        booking,
        parties,
        outcome,
    } = settlement;
    let paid = format!("{} {}", payment.currency, payment.amount);

    match outcome {
        SettlementOutcome::AlreadySettled => SideEffects::none(),
        SettlementOutcome::PartiallyPaid { remaining } => SideEffects::none()
            .notify(booking_note(
                booking,
                parties.landlord_id,
                NotificationKind::PaymentReceived,
                "Payment received",
                format!(
                    "{} paid {} towards room {} at {}. Outstanding: {} {}.",
                    parties.student.name, paid, parties.room_number, parties.hostel_name, payment.currency, remaining
                ),
            ))
            .email(student_email(
                parties,
                booking,
                EmailKind::BookingPartiallyPaid,
                "Payment received",
                format!(
                    "Hello {},\n\nWe received {} for room {} at {}. Your remaining balance is {} {}.\n\nReference: {}",
                    parties.student.name,
                    paid,
                    parties.room_number,
                    parties.hostel_name,
                    payment.currency,
                    remaining,
                    payment.reference
                ),
            )),
        SettlementOutcome::Confirmed => SideEffects::none()
            .notify(booking_note(
                booking,
                parties.landlord_id,
                NotificationKind::BookingConfirmed,
                "Booking confirmed",
                format!(
                    "{} has paid in full for room {} at {} ({} to {}).",
                    parties.student.name, parties.room_number, parties.hostel_name, booking.start_date, booking.end_date
                ),
            ))
            .email(student_email(
                parties,
                booking,
                EmailKind::BookingFullyPaid,
                "Your booking is confirmed",
                format!(
                    "Hello {},\n\nYour payment of {} completed your booking. Room {} at {} is yours from {} to {}.\n\nReference: {}",
                    parties.student.name,
                    paid,
                    parties.room_number,
                    parties.hostel_name,
                    booking.start_date,
                    booking.end_date,
                    payment.reference
                ),
            )),
        SettlementOutcome::RoomUnavailable { .. } => refund_required(
            settlement,
            &paid,
            "the room was confirmed for another student before your payment completed",
        ),
        SettlementOutcome::NotPayable => refund_required(
            settlement,
            &paid,
            &format!("the booking was already {} when your payment arrived", booking.status),
        ),
    }
}

fn refund_required(settlement: &Settlement, paid: &str, reason: &str) -> SideEffects {
    let Settlement {
        payment,
        booking,
        parties,
        ..
    } = settlement;

    SideEffects::none()
        .notify(booking_note(
            booking,
            parties.landlord_id,
            NotificationKind::RefundRequired,
            "Refund required",
            format!(
                "A payment of {} (reference {}) for room {} at {} must be refunded: {}.",
                paid, payment.reference, parties.room_number, parties.hostel_name, reason
            ),
        ))
        .notify(booking_note(
            booking,
            parties.student.id,
            NotificationKind::RefundRequired,
            "Refund pending",
            format!("Your payment of {} will be refunded: {}.", paid, reason),
        ))
        .email(student_email(
            parties,
            booking,
            EmailKind::RefundRequired,
            "Your payment will be refunded",
            format!(
                "Hello {},\n\nWe received {} for room {} at {}, but {}. The payment will be refunded.\n\nReference: {}",
                parties.student.name, paid, parties.room_number, parties.hostel_name, reason, payment.reference
            ),
        ))
}

pub fn document_reviewed(review: &DocumentReview) -> SideEffects {
    let DocumentReview {
        document,
        hostel,
        landlord,
    } = review;

    let (kind, email_kind, title, detail) = match document.status {
        DocumentStatus::Rejected => (
            NotificationKind::DocumentRejected,
            EmailKind::DocumentRejected,
            "Verification rejected",
            format!(
                "Your verification documents for {} were rejected: {}.",
                hostel.name,
                document.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        ),
        DocumentStatus::Approved | DocumentStatus::Pending => (
            NotificationKind::DocumentApproved,
            EmailKind::DocumentApproved,
            "Verification approved",
            format!("{} has been verified and is now visible to students.", hostel.name),
        ),
    };

    SideEffects::none()
        .notify(NewNotification::new(landlord.id, kind, title, detail.clone()).for_hostel(hostel.id))
        .email(
            EmailMessage::new(email_kind, landlord.email.clone(), title, format!("Hello {},\n\n{}", landlord.name, detail))
                .with_recipient_name(landlord.name.clone())
                .about(document.id),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostel_core::booking::{NewBooking, StayPeriod};
    use hostel_core::fees::FeeSchedule;
    use hostel_core::payment::{NewPayment, PaymentMethod};
    use hostel_core::user::{Role, UserContact};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn fixture() -> (Booking, BookingParties) {
        let start = chrono::NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let end = chrono::NaiveDate::from_ymd_opt(2026, 5, 30).unwrap();
        let booking = NewBooking {
            room_id: Uuid::new_v4(),
            hostel_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            period: StayPeriod::new(start, end).unwrap(),
            fees: FeeSchedule::default().quote(Decimal::from(300)),
        }
        .into_booking(Uuid::new_v4());
        let parties = BookingParties {
            landlord_id: Uuid::new_v4(),
            student: UserContact {
                id: booking.user_id,
                name: "Ama Owusu".to_string(),
                email: "ama@example.com".to_string(),
                role: Role::Student,
            },
            hostel_name: "Unity Hall".to_string(),
            room_number: "B12".to_string(),
        };
        (booking, parties)
    }

    fn settled(outcome: SettlementOutcome) -> Settlement {
        let (booking, parties) = fixture();
        let payment = NewPayment {
            booking_id: booking.id,
            user_id: booking.user_id,
            reference: "HSTL-1-ABCDEFGH".to_string(),
            amount: Decimal::from(100),
            currency: "GHS".to_string(),
            payment_method: PaymentMethod::MobileMoney,
            email: "ama@example.com".to_string(),
            split: booking.fees().split(),
        }
        .into_payment(Uuid::new_v4());
        Settlement {
            payment,
            booking,
            parties,
            outcome,
        }
    }

    #[test]
    fn test_created_notifies_landlord_only() {
        let (booking, parties) = fixture();
        let effects = booking_created(&booking, &parties);
        assert_eq!(effects.notifications.len(), 1);
        assert_eq!(effects.notifications[0].recipient_id, parties.landlord_id);
        assert_eq!(effects.notifications[0].booking_id, Some(booking.id));
        assert!(effects.emails.is_empty());
    }

    #[test]
    fn test_cancelled_emails_student() {
        let (booking, parties) = fixture();
        let effects = booking_cancelled(&booking, &parties);
        assert_eq!(effects.notifications[0].kind, NotificationKind::BookingCancelled);
        assert_eq!(effects.emails[0].to, "ama@example.com");
        assert_eq!(effects.emails[0].kind, EmailKind::BookingCancelled);
    }

    #[test]
    fn test_settlement_effects_follow_outcome() {
        let partial = settlement(&settled(SettlementOutcome::PartiallyPaid {
            remaining: Decimal::from(223),
        }));
        assert_eq!(partial.emails[0].kind, EmailKind::BookingPartiallyPaid);
        assert!(partial.emails[0].body.contains("GHS 223"));

        let confirmed = settlement(&settled(SettlementOutcome::Confirmed));
        assert_eq!(confirmed.notifications[0].kind, NotificationKind::BookingConfirmed);
        assert_eq!(confirmed.emails[0].kind, EmailKind::BookingFullyPaid);

        let taken = settlement(&settled(SettlementOutcome::RoomUnavailable {
            conflicting_booking_id: Uuid::new_v4(),
        }));
        assert_eq!(taken.notifications.len(), 2);
        assert!(taken.notifications.iter().all(|n| n.kind == NotificationKind::RefundRequired));

        assert!(settlement(&settled(SettlementOutcome::AlreadySettled)).is_empty());
    }
}
