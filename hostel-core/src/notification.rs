use chrono::{DateTime, Utc};
use hostel_shared::EmailMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum!(
    NotificationKind, "notification kind", {
        BookingCreated => "booking_created",
        BookingCancelled => "booking_cancelled",
        PaymentReceived => "payment_received",
        BookingConfirmed => "booking_confirmed",
        RefundRequired => "refund_required",
        DocumentApproved => "document_approved",
        DocumentRejected => "document_rejected",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub booking_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub hostel_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub booking_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub hostel_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(recipient_id: Uuid, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient_id,
            kind,
            title: title.into(),
            message: message.into(),
            booking_id: None,
            student_id: None,
            hostel_id: None,
            room_id: None,
        }
    }

    pub fn for_booking(mut self, booking_id: Uuid, student_id: Uuid, hostel_id: Uuid, room_id: Uuid) -> Self {
        self.booking_id = Some(booking_id);
        self.student_id = Some(student_id);
        self.hostel_id = Some(hostel_id);
        self.room_id = Some(room_id);
        self
    }

    pub fn for_hostel(mut self, hostel_id: Uuid) -> Self {
        self.hostel_id = Some(hostel_id);
        self
    }

    pub fn into_notification(self, id: Uuid) -> Notification {
        Notification {
            id,
            recipient_id: self.recipient_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            is_read: false,
            booking_id: self.booking_id,
            student_id: self.student_id,
            hostel_id: self.hostel_id,
            room_id: self.room_id,
            created_at: Utc::now(),
        }
    }
}

/// Notifications and e-mails a state change produces. Repositories write
/// them in the same transaction as the change itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffects {
    pub notifications: Vec<NewNotification>,
    pub emails: Vec<EmailMessage>,
}

impl SideEffects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn notify(mut self, notification: NewNotification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn email(mut self, message: EmailMessage) -> Self {
        self.emails.push(message);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.emails.is_empty()
    }
}

text_enum!(
    OutboxStatus, "outbox status", {
        Pending => "pending",
        Delivered => "delivered",
        Dead => "dead",
    }
);

/// A queued e-mail with its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub message: EmailMessage,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn queued(id: Uuid, message: EmailMessage) -> Self {
        let now = Utc::now();
        Self {
            id,
            message,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: now,
            created_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_attempt_at <= now
    }
}
