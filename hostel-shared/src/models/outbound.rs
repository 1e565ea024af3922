use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an e-mail was queued. Stored with the outbox row for filtering and
/// delivery logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    BookingFullyPaid,
    BookingPartiallyPaid,
    BookingCancelled,
    RefundRequired,
    DocumentApproved,
    DocumentRejected,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::BookingFullyPaid => "booking_fully_paid",
            EmailKind::BookingPartiallyPaid => "booking_partially_paid",
            EmailKind::BookingCancelled => "booking_cancelled",
            EmailKind::RefundRequired => "refund_required",
            EmailKind::DocumentApproved => "document_approved",
            EmailKind::DocumentRejected => "document_rejected",
        }
    }
}

/// A rendered e-mail waiting in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub kind: EmailKind,
    pub to: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    /// Booking or document the message is about.
    pub subject_id: Option<Uuid>,
}

impl EmailMessage {
    pub fn new(kind: EmailKind, to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            to: to.into(),
            recipient_name: None,
            subject: subject.into(),
            body: body.into(),
            subject_id: None,
        }
    }

    pub fn with_recipient_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_name = Some(name.into());
        self
    }

    pub fn about(mut self, id: Uuid) -> Self {
        self.subject_id = Some(id);
        self
    }
}
