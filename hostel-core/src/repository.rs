use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::booking::{Booking, NewBooking, StayPeriod, TransitionError};
use crate::document::{DocumentStatus, LandlordDocument, NewDocument, ReviewDecision};
use crate::listing::{
    Hostel, HostelChanges, HostelFilter, HostelListing, NewHostel, NewReview, NewRoom, Page, Review, Room,
    RoomChanges,
};
use crate::notification::{Notification, OutboxEntry, SideEffects};
use crate::payment::{Checkout, NewPayment, Payment, PaymentConfirmation};
use crate::user::{PayoutAccount, UserContact};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Payment records still reference the row.
    #[error("{0} has payment records and cannot be deleted")]
    HasPayments(&'static str),

    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Backend(err.into())
    }
}

pub type RepoResult<T> = Result<T, StoreError>;

// ============================================================================
// Outcomes
// ============================================================================

/// People and names around a booking, loaded alongside it so side effects
/// can address the right recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingParties {
    pub landlord_id: Uuid,
    pub student: UserContact,
    pub hostel_name: String,
    pub room_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    Reserved(Booking),
    /// A confirmed booking already holds the room for overlapping dates.
    Conflict { existing: Booking },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSlot {
    Opened(Payment),
    Existing(Payment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The reference was verified before; nothing changed.
    AlreadySettled,
    PartiallyPaid { remaining: Decimal },
    Confirmed,
    /// Fully paid, but another confirmed booking took the room meanwhile.
    RoomUnavailable { conflicting_booking_id: Uuid },
    /// Money arrived for a booking that was cancelled or already settled.
    NotPayable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub payment: Payment,
    pub booking: Booking,
    pub parties: BookingParties,
    pub outcome: SettlementOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSubmission {
    Submitted(LandlordDocument),
    /// A pending or approved submission is already on file.
    Blocked(LandlordDocument),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReview {
    pub document: LandlordDocument,
    pub hostel: Hostel,
    pub landlord: UserContact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewInsert {
    Created(Review),
    Duplicate,
}

/// Composes the side effects of a booking state change. Called inside the
/// storage transaction with the updated row.
pub type BookingEffects = fn(&Booking, &BookingParties) -> SideEffects;
pub type SettlementEffects = fn(&Settlement) -> SideEffects;
pub type DocumentEffects = fn(&DocumentReview) -> SideEffects;

// ============================================================================
// Repositories
// ============================================================================

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Locks the room, rejects if a confirmed booking overlaps, otherwise
    /// inserts `pending/pending`. One transaction.
    async fn reserve(&self, booking: NewBooking, effects: BookingEffects) -> RepoResult<Reservation>;

    /// Moves an editable booking to new dates under the same room lock.
    async fn reschedule(&self, id: Uuid, period: StayPeriod) -> RepoResult<Reservation>;

    async fn cancel(&self, id: Uuid, effects: BookingEffects) -> RepoResult<Booking>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn parties(&self, booking_id: Uuid) -> RepoResult<Option<BookingParties>>;

    async fn list_for_student(&self, user_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn list_all(&self) -> RepoResult<Vec<Booking>>;

    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Writes a pending payment unless one is already in flight for the
    /// booking. Pending rows created before `abandoned_before` are failed
    /// first.
    async fn open(&self, payment: NewPayment, abandoned_before: DateTime<Utc>) -> RepoResult<PaymentSlot>;

    async fn attach_checkout(&self, payment_id: Uuid, checkout: &Checkout) -> RepoResult<()>;

    /// Fails a pending payment; a no-op for any other state.
    async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> RepoResult<()>;

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Payment>>;

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Payment>>;

    /// Applies a gateway-confirmed payment exactly once per reference:
    /// marks it successful, credits the booking and confirms it when fully
    /// paid and the room is still free.
    async fn settle(
        &self,
        reference: &str,
        confirmation: &PaymentConfirmation,
        effects: SettlementEffects,
    ) -> RepoResult<Settlement>;
}

#[async_trait]
pub trait HostelRepository: Send + Sync {
    async fn create(&self, hostel: NewHostel) -> RepoResult<Hostel>;
    async fn get(&self, id: Uuid) -> RepoResult<Option<Hostel>>;
    async fn update(&self, id: Uuid, changes: HostelChanges) -> RepoResult<Option<Hostel>>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn search(&self, filter: &HostelFilter) -> RepoResult<Page<HostelListing>>;
    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Hostel>>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: NewRoom) -> RepoResult<Room>;
    async fn get(&self, id: Uuid) -> RepoResult<Option<Room>>;
    async fn update(&self, id: Uuid, changes: RoomChanges) -> RepoResult<Option<Room>>;
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Room>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// One review per user per hostel.
    async fn create(&self, review: NewReview) -> RepoResult<ReviewInsert>;
    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Review>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list(&self, recipient_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>>;
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool>;
    async fn mark_all_read(&self, recipient_id: Uuid) -> RepoResult<u64>;
    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn submit(&self, document: NewDocument) -> RepoResult<DocumentSubmission>;
    async fn get(&self, id: Uuid) -> RepoResult<Option<LandlordDocument>>;
    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<LandlordDocument>>;
    async fn list_by_status(&self, status: Option<DocumentStatus>) -> RepoResult<Vec<LandlordDocument>>;
    /// Most recent approved submission; its bank details back the payout
    /// sub-account.
    async fn latest_approved_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Option<LandlordDocument>>;

    /// Applies the decision to the document and the linked hostel's
    /// verification status in one transaction.
    async fn review(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
        admin_id: Uuid,
        effects: DocumentEffects,
    ) -> RepoResult<DocumentReview>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn contact(&self, user_id: Uuid) -> RepoResult<Option<UserContact>>;
}

#[async_trait]
pub trait PayoutRepository: Send + Sync {
    async fn payout_account(&self, landlord_id: Uuid) -> RepoResult<Option<PayoutAccount>>;

    /// Keeps the first account saved for a landlord and returns it.
    async fn save_payout_account(&self, account: PayoutAccount) -> RepoResult<PayoutAccount>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Leases up to `limit` due messages so concurrent dispatchers skip them.
    async fn claim_due(&self, limit: i64) -> RepoResult<Vec<OutboxEntry>>;
    async fn mark_delivered(&self, id: Uuid) -> RepoResult<()>;
    async fn retry_later(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> RepoResult<()>;
    async fn mark_dead(&self, id: Uuid, error: &str) -> RepoResult<()>;
}
