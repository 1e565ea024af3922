//! In-process implementations of every repository plus a scripted gateway
//! and a recording mailer. Used by service and API tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::booking::{Booking, Credit, NewBooking, StayPeriod};
use hostel_core::document::{DocumentStatus, LandlordDocument, NewDocument, ReviewDecision};
use hostel_core::listing::{
    Hostel, HostelChanges, HostelFilter, HostelListing, NewHostel, NewReview, NewRoom, Page, Review, Room,
    RoomChanges, RoomStatus,
};
use hostel_core::mail::{MailError, Mailer};
use hostel_core::notification::{Notification, OutboxEntry, OutboxStatus, SideEffects};
use hostel_core::payment::{
    Checkout, CheckoutRequest, GatewayError, GatewayResult, GatewayTransactionStatus, NewPayment, Payment,
    PaymentConfirmation, PaymentGateway, PaymentRecordStatus, SubaccountRequest, TransactionVerification,
};
use hostel_core::repository::{
    BookingEffects, BookingParties, BookingRepository, DocumentEffects, DocumentRepository, DocumentReview,
    DocumentSubmission, HostelRepository, NotificationRepository, OutboxRepository, PaymentRepository, PaymentSlot,
    PayoutRepository, RepoResult, Reservation, ReviewInsert, ReviewRepository, RoomRepository, Settlement,
    SettlementEffects, SettlementOutcome, StoreError, UserDirectory,
};
use hostel_core::user::{PayoutAccount, Role, UserContact};
use hostel_core::TransitionError;
use hostel_shared::EmailMessage;
use tokio::sync::Mutex;
use uuid::Uuid;

const CLAIM_LEASE_SECONDS: i64 = 300;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserContact>,
    hostels: HashMap<Uuid, Hostel>,
    rooms: HashMap<Uuid, Room>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    payouts: HashMap<Uuid, PayoutAccount>,
    documents: HashMap<Uuid, LandlordDocument>,
    reviews: Vec<Review>,
    notifications: Vec<Notification>,
    outbox: Vec<OutboxEntry>,
}

impl State {
    fn has_payments_where(&self, matches: impl Fn(&Booking) -> bool) -> bool {
        self.payments
            .values()
            .any(|p| self.bookings.get(&p.booking_id).is_some_and(&matches))
    }

    fn write_side_effects(&mut self, effects: SideEffects) {
        for n in effects.notifications {
            self.notifications.push(n.into_notification(Uuid::new_v4()));
        }
        for message in effects.emails {
            self.outbox.push(OutboxEntry::queued(Uuid::new_v4(), message));
        }
    }

    fn confirmed_overlap(&self, room_id: Uuid, period: StayPeriod, excluding: Option<Uuid>) -> Option<Booking> {
        self.bookings
            .values()
            .find(|b| {
                b.room_id == room_id && b.holds_room() && Some(b.id) != excluding && b.period().overlaps(&period)
            })
            .cloned()
    }

    fn parties(&self, booking: &Booking) -> RepoResult<BookingParties> {
        let hostel = self.hostels.get(&booking.hostel_id).ok_or(StoreError::NotFound("Hostel"))?;
        let room = self.rooms.get(&booking.room_id).ok_or(StoreError::NotFound("Room"))?;
        let student = self.users.get(&booking.user_id).ok_or(StoreError::NotFound("User"))?;
        Ok(BookingParties {
            landlord_id: hostel.landlord_id,
            student: student.clone(),
            hostel_name: hostel.name.clone(),
            room_number: room.room_number.clone(),
        })
    }

    fn pending_payment(&self, booking_id: Uuid) -> Option<Payment> {
        self.payments
            .values()
            .find(|p| p.booking_id == booking_id && p.status == PaymentRecordStatus::Pending)
            .cloned()
    }

    fn listing(&self, hostel: &Hostel) -> HostelListing {
        let rooms: Vec<&Room> = self.rooms.values().filter(|r| r.hostel_id == hostel.id).collect();
        HostelListing {
            hostel: hostel.clone(),
            min_price: rooms.iter().map(|r| r.price).min(),
            available_rooms: rooms.iter().filter(|r| r.status == RoomStatus::Available).count() as i64,
        }
    }

    fn matches(&self, hostel: &Hostel, filter: &HostelFilter) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());

        if filter.approved_only && hostel.verification_status != hostel_core::listing::VerificationStatus::Approved {
            return false;
        }
        if let Some(term) = &filter.search {
            let description = hostel.description.as_deref().unwrap_or_default();
            if !(contains(&hostel.name, term) || contains(&hostel.location, term) || contains(description, term)) {
                return false;
            }
        }
        if let Some(location) = &filter.location {
            if !contains(&hostel.location, location) {
                return false;
            }
        }
        if filter.min_price.is_some() || filter.max_price.is_some() {
            let in_range = self.rooms.values().any(|r| {
                r.hostel_id == hostel.id
                    && filter.min_price.map_or(true, |min| r.price >= min)
                    && filter.max_price.map_or(true, |max| r.price <= max)
            });
            if !in_range {
                return false;
            }
        }
        true
    }
}

/// Every repository trait over one shared in-memory state. Each method holds
/// the lock for its whole body, which stands in for a transaction.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, name: &str, email: &str, role: Role) -> UserContact {
        let user = UserContact {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn put_hostel(&self, hostel: Hostel) {
        self.state.lock().await.hostels.insert(hostel.id, hostel);
    }

    pub async fn put_room(&self, room: Room) {
        self.state.lock().await.rooms.insert(room.id, room);
    }

    pub async fn put_document(&self, document: LandlordDocument) {
        self.state.lock().await.documents.insert(document.id, document);
    }

    pub async fn put_payout_account(&self, account: PayoutAccount) {
        self.state.lock().await.payouts.insert(account.landlord_id, account);
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.state.lock().await.bookings.get(&id).cloned()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }

    /// Backdates a payment so TTL expiry can be exercised.
    pub async fn age_payment(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(p) = self.state.lock().await.payments.get_mut(&id) {
            p.created_at = created_at;
        }
    }

    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    pub async fn outbox(&self) -> Vec<OutboxEntry> {
        self.state.lock().await.outbox.clone()
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn reserve(&self, new: NewBooking, effects: BookingEffects) -> RepoResult<Reservation> {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(&new.room_id) {
            return Err(StoreError::NotFound("Room"));
        }
        if let Some(existing) = state.confirmed_overlap(new.room_id, new.period, None) {
            return Ok(Reservation::Conflict { existing });
        }

        let booking = new.into_booking(Uuid::new_v4());
        let parties = state.parties(&booking)?;
        state.bookings.insert(booking.id, booking.clone());
        state.write_side_effects(effects(&booking, &parties));
        Ok(Reservation::Reserved(booking))
    }

    async fn reschedule(&self, id: Uuid, period: StayPeriod) -> RepoResult<Reservation> {
        let mut state = self.state.lock().await;
        let mut booking = state.bookings.get(&id).cloned().ok_or(StoreError::NotFound("Booking"))?;
        booking.reschedule(period)?;
        if let Some(existing) = state.confirmed_overlap(booking.room_id, period, Some(id)) {
            return Ok(Reservation::Conflict { existing });
        }
        state.bookings.insert(id, booking.clone());
        Ok(Reservation::Reserved(booking))
    }

    async fn cancel(&self, id: Uuid, effects: BookingEffects) -> RepoResult<Booking> {
        let mut state = self.state.lock().await;
        let mut booking = state.bookings.get(&id).cloned().ok_or(StoreError::NotFound("Booking"))?;
        booking.cancel()?;
        let parties = state.parties(&booking)?;
        state.bookings.insert(id, booking.clone());
        state.write_side_effects(effects(&booking, &parties));
        Ok(booking)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn parties(&self, booking_id: Uuid) -> RepoResult<Option<BookingParties>> {
        let state = self.state.lock().await;
        match state.bookings.get(&booking_id) {
            Some(booking) => Ok(Some(state.parties(booking)?)),
            None => Ok(None),
        }
    }

    async fn list_for_student(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(newest_first(state.bookings.values().filter(|b| b.user_id == user_id).cloned().collect()))
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let owned = |b: &&Booking| state.hostels.get(&b.hostel_id).map(|h| h.landlord_id) == Some(landlord_id);
        Ok(newest_first(state.bookings.values().filter(owned).cloned().collect()))
    }

    async fn list_all(&self) -> RepoResult<Vec<Booking>> {
        Ok(newest_first(self.state.lock().await.bookings.values().cloned().collect()))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        if state.payments.values().any(|p| p.booking_id == id) {
            return Err(StoreError::HasPayments("Booking"));
        }
        Ok(state.bookings.remove(&id).is_some())
    }
}

fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    bookings
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn open(&self, new: NewPayment, abandoned_before: DateTime<Utc>) -> RepoResult<PaymentSlot> {
        let mut state = self.state.lock().await;
        for p in state.payments.values_mut() {
            if p.booking_id == new.booking_id
                && p.status == PaymentRecordStatus::Pending
                && p.created_at <= abandoned_before
            {
                p.status = PaymentRecordStatus::Failed;
                p.failure_reason = Some("abandoned".to_string());
                p.updated_at = Utc::now();
            }
        }
        if let Some(existing) = state.pending_payment(new.booking_id) {
            return Ok(PaymentSlot::Existing(existing));
        }

        let payment = new.into_payment(Uuid::new_v4());
        state.payments.insert(payment.id, payment.clone());
        Ok(PaymentSlot::Opened(payment))
    }

    async fn attach_checkout(&self, payment_id: Uuid, checkout: &Checkout) -> RepoResult<()> {
        if let Some(p) = self.state.lock().await.payments.get_mut(&payment_id) {
            p.checkout_url = Some(checkout.authorization_url.clone());
            p.access_code = Some(checkout.access_code.clone());
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> RepoResult<()> {
        if let Some(p) = self.state.lock().await.payments.get_mut(&payment_id) {
            if p.status == PaymentRecordStatus::Pending {
                p.status = PaymentRecordStatus::Failed;
                p.failure_reason = Some(reason.to_string());
                p.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state.payments.values().find(|p| p.reference == reference).cloned())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Payment>> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state.payments.values().filter(|p| p.booking_id == booking_id).cloned().collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn settle(
        &self,
        reference: &str,
        confirmation: &PaymentConfirmation,
        effects: SettlementEffects,
    ) -> RepoResult<Settlement> {
        let mut state = self.state.lock().await;
        let mut payment = state
            .payments
            .values()
            .find(|p| p.reference == reference)
            .cloned()
            .ok_or(StoreError::NotFound("Payment"))?;
        let mut booking = state
            .bookings
            .get(&payment.booking_id)
            .cloned()
            .ok_or(StoreError::NotFound("Booking"))?;
        let parties = state.parties(&booking)?;

        if payment.status == PaymentRecordStatus::Successful {
            return Ok(Settlement {
                payment,
                booking,
                parties,
                outcome: SettlementOutcome::AlreadySettled,
            });
        }

        payment.apply_confirmation(confirmation);

        let outcome = match booking.credit(confirmation.amount) {
            Err(TransitionError::NotPayable { .. }) => SettlementOutcome::NotPayable,
            Err(e) => return Err(e.into()),
            Ok(Credit::Partial { remaining }) => SettlementOutcome::PartiallyPaid { remaining },
            Ok(Credit::FullyPaid) => match state.confirmed_overlap(booking.room_id, booking.period(), Some(booking.id)) {
                Some(conflicting) => SettlementOutcome::RoomUnavailable {
                    conflicting_booking_id: conflicting.id,
                },
                None => {
                    booking.confirm()?;
                    SettlementOutcome::Confirmed
                }
            },
        };

        state.payments.insert(payment.id, payment.clone());
        if outcome != SettlementOutcome::NotPayable {
            state.bookings.insert(booking.id, booking.clone());
        }

        let settlement = Settlement {
            payment,
            booking,
            parties,
            outcome,
        };
        state.write_side_effects(effects(&settlement));
        Ok(settlement)
    }
}

#[async_trait]
impl HostelRepository for MemoryStore {
    async fn create(&self, hostel: NewHostel) -> RepoResult<Hostel> {
        let hostel = hostel.into_hostel(Uuid::new_v4());
        self.state.lock().await.hostels.insert(hostel.id, hostel.clone());
        Ok(hostel)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Hostel>> {
        Ok(self.state.lock().await.hostels.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: HostelChanges) -> RepoResult<Option<Hostel>> {
        let mut state = self.state.lock().await;
        Ok(state.hostels.get_mut(&id).map(|hostel| {
            changes.apply(hostel);
            hostel.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        if state.has_payments_where(|b| b.hostel_id == id) {
            return Err(StoreError::HasPayments("Hostel"));
        }
        state.bookings.retain(|_, b| b.hostel_id != id);
        state.rooms.retain(|_, r| r.hostel_id != id);
        state.reviews.retain(|r| r.hostel_id != id);
        Ok(state.hostels.remove(&id).is_some())
    }

    async fn search(&self, filter: &HostelFilter) -> RepoResult<Page<HostelListing>> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Hostel> = state.hostels.values().filter(|h| state.matches(h, filter)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or_default())
            .take(filter.limit as usize)
            .map(|h| state.listing(h))
            .collect();
        Ok(Page::new(items, filter.page, filter.limit, total))
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Hostel>> {
        let state = self.state.lock().await;
        let mut hostels: Vec<Hostel> = state.hostels.values().filter(|h| h.landlord_id == landlord_id).cloned().collect();
        hostels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(hostels)
    }
}

#[async_trait]
impl RoomRepository for MemoryStore {
    async fn create(&self, room: NewRoom) -> RepoResult<Room> {
        let room = room.into_room(Uuid::new_v4());
        self.state.lock().await.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Room>> {
        Ok(self.state.lock().await.rooms.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, changes: RoomChanges) -> RepoResult<Option<Room>> {
        let mut state = self.state.lock().await;
        Ok(state.rooms.get_mut(&id).map(|room| {
            changes.apply(room);
            room.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        if state.has_payments_where(|b| b.room_id == id) {
            return Err(StoreError::HasPayments("Room"));
        }
        state.bookings.retain(|_, b| b.room_id != id);
        Ok(state.rooms.remove(&id).is_some())
    }

    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Room>> {
        let state = self.state.lock().await;
        let mut rooms: Vec<Room> = state.rooms.values().filter(|r| r.hostel_id == hostel_id).cloned().collect();
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        Ok(rooms)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create(&self, review: NewReview) -> RepoResult<ReviewInsert> {
        let mut state = self.state.lock().await;
        if state
            .reviews
            .iter()
            .any(|r| r.hostel_id == review.hostel_id && r.user_id == review.user_id)
        {
            return Ok(ReviewInsert::Duplicate);
        }
        let review = review.into_review(Uuid::new_v4());
        state.reviews.push(review.clone());
        Ok(ReviewInsert::Created(review))
    }

    async fn list_for_hostel(&self, hostel_id: Uuid) -> RepoResult<Vec<Review>> {
        let state = self.state.lock().await;
        Ok(state.reviews.iter().rev().filter(|r| r.hostel_id == hostel_id).cloned().collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn list(&self, recipient_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        match state.notifications.iter_mut().find(|n| n.id == id && n.recipient_id == recipient_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> RepoResult<u64> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for n in state.notifications.iter_mut().filter(|n| n.recipient_id == recipient_id && !n.is_read) {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.notifications.len();
        state.notifications.retain(|n| !(n.id == id && n.recipient_id == recipient_id));
        Ok(state.notifications.len() < before)
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn submit(&self, new: NewDocument) -> RepoResult<DocumentSubmission> {
        let mut state = self.state.lock().await;
        if !state.hostels.contains_key(&new.hostel_id) {
            return Err(StoreError::NotFound("Hostel"));
        }
        let latest = state
            .documents
            .values()
            .filter(|d| d.hostel_id == new.hostel_id)
            .max_by_key(|d| d.created_at)
            .cloned();
        if !LandlordDocument::allows_resubmission(latest.as_ref()) {
            if let Some(existing) = latest {
                return Ok(DocumentSubmission::Blocked(existing));
            }
        }

        let document = new.into_document(Uuid::new_v4());
        if let Some(hostel) = state.hostels.get_mut(&document.hostel_id) {
            hostel.verification_status = DocumentStatus::Pending.as_verification();
            hostel.updated_at = Utc::now();
        }
        state.documents.insert(document.id, document.clone());
        Ok(DocumentSubmission::Submitted(document))
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<LandlordDocument>> {
        Ok(self.state.lock().await.documents.get(&id).cloned())
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<LandlordDocument>> {
        let state = self.state.lock().await;
        let mut docs: Vec<LandlordDocument> =
            state.documents.values().filter(|d| d.landlord_id == landlord_id).cloned().collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    async fn list_by_status(&self, status: Option<DocumentStatus>) -> RepoResult<Vec<LandlordDocument>> {
        let state = self.state.lock().await;
        let mut docs: Vec<LandlordDocument> = state
            .documents
            .values()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(docs)
    }

    async fn latest_approved_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Option<LandlordDocument>> {
        let state = self.state.lock().await;
        Ok(state
            .documents
            .values()
            .filter(|d| d.landlord_id == landlord_id && d.status == DocumentStatus::Approved)
            .max_by_key(|d| d.reviewed_at)
            .cloned())
    }

    async fn review(
        &self,
        id: Uuid,
        decision: &ReviewDecision,
        admin_id: Uuid,
        effects: DocumentEffects,
    ) -> RepoResult<DocumentReview> {
        let mut state = self.state.lock().await;
        let mut document = state.documents.get(&id).cloned().ok_or(StoreError::NotFound("Document"))?;
        document.apply_review(decision, admin_id)?;

        let mut hostel = state
            .hostels
            .get(&document.hostel_id)
            .cloned()
            .ok_or(StoreError::NotFound("Hostel"))?;
        hostel.verification_status = document.status.as_verification();
        hostel.updated_at = Utc::now();

        let landlord = state
            .users
            .get(&document.landlord_id)
            .cloned()
            .ok_or(StoreError::NotFound("Landlord"))?;

        state.documents.insert(document.id, document.clone());
        state.hostels.insert(hostel.id, hostel.clone());

        let review = DocumentReview {
            document,
            hostel,
            landlord,
        };
        state.write_side_effects(effects(&review));
        Ok(review)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn contact(&self, user_id: Uuid) -> RepoResult<Option<UserContact>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl PayoutRepository for MemoryStore {
    async fn payout_account(&self, landlord_id: Uuid) -> RepoResult<Option<PayoutAccount>> {
        Ok(self.state.lock().await.payouts.get(&landlord_id).cloned())
    }

    async fn save_payout_account(&self, account: PayoutAccount) -> RepoResult<PayoutAccount> {
        let mut state = self.state.lock().await;
        Ok(state.payouts.entry(account.landlord_id).or_insert(account).clone())
    }
}

#[async_trait]
impl OutboxRepository for MemoryStore {
    async fn claim_due(&self, limit: i64) -> RepoResult<Vec<OutboxEntry>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let lease = now + chrono::Duration::seconds(CLAIM_LEASE_SECONDS);
        let limit = usize::try_from(limit).unwrap_or_default();

        let mut claimed = Vec::new();
        for entry in state.outbox.iter_mut().filter(|e| e.is_due(now)).take(limit) {
            claimed.push(entry.clone());
            entry.next_attempt_at = lease;
        }
        Ok(claimed)
    }

    async fn mark_delivered(&self, id: Uuid) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        let entry = state.outbox.iter_mut().find(|e| e.id == id).ok_or(StoreError::NotFound("Outbox entry"))?;
        entry.status = OutboxStatus::Delivered;
        Ok(())
    }

    async fn retry_later(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        let entry = state.outbox.iter_mut().find(|e| e.id == id).ok_or(StoreError::NotFound("Outbox entry"))?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        entry.next_attempt_at = next_attempt_at;
        Ok(())
    }

    async fn mark_dead(&self, id: Uuid, error: &str) -> RepoResult<()> {
        let mut state = self.state.lock().await;
        let entry = state.outbox.iter_mut().find(|e| e.id == id).ok_or(StoreError::NotFound("Outbox entry"))?;
        entry.status = OutboxStatus::Dead;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }
}

// ============================================================================
// Gateway and mailer doubles
// ============================================================================

/// Gateway double. Checkouts succeed unless `fail_checkouts` is set;
/// verification answers from transactions registered with `complete`.
#[derive(Clone, Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<GatewayState>>,
}

#[derive(Default)]
struct GatewayState {
    fail_checkouts: bool,
    checkouts: Vec<CheckoutRequest>,
    subaccounts: Vec<SubaccountRequest>,
    transactions: HashMap<String, TransactionVerification>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_checkouts(&self, fail: bool) {
        self.inner.lock().await.fail_checkouts = fail;
    }

    /// Registers the gateway's view of `reference`.
    pub async fn complete(&self, reference: &str, status: GatewayTransactionStatus, amount: rust_decimal::Decimal, currency: &str) {
        let verification = TransactionVerification {
            reference: reference.to_string(),
            status,
            amount,
            currency: currency.to_string(),
            customer_email: "payer@example.com".to_string(),
            channel: Some("mobile_money".to_string()),
            paid_at: Some(Utc::now()),
            gateway_response: Some("Approved".to_string()),
        };
        self.inner
            .lock()
            .await
            .transactions
            .insert(reference.to_string(), verification);
    }

    pub async fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.inner.lock().await.checkouts.clone()
    }

    pub async fn subaccounts(&self) -> Vec<SubaccountRequest> {
        self.inner.lock().await.subaccounts.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_subaccount(&self, request: &SubaccountRequest) -> GatewayResult<String> {
        let mut inner = self.inner.lock().await;
        inner.subaccounts.push(request.clone());
        Ok(format!("ACCT_{}", inner.subaccounts.len()))
    }

    async fn initialize_transaction(&self, request: &CheckoutRequest) -> GatewayResult<Checkout> {
        let mut inner = self.inner.lock().await;
        if inner.fail_checkouts {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }
        inner.checkouts.push(request.clone());
        Ok(Checkout {
            authorization_url: format!("https://checkout.example.com/{}", request.reference),
            access_code: format!("ac_{}", inner.checkouts.len()),
            reference: request.reference.clone(),
        })
    }

    async fn verify_transaction(&self, reference: &str) -> GatewayResult<TransactionVerification> {
        self.inner
            .lock()
            .await
            .transactions
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownTransaction(reference.to_string()))
    }
}

/// Mailer double. Fails the next `failures` sends, then records deliveries.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    inner: Arc<Mutex<MailerState>>,
}

#[derive(Default)]
struct MailerState {
    failures: VecDeque<String>,
    sent: Vec<EmailMessage>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next(&self, times: usize) {
        let mut inner = self.inner.lock().await;
        for _ in 0..times {
            inner.failures.push_back("connection refused".to_string());
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.inner.lock().await.sent.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut inner = self.inner.lock().await;
        if let Some(error) = inner.failures.pop_front() {
            return Err(MailError::Transport(error));
        }
        inner.sent.push(message.clone());
        Ok(())
    }
}
