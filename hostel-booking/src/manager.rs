use std::sync::Arc;

use chrono::NaiveDate;
use hostel_core::booking::{Booking, NewBooking, StayPeriod};
use hostel_core::fees::FeeSchedule;
use hostel_core::listing::VerificationStatus;
use hostel_core::repository::{BookingRepository, HostelRepository, Reservation, RoomRepository};
use hostel_core::user::{Actor, Role};
use hostel_core::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::effects;

/// Body of `POST /api/bookings`. Everything is optional so missing fields
/// surface as validation errors rather than deserialisation failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    pub room_id: Option<Uuid>,
    pub hostel_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hostel_fee: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateChange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn missing(field: &str) -> CoreError {
    CoreError::ValidationError(format!("{} is required", field))
}

fn period_of(start: Option<NaiveDate>, end: Option<NaiveDate>) -> CoreResult<StayPeriod> {
    StayPeriod::new(start.ok_or_else(|| missing("start_date"))?, end.ok_or_else(|| missing("end_date"))?)
}

/// Manages the booking lifecycle: creation under the room lock, date
/// changes, cancellation and scoped reads.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    hostels: Arc<dyn HostelRepository>,
    rooms: Arc<dyn RoomRepository>,
    fees: FeeSchedule,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        hostels: Arc<dyn HostelRepository>,
        rooms: Arc<dyn RoomRepository>,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            bookings,
            hostels,
            rooms,
            fees,
        }
    }

    /// Validate, price and reserve. The conflict check and insert happen in
    /// one storage transaction holding the room lock.
    pub async fn create(&self, actor: &Actor, request: BookingRequest) -> CoreResult<Booking> {
        actor.require(Role::Student)?;

        let room_id = request.room_id.ok_or_else(|| missing("room_id"))?;
        let hostel_id = request.hostel_id.ok_or_else(|| missing("hostel_id"))?;
        let period = period_of(request.start_date, request.end_date)?;
        let hostel_fee = request.hostel_fee.ok_or_else(|| missing("hostel_fee"))?;
        if hostel_fee <= Decimal::ZERO {
            return Err(CoreError::ValidationError("hostel_fee must be greater than zero".to_string()));
        }

        let room = self
            .rooms
            .get(room_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Room not found".to_string()))?;
        if room.hostel_id != hostel_id {
            return Err(CoreError::ValidationError("Room does not belong to this hostel".to_string()));
        }
        if !room.is_bookable() {
            return Err(CoreError::Conflict("Room is not available for booking".to_string()));
        }
        if room.price != hostel_fee {
            return Err(CoreError::ValidationError(format!(
                "hostel_fee must match the room price of {}",
                room.price
            )));
        }

        let hostel = self
            .hostels
            .get(hostel_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Hostel not found".to_string()))?;
        if hostel.verification_status != VerificationStatus::Approved {
            return Err(CoreError::Conflict("Hostel is not open for bookings yet".to_string()));
        }

        let booking = NewBooking {
            room_id,
            hostel_id,
            user_id: actor.id,
            period,
            fees: self.fees.quote(hostel_fee),
        };

        match self.bookings.reserve(booking, effects::booking_created).await? {
            Reservation::Reserved(booking) => {
                info!(
                    booking_id = %booking.id,
                    room_id = %booking.room_id,
                    total_price = %booking.total_price,
                    "Booking created"
                );
                Ok(booking)
            }
            Reservation::Conflict { existing } => {
                info!(room_id = %room_id, existing = %existing.id, "Booking rejected: dates overlap a confirmed booking");
                Err(CoreError::Conflict("Room is already booked for the selected dates".to_string()))
            }
        }
    }

    /// Owner-only date change while nothing has been paid.
    pub async fn reschedule(&self, actor: &Actor, id: Uuid, change: DateChange) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        if booking.user_id != actor.id {
            return Err(CoreError::Forbidden("You can only change your own bookings".to_string()));
        }
        let period = period_of(change.start_date, change.end_date)?;

        match self.bookings.reschedule(id, period).await? {
            Reservation::Reserved(booking) => Ok(booking),
            Reservation::Conflict { .. } => {
                Err(CoreError::Conflict("Room is already booked for the selected dates".to_string()))
            }
        }
    }

    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        if booking.user_id != actor.id && !actor.is_admin() {
            return Err(CoreError::Forbidden("You can only cancel your own bookings".to_string()));
        }

        let cancelled = self.bookings.cancel(id, effects::booking_cancelled).await?;
        info!(booking_id = %id, by = %actor.id, "Booking cancelled");
        Ok(cancelled)
    }

    /// Admins delete anything; owners only an untouched pending booking.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> CoreResult<()> {
        let booking = self.load(id).await?;
        if !actor.is_admin() {
            if booking.user_id != actor.id {
                return Err(CoreError::Forbidden("You can only delete your own bookings".to_string()));
            }
            if !booking.is_editable() {
                return Err(CoreError::Conflict(
                    "Only pending bookings with no payments can be deleted".to_string(),
                ));
            }
        }

        if !self.bookings.delete(id).await? {
            return Err(CoreError::NotFound("Booking not found".to_string()));
        }
        info!(booking_id = %id, by = %actor.id, "Booking deleted");
        Ok(())
    }

    pub async fn list(&self, actor: &Actor) -> CoreResult<Vec<Booking>> {
        let bookings = match actor.role {
            Role::Student => self.bookings.list_for_student(actor.id).await?,
            Role::Landlord => self.bookings.list_for_landlord(actor.id).await?,
            Role::Admin => self.bookings.list_all().await?,
        };
        Ok(bookings)
    }

    /// Visible to the student who booked, the hostel's landlord and admins.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(id).await?;
        self.authorize_view(actor, &booking).await?;
        Ok(booking)
    }

    pub async fn authorize_view(&self, actor: &Actor, booking: &Booking) -> CoreResult<()> {
        if actor.is_admin() || booking.user_id == actor.id {
            return Ok(());
        }
        if actor.role == Role::Landlord {
            let landlord = self.hostels.get(booking.hostel_id).await?.map(|h| h.landlord_id);
            if landlord == Some(actor.id) {
                return Ok(());
            }
        }
        Err(CoreError::Forbidden("You do not have access to this booking".to_string()))
    }

    async fn load(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))
    }
}
