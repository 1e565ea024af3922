use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fees::FeeBreakdown;
use crate::CoreError;

text_enum!(
    /// Booking lifecycle state.
    BookingStatus, "booking status", {
        Pending => "pending",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Whether the booking's total has been collected.
    PaymentStatus, "payment status", {
        Pending => "pending",
        Paid => "paid",
    }
);

/// Inclusive date range a booking occupies a room for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl StayPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, CoreError> {
        if end_date < start_date {
            return Err(CoreError::ValidationError(
                "end_date must not be before start_date".to_string(),
            ));
        }
        Ok(Self { start_date, end_date })
    }

    /// Inclusive overlap: sharing a single day counts.
    pub fn overlaps(&self, other: &StayPeriod) -> bool {
        self.start_date <= other.end_date && self.end_date >= other.start_date
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Booking cannot be cancelled in its current state ({0})")]
    CannotCancel(BookingStatus),

    #[error("Booking is not accepting payments (status {status}, payment {payment_status})")]
    NotPayable {
        status: BookingStatus,
        payment_status: PaymentStatus,
    },

    #[error("Only pending, unpaid bookings can be changed")]
    Locked,

    #[error("Payment amount must be positive")]
    NonPositiveAmount,

    #[error("Document has already been reviewed ({0})")]
    AlreadyReviewed(String),
}

/// A student's claim on a room for a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub hostel_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hostel_fee: Decimal,
    pub platform_fee: Decimal,
    pub estimated_gateway_fee: Decimal,
    pub total_price: Decimal,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of crediting a verified payment to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credit {
    Partial { remaining: Decimal },
    FullyPaid,
}

impl Booking {
    pub fn period(&self) -> StayPeriod {
        StayPeriod {
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    pub fn fees(&self) -> FeeBreakdown {
        FeeBreakdown {
            hostel_fee: self.hostel_fee,
            platform_fee: self.platform_fee,
            estimated_gateway_fee: self.estimated_gateway_fee,
            total_price: self.total_price,
        }
    }

    pub fn outstanding(&self) -> Decimal {
        (self.total_price - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn is_payable(&self) -> bool {
        self.status == BookingStatus::Pending && self.payment_status == PaymentStatus::Pending
    }

    /// Blocks other confirmations for the same room and dates.
    pub fn holds_room(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// pending|confirmed → cancelled. Returns the status it left.
    pub fn cancel(&mut self) -> Result<BookingStatus, TransitionError> {
        match self.status {
            BookingStatus::Pending | BookingStatus::Confirmed => {
                let previous = self.status;
                self.status = BookingStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(previous)
            }
            BookingStatus::Cancelled => Err(TransitionError::CannotCancel(self.status)),
        }
    }

    /// Adds a verified amount to `amount_paid`. Reaching the total flips the
    /// payment status to `paid`; confirmation is a separate step because it
    /// depends on room availability.
    pub fn credit(&mut self, amount: Decimal) -> Result<Credit, TransitionError> {
        if amount <= Decimal::ZERO {
            return Err(TransitionError::NonPositiveAmount);
        }
        if !self.is_payable() {
            return Err(TransitionError::NotPayable {
                status: self.status,
                payment_status: self.payment_status,
            });
        }

        self.amount_paid += amount;
        self.updated_at = Utc::now();

        if self.amount_paid >= self.total_price {
            self.payment_status = PaymentStatus::Paid;
            Ok(Credit::FullyPaid)
        } else {
            Ok(Credit::Partial {
                remaining: self.outstanding(),
            })
        }
    }

    /// pending/paid → confirmed/paid.
    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        if self.status != BookingStatus::Pending || self.payment_status != PaymentStatus::Paid {
            return Err(TransitionError::InvalidTransition {
                from: format!("{}/{}", self.status, self.payment_status),
                to: "confirmed/paid".to_string(),
            });
        }
        self.status = BookingStatus::Confirmed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the dates of a booking nobody has paid towards yet.
    pub fn reschedule(&mut self, period: StayPeriod) -> Result<(), TransitionError> {
        if !self.is_editable() {
            return Err(TransitionError::Locked);
        }
        self.start_date = period.start_date;
        self.end_date = period.end_date;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_editable(&self) -> bool {
        self.is_payable() && self.amount_paid == Decimal::ZERO
    }
}

/// A booking about to be inserted, already priced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub room_id: Uuid,
    pub hostel_id: Uuid,
    pub user_id: Uuid,
    pub period: StayPeriod,
    pub fees: FeeBreakdown,
}

impl NewBooking {
    /// The row as first written: `pending/pending`, nothing paid.
    pub fn into_booking(self, id: Uuid) -> Booking {
        let now = Utc::now();
        Booking {
            id,
            room_id: self.room_id,
            hostel_id: self.hostel_id,
            user_id: self.user_id,
            start_date: self.period.start_date,
            end_date: self.period.end_date,
            hostel_fee: self.fees.hostel_fee,
            platform_fee: self.fees.platform_fee,
            estimated_gateway_fee: self.fees.estimated_gateway_fee,
            total_price: self.fees.total_price,
            amount_paid: Decimal::ZERO,
            payment_status: PaymentStatus::Pending,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
