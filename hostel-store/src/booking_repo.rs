use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hostel_core::booking::{Booking, NewBooking, StayPeriod};
use hostel_core::repository::{BookingEffects, BookingParties, BookingRepository, RepoResult, Reservation};
use hostel_core::user::UserContact;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{guard_payments, PgError, PgResult};
use crate::notification_repo::write_side_effects;

pub(crate) const BOOKING_COLUMNS: &str = "b.id, b.room_id, b.hostel_id, b.user_id, b.start_date, b.end_date, \
     b.hostel_fee, b.platform_fee, b.estimated_gateway_fee, b.total_price, b.amount_paid, \
     b.payment_status, b.status, b.created_at, b.updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    room_id: Uuid,
    hostel_id: Uuid,
    user_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    hostel_fee: Decimal,
    platform_fee: Decimal,
    estimated_gateway_fee: Decimal,
    total_price: Decimal,
    amount_paid: Decimal,
    payment_status: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    pub(crate) fn into_booking(self) -> PgResult<Booking> {
        Ok(Booking {
            id: self.id,
            room_id: self.room_id,
            hostel_id: self.hostel_id,
            user_id: self.user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            hostel_fee: self.hostel_fee,
            platform_fee: self.platform_fee,
            estimated_gateway_fee: self.estimated_gateway_fee,
            total_price: self.total_price,
            amount_paid: self.amount_paid,
            payment_status: self.payment_status.parse()?,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PartiesRow {
    landlord_id: Uuid,
    student_id: Uuid,
    student_name: String,
    student_email: String,
    student_role: String,
    hostel_name: String,
    room_number: String,
}

fn rows_into_bookings(rows: Vec<BookingRow>) -> PgResult<Vec<Booking>> {
    rows.into_iter().map(BookingRow::into_booking).collect()
}

// ----------------------------------------------------------------------------
// Transaction helpers shared with the payment repository
// ----------------------------------------------------------------------------

/// Serialises booking writes on one room. Returns false when the room does
/// not exist.
pub(crate) async fn lock_room(conn: &mut PgConnection, room_id: Uuid) -> PgResult<bool> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(room_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

/// A confirmed booking on the room whose dates intersect `period`
/// (inclusive on both ends).
pub(crate) async fn confirmed_overlap(
    conn: &mut PgConnection,
    room_id: Uuid,
    period: StayPeriod,
    excluding: Option<Uuid>,
) -> PgResult<Option<Booking>> {
    let sql = format!(
        "SELECT {} FROM bookings b \
         WHERE b.room_id = $1 AND b.status = 'confirmed' \
           AND b.start_date <= $3 AND b.end_date >= $2 \
           AND ($4::uuid IS NULL OR b.id <> $4) \
         LIMIT 1",
        BOOKING_COLUMNS
    );
    let row: Option<BookingRow> = sqlx::query_as(&sql)
        .bind(room_id)
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(excluding)
        .fetch_optional(conn)
        .await?;
    row.map(BookingRow::into_booking).transpose()
}

pub(crate) async fn booking_for_update(conn: &mut PgConnection, id: Uuid) -> PgResult<Booking> {
    let sql = format!("SELECT {} FROM bookings b WHERE b.id = $1 FOR UPDATE", BOOKING_COLUMNS);
    let row: Option<BookingRow> = sqlx::query_as(&sql).bind(id).fetch_optional(conn).await?;
    row.ok_or(PgError::NotFound("Booking"))?.into_booking()
}

pub(crate) async fn save_booking(conn: &mut PgConnection, booking: &Booking) -> PgResult<()> {
    sqlx::query(
        r#"
        UPDATE bookings
        SET start_date = $2, end_date = $3, amount_paid = $4, payment_status = $5, status = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(booking.id)
    .bind(booking.start_date)
    .bind(booking.end_date)
    .bind(booking.amount_paid)
    .bind(booking.payment_status.as_str())
    .bind(booking.status.as_str())
    .bind(booking.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn load_parties(conn: &mut PgConnection, booking_id: Uuid) -> PgResult<Option<BookingParties>> {
    let row: Option<PartiesRow> = sqlx::query_as(
        r#"
        SELECT h.landlord_id, u.id AS student_id, u.name AS student_name, u.email AS student_email,
               u.role AS student_role, h.name AS hostel_name, r.room_number
        FROM bookings b
        JOIN hostels h ON h.id = b.hostel_id
        JOIN rooms r ON r.id = b.room_id
        JOIN users u ON u.id = b.user_id
        WHERE b.id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(conn)
    .await?;

    row.map(|r| {
        Ok(BookingParties {
            landlord_id: r.landlord_id,
            student: UserContact {
                id: r.student_id,
                name: r.student_name,
                email: r.student_email,
                role: r.student_role.parse()?,
            },
            hostel_name: r.hostel_name,
            room_number: r.room_number,
        })
    })
    .transpose()
}

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> PgResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, room_id, hostel_id, user_id, start_date, end_date, hostel_fee, platform_fee,
                                  estimated_gateway_fee, total_price, amount_paid, payment_status, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(booking.id)
        .bind(booking.room_id)
        .bind(booking.hostel_id)
        .bind(booking.user_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.hostel_fee)
        .bind(booking.platform_fee)
        .bind(booking.estimated_gateway_fee)
        .bind(booking.total_price)
        .bind(booking.amount_paid)
        .bind(booking.payment_status.as_str())
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn do_reserve(&self, new: NewBooking, effects: BookingEffects) -> PgResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        if !lock_room(&mut tx, new.room_id).await? {
            return Err(PgError::NotFound("Room"));
        }
        if let Some(existing) = confirmed_overlap(&mut tx, new.room_id, new.period, None).await? {
            tx.rollback().await?;
            return Ok(Reservation::Conflict { existing });
        }

        let booking = new.into_booking(Uuid::new_v4());
        Self::insert(&mut tx, &booking).await?;

        let parties = load_parties(&mut tx, booking.id)
            .await?
            .ok_or(PgError::NotFound("Booking"))?;
        write_side_effects(&mut tx, effects(&booking, &parties)).await?;

        tx.commit().await?;
        Ok(Reservation::Reserved(booking))
    }

    async fn do_reschedule(&self, id: Uuid, period: StayPeriod) -> PgResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let mut booking = booking_for_update(&mut tx, id).await?;
        lock_room(&mut tx, booking.room_id).await?;
        booking.reschedule(period)?;

        if let Some(existing) = confirmed_overlap(&mut tx, booking.room_id, period, Some(id)).await? {
            tx.rollback().await?;
            return Ok(Reservation::Conflict { existing });
        }

        save_booking(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(Reservation::Reserved(booking))
    }

    async fn do_cancel(&self, id: Uuid, effects: BookingEffects) -> PgResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let mut booking = booking_for_update(&mut tx, id).await?;
        booking.cancel()?;
        save_booking(&mut tx, &booking).await?;

        let parties = load_parties(&mut tx, id).await?.ok_or(PgError::NotFound("Booking"))?;
        write_side_effects(&mut tx, effects(&booking, &parties)).await?;

        tx.commit().await?;
        Ok(booking)
    }

    async fn fetch_many(&self, filter: &str, id: Option<Uuid>) -> PgResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings b JOIN hostels h ON h.id = b.hostel_id {} ORDER BY b.created_at DESC",
            BOOKING_COLUMNS, filter
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql).bind(id).fetch_all(&self.pool).await?;
        rows_into_bookings(rows)
    }
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn reserve(&self, booking: NewBooking, effects: BookingEffects) -> RepoResult<Reservation> {
        Ok(self.do_reserve(booking, effects).await?)
    }

    async fn reschedule(&self, id: Uuid, period: StayPeriod) -> RepoResult<Reservation> {
        Ok(self.do_reschedule(id, period).await?)
    }

    async fn cancel(&self, id: Uuid, effects: BookingEffects) -> RepoResult<Booking> {
        Ok(self.do_cancel(id, effects).await?)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings b WHERE b.id = $1", BOOKING_COLUMNS);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(row.map(BookingRow::into_booking).transpose()?)
    }

    async fn parties(&self, booking_id: Uuid) -> RepoResult<Option<BookingParties>> {
        let mut conn = self.pool.acquire().await.map_err(PgError::from)?;
        Ok(load_parties(&mut conn, booking_id).await?)
    }

    async fn list_for_student(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        Ok(self.fetch_many("WHERE b.user_id = $1", Some(user_id)).await?)
    }

    async fn list_for_landlord(&self, landlord_id: Uuid) -> RepoResult<Vec<Booking>> {
        Ok(self.fetch_many("WHERE h.landlord_id = $1", Some(landlord_id)).await?)
    }

    async fn list_all(&self) -> RepoResult<Vec<Booking>> {
        Ok(self.fetch_many("WHERE $1::uuid IS NULL", None).await?)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| guard_payments(e, "Booking"))?;
        Ok(result.rows_affected() > 0)
    }
}
