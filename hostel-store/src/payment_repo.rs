use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::booking::Credit;
use hostel_core::payment::{Checkout, NewPayment, Payment, PaymentConfirmation, PaymentRecordStatus};
use hostel_core::repository::{
    PaymentRepository, PaymentSlot, RepoResult, Settlement, SettlementEffects, SettlementOutcome,
};
use hostel_core::TransitionError;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::booking_repo::{booking_for_update, confirmed_overlap, load_parties, lock_room, save_booking};
use crate::error::{is_constraint_violation, PgError, PgResult};
use crate::notification_repo::write_side_effects;

const PAYMENT_COLUMNS: &str = "id, booking_id, user_id, reference, amount, currency, payment_method, email, status, \
     landlord_percent, platform_percent, checkout_url, access_code, channel, failure_reason, paid_at, \
     created_at, updated_at";

const ONE_PENDING_INDEX: &str = "payments_one_pending_per_booking";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    user_id: Uuid,
    reference: String,
    amount: Decimal,
    currency: String,
    payment_method: String,
    email: String,
    status: String,
    landlord_percent: Decimal,
    platform_percent: Decimal,
    checkout_url: Option<String>,
    access_code: Option<String>,
    channel: Option<String>,
    failure_reason: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> PgResult<Payment> {
        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            reference: self.reference,
            amount: self.amount,
            currency: self.currency,
            payment_method: self.payment_method.parse()?,
            email: self.email,
            status: self.status.parse()?,
            landlord_percent: self.landlord_percent,
            platform_percent: self.platform_percent,
            checkout_url: self.checkout_url,
            access_code: self.access_code,
            channel: self.channel,
            failure_reason: self.failure_reason,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn pending_for_booking(conn: &mut PgConnection, booking_id: Uuid) -> PgResult<Option<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments WHERE booking_id = $1 AND status = 'pending'",
        PAYMENT_COLUMNS
    );
    let row: Option<PaymentRow> = sqlx::query_as(&sql).bind(booking_id).fetch_optional(conn).await?;
    row.map(PaymentRow::into_payment).transpose()
}

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn do_open(&self, new: NewPayment, abandoned_before: DateTime<Utc>) -> PgResult<PaymentSlot> {
        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', failure_reason = 'abandoned', updated_at = NOW()
            WHERE booking_id = $1 AND status = 'pending' AND created_at <= $2
            "#,
        )
        .bind(new.booking_id)
        .bind(abandoned_before)
        .execute(&mut *tx)
        .await?;
        if expired.rows_affected() > 0 {
            debug!(booking_id = %new.booking_id, "Expired abandoned pending payment");
        }

        if let Some(existing) = pending_for_booking(&mut tx, new.booking_id).await? {
            tx.commit().await?;
            return Ok(PaymentSlot::Existing(existing));
        }

        let payment = new.into_payment(Uuid::new_v4());
        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, user_id, reference, amount, currency, payment_method, email, status,
                                  landlord_percent, platform_percent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.user_id)
        .bind(&payment.reference)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.payment_method.as_str())
        .bind(&payment.email)
        .bind(payment.status.as_str())
        .bind(payment.landlord_percent)
        .bind(payment.platform_percent)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(PaymentSlot::Opened(payment))
            }
            // A concurrent initialisation won the partial unique index.
            Err(e) if is_constraint_violation(&e, ONE_PENDING_INDEX) => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let existing = pending_for_booking(&mut conn, payment.booking_id)
                    .await?
                    .ok_or(PgError::Sql(e))?;
                Ok(PaymentSlot::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn do_settle(
        &self,
        reference: &str,
        confirmation: &PaymentConfirmation,
        effects: SettlementEffects,
    ) -> PgResult<Settlement> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM payments WHERE reference = $1 FOR UPDATE", PAYMENT_COLUMNS);
        let row: Option<PaymentRow> = sqlx::query_as(&sql).bind(reference).fetch_optional(&mut *tx).await?;
        let mut payment = row.ok_or(PgError::NotFound("Payment"))?.into_payment()?;

        let mut booking = booking_for_update(&mut tx, payment.booking_id).await?;
        let parties = load_parties(&mut tx, booking.id)
            .await?
            .ok_or(PgError::NotFound("Booking"))?;

        if payment.status == PaymentRecordStatus::Successful {
            tx.commit().await?;
            return Ok(Settlement {
                payment,
                booking,
                parties,
                outcome: SettlementOutcome::AlreadySettled,
            });
        }

        payment.apply_confirmation(confirmation);
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, amount = $3, currency = $4, email = $5, channel = $6, paid_at = $7,
                failure_reason = NULL, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.email)
        .bind(&payment.channel)
        .bind(payment.paid_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await?;

        let outcome = match booking.credit(confirmation.amount) {
            Err(TransitionError::NotPayable { .. }) => SettlementOutcome::NotPayable,
            Err(e) => return Err(e.into()),
            Ok(Credit::Partial { remaining }) => SettlementOutcome::PartiallyPaid { remaining },
            Ok(Credit::FullyPaid) => {
                lock_room(&mut tx, booking.room_id).await?;
                match confirmed_overlap(&mut tx, booking.room_id, booking.period(), Some(booking.id)).await? {
                    Some(conflicting) => SettlementOutcome::RoomUnavailable {
                        conflicting_booking_id: conflicting.id,
                    },
                    None => {
                        booking.confirm()?;
                        SettlementOutcome::Confirmed
                    }
                }
            }
        };

        if outcome != SettlementOutcome::NotPayable {
            save_booking(&mut tx, &booking).await?;
        }

        let settlement = Settlement {
            payment,
            booking,
            parties,
            outcome,
        };
        write_side_effects(&mut tx, effects(&settlement)).await?;

        tx.commit().await?;
        Ok(settlement)
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn open(&self, payment: NewPayment, abandoned_before: DateTime<Utc>) -> RepoResult<PaymentSlot> {
        Ok(self.do_open(payment, abandoned_before).await?)
    }

    async fn attach_checkout(&self, payment_id: Uuid, checkout: &Checkout) -> RepoResult<()> {
        sqlx::query("UPDATE payments SET checkout_url = $2, access_code = $3, updated_at = NOW() WHERE id = $1")
            .bind(payment_id)
            .bind(&checkout.authorization_url)
            .bind(&checkout.access_code)
            .execute(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(())
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> RepoResult<()> {
        sqlx::query(
            "UPDATE payments SET status = 'failed', failure_reason = $2, updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(PgError::from)?;
        Ok(())
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE reference = $1", PAYMENT_COLUMNS);
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(row.map(PaymentRow::into_payment).transpose()?)
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE booking_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(rows.into_iter().map(PaymentRow::into_payment).collect::<PgResult<Vec<_>>>()?)
    }

    async fn settle(
        &self,
        reference: &str,
        confirmation: &PaymentConfirmation,
        effects: SettlementEffects,
    ) -> RepoResult<Settlement> {
        Ok(self.do_settle(reference, confirmation, effects).await?)
    }
}
