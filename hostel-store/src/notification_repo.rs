use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hostel_core::notification::{Notification, OutboxEntry, OutboxStatus, SideEffects};
use hostel_core::repository::{NotificationRepository, OutboxRepository, RepoResult};
use hostel_shared::EmailMessage;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{PgError, PgResult};

/// How long a claimed outbox row stays invisible to other dispatchers.
const CLAIM_LEASE_SECONDS: i64 = 300;

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    title: String,
    message: String,
    is_read: bool,
    booking_id: Option<Uuid>,
    student_id: Option<Uuid>,
    hostel_id: Option<Uuid>,
    room_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> PgResult<Notification> {
        Ok(Notification {
            id: self.id,
            recipient_id: self.recipient_id,
            kind: self.kind.parse()?,
            title: self.title,
            message: self.message,
            is_read: self.is_read,
            booking_id: self.booking_id,
            student_id: self.student_id,
            hostel_id: self.hostel_id,
            room_id: self.room_id,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    next_attempt_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl OutboxRow {
    fn into_entry(self) -> PgResult<OutboxEntry> {
        let message: EmailMessage = serde_json::from_value(self.payload)?;
        Ok(OutboxEntry {
            id: self.id,
            message,
            status: self.status.parse()?,
            attempts: self.attempts,
            last_error: self.last_error,
            next_attempt_at: self.next_attempt_at,
            created_at: self.created_at,
        })
    }
}

/// Writes notifications and queues e-mails inside the caller's transaction.
pub(crate) async fn write_side_effects(tx: &mut Transaction<'_, Postgres>, effects: SideEffects) -> PgResult<()> {
    for n in effects.notifications {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, title, message, booking_id, student_id, hostel_id, room_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(n.recipient_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.booking_id)
        .bind(n.student_id)
        .bind(n.hostel_id)
        .bind(n.room_id)
        .execute(&mut **tx)
        .await?;
    }

    for message in effects.emails {
        let payload = serde_json::to_value(&message)?;
        sqlx::query("INSERT INTO outbox (id, kind, payload) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(message.kind.as_str())
            .bind(payload)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

pub struct StoreNotificationRepository {
    pool: PgPool,
}

impl StoreNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for StoreNotificationRepository {
    async fn list(&self, recipient_id: Uuid, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, recipient_id, kind, title, message, is_read, booking_id, student_id, hostel_id, room_id, created_at
            FROM notifications
            WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(PgError::from)?;

        let notifications = rows
            .into_iter()
            .map(NotificationRow::into_notification)
            .collect::<PgResult<Vec<_>>>()?;
        Ok(notifications)
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE")
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(PgError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct StoreOutboxRepository {
    pool: PgPool,
}

impl StoreOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn claim(&self, limit: i64) -> PgResult<Vec<OutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            UPDATE outbox
            SET next_attempt_at = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id FROM outbox
                WHERE status = 'pending' AND next_attempt_at <= NOW()
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, status, attempts, last_error, next_attempt_at, created_at
            "#,
        )
        .bind(limit)
        .bind(CLAIM_LEASE_SECONDS as f64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OutboxRow::into_entry).collect()
    }

    async fn update(&self, id: Uuid, status: &str, error: Option<&str>, next_attempt_at: Option<DateTime<Utc>>) -> PgResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET status = $2,
                attempts = CASE WHEN $3::text IS NULL THEN attempts ELSE attempts + 1 END,
                last_error = COALESCE($3, last_error),
                next_attempt_at = COALESCE($4, next_attempt_at),
                delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for StoreOutboxRepository {
    async fn claim_due(&self, limit: i64) -> RepoResult<Vec<OutboxEntry>> {
        Ok(self.claim(limit).await?)
    }

    async fn mark_delivered(&self, id: Uuid) -> RepoResult<()> {
        Ok(self.update(id, OutboxStatus::Delivered.as_str(), None, None).await?)
    }

    async fn retry_later(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> RepoResult<()> {
        Ok(self
            .update(id, OutboxStatus::Pending.as_str(), Some(error), Some(next_attempt_at))
            .await?)
    }

    async fn mark_dead(&self, id: Uuid, error: &str) -> RepoResult<()> {
        Ok(self.update(id, OutboxStatus::Dead.as_str(), Some(error), None).await?)
    }
}
