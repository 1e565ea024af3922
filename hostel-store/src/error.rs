use hostel_core::repository::StoreError;
use hostel_core::{ParseStatusError, TransitionError};

/// Failures inside the Postgres repositories, folded into `StoreError` at
/// the trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum PgError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Status(#[from] ParseStatusError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} has payment records")]
    HasPayments(&'static str),
}

impl From<PgError> for StoreError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::NotFound(what) => StoreError::NotFound(what),
            PgError::Transition(t) => StoreError::Transition(t),
            PgError::HasPayments(what) => StoreError::HasPayments(what),
            other => StoreError::backend(other),
        }
    }
}

pub(crate) type PgResult<T> = Result<T, PgError>;

/// Deleting a row whose bookings still carry payments trips the
/// `ON DELETE RESTRICT` on `payments.booking_id`.
pub(crate) fn guard_payments(err: sqlx::Error, what: &'static str) -> PgError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => PgError::HasPayments(what),
        _ => PgError::Sql(err),
    }
}

/// Postgres SQLSTATE for unique and exclusion violations.
pub(crate) fn is_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}
