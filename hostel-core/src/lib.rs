/// Declares a status enum stored as lowercase text, with `as_str`, `FromStr`
/// and `Display` matching the serde representation.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::ParseStatusError::new($kind, other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod booking;
pub mod document;
pub mod fees;
pub mod listing;
pub mod mail;
pub mod notification;
pub mod payment;
pub mod repository;
pub mod user;

pub use booking::TransitionError;

use payment::{GatewayError, Payment};
use repository::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("A pending payment already exists for this booking")]
    PendingPaymentExists(Box<Payment>),
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),
    #[error("Payment gateway error: {0}")]
    Upstream(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(format!("{} not found", what)),
            StoreError::Transition(t) => CoreError::Conflict(t.to_string()),
            StoreError::HasPayments(what) => {
                CoreError::Conflict(format!("{} has payment records and cannot be deleted", what))
            }
            StoreError::Backend(e) => CoreError::InternalError(e.to_string()),
        }
    }
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::Upstream(err.to_string())
    }
}

/// A status string read back from storage did not match any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseStatusError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}
