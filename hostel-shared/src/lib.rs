pub mod models;
pub mod pii;

pub use models::outbound::{EmailKind, EmailMessage};
pub use pii::Masked;
