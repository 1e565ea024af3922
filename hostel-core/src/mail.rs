use async_trait::async_trait;
use hostel_shared::EmailMessage;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("message could not be built: {0}")]
    Build(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound e-mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}
