use async_trait::async_trait;
use hostel_core::mail::{MailError, Mailer};
use hostel_shared::{EmailMessage, Masked};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::app_config::SmtpConfig;

/// Delivers outbox e-mails over SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(config.from_email.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        Ok(Self { transport, from })
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, MailError> {
        let to = match &message.recipient_name {
            Some(name) => format!("{} <{}>", name, message.to),
            None => message.to.clone(),
        };
        let to = to
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(Masked(message.to.as_str()).redacted()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = self.build(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!(kind = message.kind.as_str(), to = %Masked(message.to.as_str()), "E-mail sent");
        Ok(())
    }
}
