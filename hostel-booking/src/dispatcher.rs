use std::sync::Arc;

use chrono::{Duration, Utc};
use hostel_core::mail::Mailer;
use hostel_core::notification::OutboxEntry;
use hostel_core::repository::{OutboxRepository, RepoResult};
use hostel_shared::Masked;
use tracing::{error, info, warn};

const BASE_BACKOFF_SECONDS: i64 = 30;
const MAX_BACKOFF_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub poll_interval: std::time::Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(10),
            batch_size: 20,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead: usize,
}

/// Delay before the next attempt after `attempts` failed ones:
/// 30s doubled per failure, capped at an hour.
pub fn backoff(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    let seconds = BASE_BACKOFF_SECONDS.saturating_mul(1_i64 << exponent);
    Duration::seconds(seconds.min(MAX_BACKOFF_SECONDS))
}

/// Drains the e-mail outbox written by booking, payment and document
/// transactions.
pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxRepository>,
    mailer: Arc<dyn Mailer>,
    settings: DispatchSettings,
}

impl OutboxDispatcher {
    pub fn new(outbox: Arc<dyn OutboxRepository>, mailer: Arc<dyn Mailer>, settings: DispatchSettings) -> Self {
        Self {
            outbox,
            mailer,
            settings,
        }
    }

    /// One claim-and-send pass over due messages.
    pub async fn dispatch_once(&self) -> RepoResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let entries = self.outbox.claim_due(self.settings.batch_size).await?;

        for entry in entries {
            match self.mailer.send(&entry.message).await {
                Ok(()) => {
                    self.outbox.mark_delivered(entry.id).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    if self.fail(&entry, &e.to_string()).await? {
                        report.dead += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Returns true when the entry has run out of attempts.
    async fn fail(&self, entry: &OutboxEntry, reason: &str) -> RepoResult<bool> {
        let attempts = entry.attempts + 1;
        if attempts >= self.settings.max_attempts {
            error!(
                outbox_id = %entry.id,
                kind = entry.message.kind.as_str(),
                to = %Masked(entry.message.to.as_str()),
                attempts,
                error = %reason,
                "Giving up on e-mail"
            );
            self.outbox.mark_dead(entry.id, reason).await?;
            return Ok(true);
        }

        let next_attempt_at = Utc::now() + backoff(entry.attempts);
        warn!(
            outbox_id = %entry.id,
            kind = entry.message.kind.as_str(),
            attempts,
            next_attempt_at = %next_attempt_at,
            error = %reason,
            "E-mail delivery failed, will retry"
        );
        self.outbox.retry_later(entry.id, reason, next_attempt_at).await?;
        Ok(false)
    }

    /// Poll forever. Storage errors are logged and the loop carries on at
    /// the next tick.
    pub async fn run(self) {
        info!(
            poll_interval = ?self.settings.poll_interval,
            batch_size = self.settings.batch_size,
            "Outbox dispatcher started"
        );
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        loop {
            ticker.tick().await;
            match self.dispatch_once().await {
                Ok(report) if report != DispatchReport::default() => {
                    info!(
                        delivered = report.delivered,
                        retried = report.retried,
                        dead = report.dead,
                        "Outbox pass complete"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Outbox pass failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff(0), Duration::seconds(30));
        assert_eq!(backoff(1), Duration::seconds(60));
        assert_eq!(backoff(3), Duration::seconds(240));
        assert_eq!(backoff(7), Duration::seconds(3600));
        assert_eq!(backoff(40), Duration::seconds(3600));
    }
}
