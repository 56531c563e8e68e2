//! Out-of-band notification hook
//!
//! Confirmation tickets must reach a human operator (chat bot, pager, ...).
//! The safety system only hands them to a `Notifier`; delivery is the
//! implementor's problem.

use super::confirmation::PendingConfirmation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// A ticket was issued and needs operator approval
    async fn confirmation_requested(&self, ticket: &PendingConfirmation);

    /// The emergency stop was triggered
    async fn emergency_stop(&self, reason: &str, at: DateTime<Utc>);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn confirmation_requested(&self, ticket: &PendingConfirmation) {
        tracing::warn!(
            confirmation_id = %ticket.id,
            operation = %ticket.operation,
            risk_level = %ticket.risk_level,
            expires_at = %ticket.expires_at,
            "Operator confirmation required"
        );
    }

    async fn emergency_stop(&self, reason: &str, at: DateTime<Utc>) {
        tracing::error!(reason = reason, at = %at, "EMERGENCY STOP");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every notification for assertions
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub tickets: Mutex<Vec<PendingConfirmation>>,
        pub stops: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn confirmation_requested(&self, ticket: &PendingConfirmation) {
            self.tickets.lock().await.push(ticket.clone());
        }

        async fn emergency_stop(&self, reason: &str, _at: DateTime<Utc>) {
            self.stops.lock().await.push(reason.to_string());
        }
    }
}
