//! Log-only notification channel, the default when no webhook is
//! configured. Breaches still surface in the operational log stream.

use crate::traits::{BreachNotification, Notifier, NotifyError};

#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, breach: &BreachNotification) -> Result<(), NotifyError> {
        tracing::warn!(
            entity_id = %breach.entity_id,
            target_key = %breach.target_key,
            goal_ms = breach.goal_ms,
            breached_at = %breach.breached_at,
            "SLA breached"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
