//! Fans a breach notification out to all configured channels.
//!
//! Individual channel failures are logged and do not block other
//! channels; the scheduler only needs to hand a breach over once.

use crate::traits::{BreachNotification, DispatchResult, Notifier};

/// Dispatches breach notifications to every configured channel.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Create a dispatcher with no channels (breaches are dropped with a
    /// warning).
    pub fn empty() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Deliver a breach to all channels, collecting per-channel results.
    pub async fn dispatch(&self, breach: &BreachNotification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::warn!(
                entity_id = %breach.entity_id,
                target_key = %breach.target_key,
                "no notification channels configured, dropping breach notification"
            );
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(breach).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        entity_id = %breach.entity_id,
                        target_key = %breach.target_key,
                        duration_ms,
                        "breach notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        entity_id = %breach.entity_id,
                        target_key = %breach.target_key,
                        error = %e,
                        duration_ms,
                        "breach notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NotifyError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _breach: &BreachNotification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn breach() -> BreachNotification {
        BreachNotification {
            entity_id: "C-1".to_string(),
            target_key: "respond".to_string(),
            goal_ms: 14_400_000,
            breached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            Box::new(MockNotifier {
                name: "a".to_string(),
                send_count: count_a.clone(),
                should_fail: false,
            }),
            Box::new(MockNotifier {
                name: "b".to_string(),
                send_count: count_b.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher.dispatch(&breach()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
            }),
            Box::new(MockNotifier {
                name: "ok".to_string(),
                send_count: count.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher.dispatch(&breach()).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_dispatcher_returns_no_results() {
        let dispatcher = Dispatcher::empty();
        let results = dispatcher.dispatch(&breach()).await;
        assert!(results.is_empty());
    }
}
