//! # Missing Input Notifier
//!
//! Alert sink for partitions whose landing prefix is empty. The pipeline only
//! depends on the [`Notifier`] trait; [`LoggingNotifier`] emits a structured
//! warning and [`DedupNotifier`] makes any sink idempotent per partition.

use crate::error::{PipelineError, PipelineResult};
use crate::partition::PartitionKey;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Where the input was expected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingInput {
    pub bucket: String,
    pub prefix: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Alert that no input landed for `partition`
    async fn notify_missing(
        &self,
        partition: &PartitionKey,
        missing: &MissingInput,
    ) -> PipelineResult<()>;

    /// Channel name used in logs and notification errors
    fn channel(&self) -> &str;
}

/// Emits the alert as a `warn` event
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_missing(
        &self,
        partition: &PartitionKey,
        missing: &MissingInput,
    ) -> PipelineResult<()> {
        warn!(
            partition = %partition,
            bucket = %missing.bucket,
            prefix = %missing.prefix,
            "No input files found for partition"
        );
        Ok(())
    }

    fn channel(&self) -> &str {
        "log"
    }
}

/// Forwards only the first alert per partition for the life of the process
pub struct DedupNotifier<N> {
    inner: N,
    sent: Mutex<HashSet<PartitionKey>>,
}

impl<N: Notifier> DedupNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self {
            inner,
            sent: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }

    pub fn already_notified(&self, partition: &PartitionKey) -> bool {
        self.sent.lock().contains(partition)
    }
}

#[async_trait]
impl<N: Notifier> Notifier for DedupNotifier<N> {
    async fn notify_missing(
        &self,
        partition: &PartitionKey,
        missing: &MissingInput,
    ) -> PipelineResult<()> {
        // Claim the partition before the await so concurrent callers cannot both forward
        if !self.sent.lock().insert(*partition) {
            debug!(partition = %partition, "Missing-input alert already sent");
            return Ok(());
        }

        match self.inner.notify_missing(partition, missing).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.sent.lock().remove(partition);
                Err(err)
            }
        }
    }

    fn channel(&self) -> &str {
        self.inner.channel()
    }
}

/// Build a notification error for `notifier`
pub fn notification_error(
    notifier: &dyn Notifier,
    partition: &PartitionKey,
    reason: impl Into<String>,
) -> PipelineError {
    PipelineError::Notification {
        partition: partition.to_string(),
        channel: notifier.channel().to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify_missing(
            &self,
            partition: &PartitionKey,
            _missing: &MissingInput,
        ) -> PipelineResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(notification_error(self, partition, "channel unavailable"));
            }
            Ok(())
        }

        fn channel(&self) -> &str {
            "counting"
        }
    }

    fn missing() -> MissingInput {
        MissingInput {
            bucket: "landing".to_string(),
            prefix: "2024/01/05".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dedup_forwards_once_per_partition() {
        let notifier = DedupNotifier::new(CountingNotifier::default());
        let day = PartitionKey::parse("2024-01-05").unwrap();
        let next = PartitionKey::parse("2024-01-06").unwrap();

        notifier.notify_missing(&day, &missing()).await.unwrap();
        notifier.notify_missing(&day, &missing()).await.unwrap();
        notifier.notify_missing(&next, &missing()).await.unwrap();

        assert_eq!(notifier.inner().calls.load(Ordering::SeqCst), 2);
        assert!(notifier.already_notified(&day));
        assert_eq!(notifier.channel(), "counting");
    }

    #[tokio::test]
    async fn test_failed_alert_can_be_retried() {
        let notifier = DedupNotifier::new(CountingNotifier {
            fail_first: true,
            ..Default::default()
        });
        let day = PartitionKey::parse("2024-01-05").unwrap();

        let err = notifier.notify_missing(&day, &missing()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Notification { .. }));
        assert!(!notifier.already_notified(&day));

        notifier.notify_missing(&day, &missing()).await.unwrap();
        assert_eq!(notifier.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logging_notifier_never_fails() {
        let day = PartitionKey::parse("2024-01-05").unwrap();
        LoggingNotifier::new()
            .notify_missing(&day, &missing())
            .await
            .unwrap();
    }
}
