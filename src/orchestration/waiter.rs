//! # Job Waiter
//!
//! Polls one submitted step until the cluster reports a terminal status. Only
//! `COMPLETED` lets the run continue; every other terminal status, a polling
//! error, or an expired timeout fails the run. Nothing is retried.

use crate::connectors::StepStatusSource;
use crate::constants::events;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::log_step_operation;
use crate::orchestration::types::{ClusterId, StepId, StepStatus};
use crate::partition::PartitionKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct JobWaiter {
    cluster_id: ClusterId,
    status: Arc<dyn StepStatusSource>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl JobWaiter {
    pub fn new(
        cluster_id: ClusterId,
        status: Arc<dyn StepStatusSource>,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            cluster_id,
            status,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for `step_id` to finish; returns the successful terminal status
    pub async fn wait(
        &self,
        partition: &PartitionKey,
        step_id: &StepId,
    ) -> PipelineResult<StepStatus> {
        let status = match self.timeout {
            Some(limit) => time::timeout(limit, self.poll_until_terminal(partition, step_id))
                .await
                .map_err(|_| {
                    self.error(
                        step_id,
                        None,
                        format!("no terminal status within {}s", limit.as_secs_f64()),
                    )
                })??,
            None => self.poll_until_terminal(partition, step_id).await?,
        };

        log_step_operation(
            events::STEP_TERMINAL,
            &partition.to_string(),
            self.cluster_id.as_str(),
            Some(step_id.as_str()),
            &status.to_string(),
            None,
        );

        if status.is_success() {
            Ok(status)
        } else {
            Err(self.error(
                step_id,
                Some(status),
                format!("step reached terminal state {status}"),
            ))
        }
    }

    async fn poll_until_terminal(
        &self,
        partition: &PartitionKey,
        step_id: &StepId,
    ) -> PipelineResult<StepStatus> {
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<StepStatus> = None;

        loop {
            ticker.tick().await;

            let status = self
                .status
                .step_status(&self.cluster_id, step_id)
                .await
                .map_err(|e| self.error(step_id, last, format!("status poll failed: {e}")))?;

            if last != Some(status) {
                debug!(
                    event = events::STEP_STATUS_CHANGED,
                    partition = %partition,
                    step_id = %step_id,
                    status = %status,
                    "Step status changed"
                );
                last = Some(status);
            }

            if status.is_terminal() {
                return Ok(status);
            }
        }
    }

    fn error(
        &self,
        step_id: &StepId,
        status: Option<StepStatus>,
        reason: impl Into<String>,
    ) -> PipelineError {
        PipelineError::Processing {
            cluster_id: self.cluster_id.to_string(),
            step_id: step_id.to_string(),
            status,
            reason: reason.into(),
        }
    }
}
