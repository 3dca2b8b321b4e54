use async_trait::async_trait;
use ingest_core::connectors::{
    ConnectorError, ConnectorResult, ObjectLister, StepStatusSource, StepSubmitter,
    WarehouseExecutor,
};
use ingest_core::error::{PipelineError, PipelineResult};
use ingest_core::orchestration::{
    ClusterId, MissingInput, Notifier, StepDefinition, StepId, StepStatus, WarehouseTarget,
};
use ingest_core::partition::PartitionKey;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Returns the same listing for every prefix and records each call
#[derive(Debug, Default)]
pub struct StaticLister {
    keys: Vec<String>,
    error: Option<String>,
    pub calls: Mutex<Vec<ListCall>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    pub bucket: String,
    pub prefix: String,
    pub delimiter: Option<String>,
}

impl StaticLister {
    pub fn with_keys(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.prefix.clone()).collect()
    }
}

#[async_trait]
impl ObjectLister for StaticLister {
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> ConnectorResult<Vec<String>> {
        self.calls.lock().push(ListCall {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: delimiter.map(str::to_owned),
        });
        match &self.error {
            Some(reason) => Err(ConnectorError::Other(reason.clone())),
            None => Ok(self.keys.clone()),
        }
    }
}

/// Cluster double with preset step ids and a scripted status sequence.
///
/// Statuses are consumed one per poll; the last one repeats.
#[derive(Debug, Default)]
pub struct ScriptedCluster {
    ids: Vec<StepId>,
    reject: Option<String>,
    statuses: Mutex<VecDeque<StepStatus>>,
    pub submissions: Mutex<Vec<(ClusterId, Vec<StepDefinition>)>>,
    pub polled: Mutex<Vec<StepId>>,
}

impl ScriptedCluster {
    pub fn new(ids: &[&str], statuses: &[StepStatus]) -> Self {
        Self {
            ids: ids.iter().map(|id| StepId::from(*id)).collect(),
            statuses: Mutex::new(statuses.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.polled.lock().iter().map(|id| id.to_string()).collect()
    }
}

#[async_trait]
impl StepSubmitter for ScriptedCluster {
    async fn add_steps(
        &self,
        cluster_id: &ClusterId,
        steps: &[StepDefinition],
    ) -> ConnectorResult<Vec<StepId>> {
        if let Some(reason) = &self.reject {
            return Err(ConnectorError::ClusterNotAcceptingSteps {
                cluster_id: cluster_id.to_string(),
                state: reason.clone(),
            });
        }
        self.submissions
            .lock()
            .push((cluster_id.clone(), steps.to_vec()));
        Ok(self.ids.clone())
    }
}

#[async_trait]
impl StepStatusSource for ScriptedCluster {
    async fn step_status(
        &self,
        cluster_id: &ClusterId,
        step_id: &StepId,
    ) -> ConnectorResult<StepStatus> {
        self.polled.lock().push(step_id.clone());
        let mut statuses = self.statuses.lock();
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        status.ok_or_else(|| ConnectorError::StepNotFound {
            cluster_id: cluster_id.to_string(),
            step_id: step_id.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    error: Option<String>,
    pub executed: Mutex<Vec<(WarehouseTarget, String)>>,
}

impl RecordingWarehouse {
    pub fn failing(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait]
impl WarehouseExecutor for RecordingWarehouse {
    async fn execute(&self, target: &WarehouseTarget, statement: &str) -> ConnectorResult<()> {
        if let Some(reason) = &self.error {
            return Err(ConnectorError::Other(reason.clone()));
        }
        self.executed
            .lock()
            .push((target.clone(), statement.to_string()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fail: bool,
    pub alerts: Mutex<Vec<(PartitionKey, MissingInput)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_missing(
        &self,
        partition: &PartitionKey,
        missing: &MissingInput,
    ) -> PipelineResult<()> {
        if self.fail {
            return Err(PipelineError::Notification {
                partition: partition.to_string(),
                channel: self.channel().to_string(),
                reason: "webhook returned 503".to_string(),
            });
        }
        self.alerts.lock().push((*partition, missing.clone()));
        Ok(())
    }

    fn channel(&self) -> &str {
        "recording"
    }
}
