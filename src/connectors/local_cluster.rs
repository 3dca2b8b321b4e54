//! In-process stand-in for a long-lived compute cluster.
//!
//! The cluster has a fixed identifier and is never provisioned or released by
//! the pipeline. Steps run one at a time in submission order as subprocesses:
//! the first argument is the program, the rest are passed through, which is
//! how `command-runner.jar` steps behave on a managed cluster.
//!
//! A step that is already running keeps running when the worker is dropped.
//! Only the most recent terminal step records are kept; older ones are evicted
//! and report as not found.

use super::{ConnectorError, ConnectorResult, StepStatusSource, StepSubmitter};
use crate::constants::DEFAULT_STEP_JAR;
use crate::orchestration::types::{ActionOnFailure, ClusterId, StepDefinition, StepId, StepStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    /// Idle and accepting steps
    Waiting,
    /// Executing a step
    Running,
    /// Shut down; new steps are rejected
    Terminated,
}

impl ClusterState {
    pub fn accepts_steps(&self) -> bool {
        !matches!(self, Self::Terminated)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Terminal step records kept per cluster
pub const DEFAULT_RETAINED_STEPS: usize = 1024;

#[derive(Debug, Clone)]
struct StepRecord {
    seq: u64,
    definition: StepDefinition,
    status: StepStatus,
    failure_reason: Option<String>,
}

#[derive(Debug)]
struct ClusterInner {
    id: ClusterId,
    state: RwLock<ClusterState>,
    steps: DashMap<StepId, StepRecord>,
    next_seq: AtomicU64,
    retained: usize,
}

impl ClusterInner {
    fn set_status(&self, step_id: &StepId, status: StepStatus, failure_reason: Option<String>) {
        if let Some(mut record) = self.steps.get_mut(step_id) {
            record.status = status;
            record.failure_reason = failure_reason;
        }
    }

    /// Evict the oldest terminal records beyond the retention limit
    fn prune(&self) {
        let mut terminal: Vec<(u64, StepId)> = self
            .steps
            .iter()
            .filter(|entry| entry.status.is_terminal())
            .map(|entry| (entry.seq, entry.key().clone()))
            .collect();
        if terminal.len() <= self.retained {
            return;
        }

        terminal.sort_unstable_by_key(|(seq, _)| *seq);
        let excess = terminal.len() - self.retained;
        for (_, step_id) in terminal.into_iter().take(excess) {
            self.steps.remove(&step_id);
        }
    }

    fn terminate(&self) {
        *self.state.write() = ClusterState::Terminated;
        for mut record in self.steps.iter_mut() {
            if record.status == StepStatus::Pending {
                record.status = StepStatus::Cancelled;
            }
        }
    }
}

/// Handle to the local cluster; clones share the same cluster
#[derive(Debug, Clone)]
pub struct LocalCluster {
    inner: Arc<ClusterInner>,
    queue: mpsc::UnboundedSender<StepId>,
}

impl LocalCluster {
    /// Start the cluster's step worker. Must be called inside a tokio runtime.
    pub fn spawn(id: ClusterId) -> Self {
        Self::spawn_with_retention(id, DEFAULT_RETAINED_STEPS)
    }

    /// Like [`LocalCluster::spawn`], keeping at most `retained` terminal step records
    pub fn spawn_with_retention(id: ClusterId, retained: usize) -> Self {
        let inner = Arc::new(ClusterInner {
            id,
            state: RwLock::new(ClusterState::Waiting),
            steps: DashMap::new(),
            next_seq: AtomicU64::new(0),
            retained,
        });
        let (queue, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_steps(Arc::clone(&inner), receiver));

        Self { inner, queue }
    }

    pub fn id(&self) -> &ClusterId {
        &self.inner.id
    }

    pub fn state(&self) -> ClusterState {
        *self.inner.state.read()
    }

    /// Terminate the cluster and cancel every step that has not started
    pub fn terminate(&self) {
        warn!(cluster_id = %self.inner.id, "Terminating cluster");
        self.inner.terminate();
    }

    pub fn failure_reason(&self, step_id: &StepId) -> Option<String> {
        self.inner
            .steps
            .get(step_id)
            .and_then(|record| record.failure_reason.clone())
    }

    fn check_cluster(&self, cluster_id: &ClusterId) -> ConnectorResult<()> {
        if cluster_id != &self.inner.id {
            return Err(ConnectorError::ClusterNotFound(cluster_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StepSubmitter for LocalCluster {
    async fn add_steps(
        &self,
        cluster_id: &ClusterId,
        steps: &[StepDefinition],
    ) -> ConnectorResult<Vec<StepId>> {
        self.check_cluster(cluster_id)?;

        let state = self.state();
        if !state.accepts_steps() {
            return Err(ConnectorError::ClusterNotAcceptingSteps {
                cluster_id: cluster_id.to_string(),
                state: state.to_string(),
            });
        }

        let mut ids = Vec::with_capacity(steps.len());
        for definition in steps {
            let step_id = new_step_id();
            self.inner.steps.insert(
                step_id.clone(),
                StepRecord {
                    seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
                    definition: definition.clone(),
                    status: StepStatus::Pending,
                    failure_reason: None,
                },
            );
            self.queue
                .send(step_id.clone())
                .map_err(|_| ConnectorError::Other("cluster step worker has stopped".to_string()))?;
            ids.push(step_id);
        }

        Ok(ids)
    }
}

#[async_trait]
impl StepStatusSource for LocalCluster {
    async fn step_status(
        &self,
        cluster_id: &ClusterId,
        step_id: &StepId,
    ) -> ConnectorResult<StepStatus> {
        self.check_cluster(cluster_id)?;
        self.inner
            .steps
            .get(step_id)
            .map(|record| record.status)
            .ok_or_else(|| ConnectorError::StepNotFound {
                cluster_id: cluster_id.to_string(),
                step_id: step_id.to_string(),
            })
    }
}

/// `s-` followed by 13 upper-case characters
fn new_step_id() -> StepId {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    StepId::new(format!("s-{}", &raw[..13]))
}

async fn run_steps(inner: Arc<ClusterInner>, mut queue: mpsc::UnboundedReceiver<StepId>) {
    while let Some(step_id) = queue.recv().await {
        let definition = match inner.steps.get(&step_id) {
            Some(record) if record.status == StepStatus::Pending => record.definition.clone(),
            _ => continue,
        };

        *inner.state.write() = ClusterState::Running;
        inner.set_status(&step_id, StepStatus::Running, None);
        info!(cluster_id = %inner.id, step_id = %step_id, step = %definition.name, "Step started");

        match execute_step(&definition).await {
            Ok(()) => {
                inner.set_status(&step_id, StepStatus::Completed, None);
                info!(cluster_id = %inner.id, step_id = %step_id, "Step completed");
            }
            Err(reason) => {
                warn!(
                    cluster_id = %inner.id,
                    step_id = %step_id,
                    action_on_failure = %definition.action_on_failure,
                    reason = %reason,
                    "Step failed"
                );
                inner.set_status(&step_id, StepStatus::Failed, Some(reason));
                if definition.action_on_failure == ActionOnFailure::TerminateCluster {
                    inner.terminate();
                }
            }
        }

        {
            let mut state = inner.state.write();
            if *state == ClusterState::Running {
                *state = ClusterState::Waiting;
            }
        }
        inner.prune();
    }
}

async fn execute_step(definition: &StepDefinition) -> Result<(), String> {
    if definition.jar != DEFAULT_STEP_JAR {
        return Err(format!("unsupported jar '{}'", definition.jar));
    }

    let (program, args) = definition
        .args
        .split_first()
        .ok_or_else(|| "step has no command".to_string())?;

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to start '{program}': {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("exited with {}: {}", output.status, stderr.trim()))
    }
}
