//! # Ingest Pipeline
//!
//! Wires the stages of one daily run and drives the run state machine:
//!
//! ```text
//! list_objects -> check_input_exists -> notify_missing_input
//!                                    \-> trigger_batch -> add_steps -> wait_for_step -> load_warehouse
//! ```
//!
//! The listing and the submitted step ids travel between stages through the
//! run's [`RunMessages`]. Only the first submitted step is waited on.
//!
//! A run never retries. Any stage error moves the run to `failed` and is kept
//! on the [`RunReport`]. Dropping the run future leaves already submitted
//! steps running on the cluster; their ids are logged at submission.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ingest_core::config::PipelineConfig;
//! use ingest_core::connectors::{FsObjectLister, LocalCluster, PgWarehouse};
//! use ingest_core::orchestration::{IngestPipeline, LoggingNotifier, PipelineConnectors};
//! use ingest_core::partition::PartitionKey;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(PipelineConfig::default());
//! let cluster = Arc::new(LocalCluster::spawn(config.cluster.id.clone()));
//! let connectors = PipelineConnectors {
//!     lister: Arc::new(FsObjectLister::new(&config.storage.root)),
//!     submitter: cluster.clone(),
//!     status: cluster,
//!     warehouse: Arc::new(PgWarehouse::connect_lazy("postgresql://localhost/sales_db")?),
//!     notifier: Arc::new(LoggingNotifier::new()),
//! };
//!
//! let pipeline = IngestPipeline::new(config, connectors);
//! let report = pipeline.run(PartitionKey::parse("2024-01-05")?).await;
//! println!("{} finished as {}", report.partition, report.final_state);
//! # Ok(())
//! # }
//! ```

use crate::config::PipelineConfig;
use crate::connectors::{ObjectLister, StepStatusSource, StepSubmitter, WarehouseExecutor};
use crate::constants::{events, stages};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{log_error, log_run_operation};
use crate::orchestration::gate::{Branch, ExistenceGate};
use crate::orchestration::handoff::{Handoff, RunMessages};
use crate::orchestration::lister::InventoryLister;
use crate::orchestration::loader::WarehouseLoader;
use crate::orchestration::notifier::{MissingInput, Notifier};
use crate::orchestration::submitter::JobSubmitter;
use crate::orchestration::trigger::BatchTrigger;
use crate::orchestration::types::StepId;
use crate::orchestration::waiter::JobWaiter;
use crate::partition::{PartitionKey, RunContext};
use crate::state_machine::{RunEvent, RunState, RunStateMachine, RunTransition};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, instrument, warn};

/// Service implementations the pipeline delegates to
#[derive(Clone)]
pub struct PipelineConnectors {
    pub lister: Arc<dyn ObjectLister>,
    pub submitter: Arc<dyn StepSubmitter>,
    pub status: Arc<dyn StepStatusSource>,
    pub warehouse: Arc<dyn WarehouseExecutor>,
    pub notifier: Arc<dyn Notifier>,
}

/// Single-permit slot that keeps runs of one pipeline strictly serial
#[derive(Debug, Clone)]
pub struct RunSlot {
    permits: Arc<Semaphore>,
}

impl Default for RunSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait until no other run holds the slot
    pub async fn acquire(&self) -> PipelineResult<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::RunSlotBusy)
    }

    pub fn try_acquire(&self) -> PipelineResult<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| PipelineError::RunSlotBusy)
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

/// Outcome of one run
#[derive(Debug)]
pub struct RunReport {
    pub partition: PartitionKey,
    pub final_state: RunState,
    /// `None` when the run failed before the gate
    pub branch: Option<Branch>,
    pub submitted_steps: Vec<StepId>,
    pub waited_step: Option<StepId>,
    pub transitions: Vec<RunTransition>,
    pub failure: Option<PipelineError>,
    /// Stage that was running when the run failed
    pub failed_stage: Option<&'static str>,
}

impl RunReport {
    /// Report for a run that never started because the slot was unavailable
    pub fn rejected(partition: PartitionKey, error: PipelineError) -> Self {
        Self {
            partition,
            final_state: RunState::Pending,
            branch: None,
            submitted_steps: Vec::new(),
            waited_step: None,
            transitions: Vec::new(),
            failure: Some(error),
            failed_stage: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.final_state.is_success()
    }

    /// Turn a failed report into its error
    pub fn into_result(mut self) -> PipelineResult<Self> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// JSON view for operator output
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "partition": self.partition,
            "final_state": self.final_state,
            "branch": self.branch,
            "submitted_steps": self.submitted_steps,
            "waited_step": self.waited_step,
            "transitions": self.transitions,
            "failure": self.failure.as_ref().map(|e| json!({
                "category": e.category(),
                "stage": self.failed_stage,
                "message": e.to_string(),
            })),
        })
    }
}

/// Mutable bookkeeping of one run in flight
struct RunProgress {
    machine: RunStateMachine,
    messages: RunMessages,
    branch: Option<Branch>,
    submitted: Vec<StepId>,
    waited: Option<StepId>,
    stage: &'static str,
}

impl RunProgress {
    fn new(partition: PartitionKey) -> Self {
        Self {
            machine: RunStateMachine::new(partition),
            messages: RunMessages::new(),
            branch: None,
            submitted: Vec::new(),
            waited: None,
            stage: stages::LIST_OBJECTS,
        }
    }

    fn enter(&mut self, stage: &'static str) {
        self.stage = stage;
    }

    fn into_report(self, failure: Option<PipelineError>) -> RunReport {
        let failed_stage = failure.as_ref().map(|_| self.stage);
        RunReport {
            partition: self.machine.partition(),
            final_state: self.machine.current_state(),
            branch: self.branch,
            submitted_steps: self.submitted,
            waited_step: self.waited,
            transitions: self.machine.into_history(),
            failure,
            failed_stage,
        }
    }
}

pub struct IngestPipeline {
    config: Arc<PipelineConfig>,
    lister: InventoryLister,
    notifier: Arc<dyn Notifier>,
    trigger: BatchTrigger,
    submitter: JobSubmitter,
    waiter: JobWaiter,
    loader: WarehouseLoader,
    slot: RunSlot,
}

impl IngestPipeline {
    pub fn new(config: Arc<PipelineConfig>, connectors: PipelineConnectors) -> Self {
        Self::with_run_slot(config, connectors, RunSlot::new())
    }

    /// Share one slot between pipelines that must not overlap
    pub fn with_run_slot(
        config: Arc<PipelineConfig>,
        connectors: PipelineConnectors,
        slot: RunSlot,
    ) -> Self {
        let cluster_id = config.cluster.id.clone();
        Self {
            lister: InventoryLister::new(connectors.lister),
            notifier: connectors.notifier,
            trigger: BatchTrigger::from_config(&config),
            submitter: JobSubmitter::new(cluster_id.clone(), connectors.submitter),
            waiter: JobWaiter::new(
                cluster_id,
                connectors.status,
                config.waiter.poll_interval(),
                config.waiter.timeout(),
            ),
            loader: WarehouseLoader::new(connectors.warehouse),
            slot,
            config,
        }
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    pub fn run_slot(&self) -> &RunSlot {
        &self.slot
    }

    /// Run one partition, waiting for the run slot first
    pub async fn run(&self, partition: PartitionKey) -> RunReport {
        let _permit = match self.slot.acquire().await {
            Ok(permit) => permit,
            Err(err) => return RunReport::rejected(partition, err),
        };
        self.execute(partition).await
    }

    /// Run one partition, failing fast when another run holds the slot
    pub async fn try_run(&self, partition: PartitionKey) -> PipelineResult<RunReport> {
        let _permit = self.slot.try_acquire()?;
        Ok(self.execute(partition).await)
    }

    #[instrument(skip_all, fields(partition = %partition))]
    async fn execute(&self, partition: PartitionKey) -> RunReport {
        let ctx = RunContext::new(partition, self.config.clone());
        let mut progress = RunProgress::new(partition);
        let ds = partition.to_string();

        log_run_operation(events::RUN_STARTED, &ds, RunState::Pending.to_string().as_str(), None);

        let failure = match self.drive(&ctx, &mut progress).await {
            Ok(()) => None,
            Err(err) => {
                log_error(progress.stage, &ds, err.category(), &err.to_string());

                if !progress.machine.is_terminal() {
                    if let Err(transition_err) = progress
                        .machine
                        .transition(RunEvent::fail_with_error(err.to_string()))
                    {
                        warn!(error = %transition_err, "Could not record run failure");
                    }
                }
                log_run_operation(
                    events::RUN_FAILED,
                    &ds,
                    progress.machine.current_state().to_string().as_str(),
                    Some(err.category()),
                );
                Some(err)
            }
        };

        progress.into_report(failure)
    }

    async fn drive(&self, ctx: &RunContext, progress: &mut RunProgress) -> PipelineResult<()> {
        let partition = ctx.partition();

        progress.enter(stages::LIST_OBJECTS);
        let listing = self.lister.list(ctx).await?;
        progress.messages.push(Handoff::Listing, &listing)?;
        progress.machine.transition(RunEvent::List)?;

        progress.enter(stages::CHECK_INPUT_EXISTS);
        let branch = ExistenceGate::decide_from(&progress.messages);
        progress.branch = Some(branch);
        info!(
            stage = stages::CHECK_INPUT_EXISTS,
            partition = %partition,
            branch = %branch,
            files = listing.len(),
            "Existence gate decided"
        );

        match branch {
            Branch::Notify => {
                progress.enter(stages::NOTIFY_MISSING_INPUT);
                let missing = MissingInput {
                    bucket: ctx.bucket().to_string(),
                    prefix: partition.storage_prefix(),
                };
                self.notifier.notify_missing(&partition, &missing).await?;
                let state = progress.machine.transition(RunEvent::Notify)?;
                log_run_operation(
                    events::RUN_NOTIFIED,
                    &partition.to_string(),
                    state.to_string().as_str(),
                    Some(self.notifier.channel()),
                );
            }
            Branch::Process => {
                progress.enter(stages::TRIGGER_BATCH);
                let steps = self.trigger.render(ctx)?;
                progress.machine.transition(RunEvent::Trigger)?;

                progress.enter(stages::ADD_STEPS);
                let ids = self.submitter.submit(&partition, &steps).await?;
                progress.messages.push(Handoff::SubmittedSteps, &ids)?;
                progress.submitted = ids;
                progress.machine.transition(RunEvent::Submit)?;

                let step_id = first_submitted_step(&progress.messages).ok_or_else(|| {
                    PipelineError::Submission {
                        cluster_id: self.submitter.cluster_id().to_string(),
                        reason: "no step id handed off to the waiter".to_string(),
                    }
                })?;
                progress.enter(stages::WAIT_FOR_STEP);
                progress.waited = Some(step_id.clone());
                progress.machine.transition(RunEvent::Wait)?;

                self.waiter.wait(&partition, &step_id).await?;
                progress.enter(stages::LOAD_WAREHOUSE);
                let target = self.loader.load(ctx).await?;
                let state = progress.machine.transition(RunEvent::Load)?;
                log_run_operation(
                    events::RUN_LOADED,
                    &partition.to_string(),
                    state.to_string().as_str(),
                    Some(target.to_string().as_str()),
                );
            }
        }

        Ok(())
    }
}

fn first_submitted_step(messages: &RunMessages) -> Option<StepId> {
    let value = messages.pull(Handoff::SubmittedSteps)?.clone();
    serde_json::from_value::<Vec<StepId>>(value)
        .ok()?
        .into_iter()
        .next()
}
