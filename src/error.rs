//! # Pipeline Errors
//!
//! Error taxonomy for a single ingest run. A missing input file is not an error
//! (the run routes to the notifier); everything below aborts the remainder of
//! the run and is surfaced to the operator. Nothing here is retried.

use crate::config::ConfigurationError;
use crate::orchestration::types::StepStatus;
use crate::state_machine::StateMachineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Object listing for the partition prefix failed
    #[error("Listing error for bucket {bucket} prefix {prefix}: {reason}")]
    Listing {
        bucket: String,
        prefix: String,
        reason: String,
    },

    /// The missing-input alert could not be delivered
    #[error("Notification error for partition {partition} via {channel}: {reason}")]
    Notification {
        partition: String,
        channel: String,
        reason: String,
    },

    /// A step template could not be rendered for the partition
    #[error("Template error in {template}: {reason}")]
    Template { template: String, reason: String },

    /// Cluster rejected the submission or returned no step identifiers
    #[error("Submission error on cluster {cluster_id}: {reason}")]
    Submission { cluster_id: String, reason: String },

    /// Submitted step did not reach a successful terminal state
    #[error("Processing failed for step {step_id} on cluster {cluster_id}: {reason}")]
    Processing {
        cluster_id: String,
        step_id: String,
        status: Option<StepStatus>,
        reason: String,
    },

    /// Warehouse load statement could not be prepared or executed
    #[error("Load error for {database}.{schema}: {reason}")]
    Load {
        database: String,
        schema: String,
        reason: String,
    },

    /// Inter-task handoff value could not be encoded
    #[error("Handoff error for {key}: {reason}")]
    Handoff { key: String, reason: String },

    #[error("Invalid partition date '{value}': {reason}")]
    InvalidPartition { value: String, reason: String },

    #[error(transparent)]
    StateTransition(#[from] StateMachineError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Another run currently holds the single run slot
    #[error("Run slot busy: another run is active")]
    RunSlotBusy,
}

impl PipelineError {
    /// Short, stable category name used in structured log records
    pub fn category(&self) -> &'static str {
        match self {
            Self::Listing { .. } => "listing",
            Self::Notification { .. } => "notification",
            Self::Template { .. } => "template",
            Self::Submission { .. } => "submission",
            Self::Processing { .. } => "processing",
            Self::Load { .. } => "load",
            Self::Handoff { .. } => "handoff",
            Self::InvalidPartition { .. } => "invalid_partition",
            Self::StateTransition(_) => "state_transition",
            Self::Configuration(_) => "configuration",
            Self::RunSlotBusy => "run_slot_busy",
        }
    }

    /// Whether the failure happened after work was handed to the cluster
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::Processing { .. } | Self::Load { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
