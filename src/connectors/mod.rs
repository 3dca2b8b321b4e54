//! # Service Connectors
//!
//! Contracts for the managed services a run delegates to. The pipeline only
//! sees these traits; concrete implementations are injected at startup.
//!
//! - [`ObjectLister`]: object storage listing
//! - [`StepSubmitter`]: batch step submission to a cluster
//! - [`StepStatusSource`]: step status lookup for polling
//! - [`WarehouseExecutor`]: one-shot SQL execution
//!
//! Shipped implementations: [`fs::FsObjectLister`], [`local_cluster::LocalCluster`]
//! and [`warehouse::PgWarehouse`].

pub mod fs;
pub mod local_cluster;
pub mod warehouse;

use crate::orchestration::types::{
    ClusterId, StepDefinition, StepId, StepStatus, WarehouseTarget,
};
use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsObjectLister;
pub use local_cluster::{ClusterState, LocalCluster};
pub use warehouse::PgWarehouse;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Bucket {0} not found")]
    BucketNotFound(String),

    #[error("Cluster {0} not found")]
    ClusterNotFound(String),

    #[error("Cluster {cluster_id} is {state} and does not accept new steps")]
    ClusterNotAcceptingSteps { cluster_id: String, state: String },

    #[error("Step {step_id} not found on cluster {cluster_id}")]
    StepNotFound { cluster_id: String, step_id: String },

    #[error("Connected to database {actual}, expected {expected}")]
    DatabaseMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Lists object keys under a prefix
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Keys in lexicographic order. With a delimiter, keys that contain it
    /// after the prefix are rolled up into one common prefix.
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> ConnectorResult<Vec<String>>;
}

/// Submits steps to an existing cluster
#[async_trait]
pub trait StepSubmitter: Send + Sync {
    /// Returns one id per accepted step, in submission order
    async fn add_steps(
        &self,
        cluster_id: &ClusterId,
        steps: &[StepDefinition],
    ) -> ConnectorResult<Vec<StepId>>;
}

/// Reports the current status of a submitted step
#[async_trait]
pub trait StepStatusSource: Send + Sync {
    async fn step_status(
        &self,
        cluster_id: &ClusterId,
        step_id: &StepId,
    ) -> ConnectorResult<StepStatus>;
}

/// Executes one statement against a warehouse database/schema
#[async_trait]
pub trait WarehouseExecutor: Send + Sync {
    async fn execute(&self, target: &WarehouseTarget, statement: &str) -> ConnectorResult<()>;
}
