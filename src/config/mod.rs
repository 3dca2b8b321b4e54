//! # Pipeline Configuration
//!
//! Layered configuration for the daily ingest pipeline. Values come from the
//! built-in defaults, then `config/ingest.toml` (or an explicit path), then an
//! optional `ingest.<environment>.toml` overlay beside it, and finally
//! `INGEST__`-prefixed environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ingest_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let bucket = &manager.config().storage.bucket;
//! let cluster = &manager.config().cluster.id;
//! let poll = manager.config().waiter.poll_interval();
//! # Ok(())
//! # }
//! ```
//!
//! Everything here is read once at run start and never mutated; the loaded
//! value is shared as `Arc<PipelineConfig>`.

pub mod error;
pub mod loader;

use crate::constants::DEFAULT_STEP_JAR;
use crate::orchestration::types::{ActionOnFailure, ClusterId, WarehouseTarget};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/ingest.toml`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Landing bucket and listing options
    pub storage: StorageConfig,

    /// Fixed, pre-provisioned compute cluster and the step templates run on it
    pub cluster: ClusterConfig,

    /// Step status polling
    #[serde(default)]
    pub waiter: WaiterConfig,

    /// Warehouse target and load statement
    pub warehouse: WarehouseConfig,

    /// Run window and ordering policy
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub bucket: String,
    /// Root directory that holds one sub-directory per bucket for the filesystem lister
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Listing delimiter; empty behaves like none
    #[serde(default)]
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub id: ClusterId,
    pub steps: Vec<StepTemplate>,
}

/// Unrendered batch step; args may carry `{{ ds }}`, `{{ ds_nodash }}`,
/// `{{ prefix }}` and `{{ bucket }}` placeholders.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StepTemplate {
    pub name: String,
    #[serde(default)]
    pub action_on_failure: ActionOnFailure,
    #[serde(default = "default_step_jar")]
    pub jar: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaiterConfig {
    pub poll_interval_secs: u64,
    /// No timeout when unset; the wait lasts until a terminal status
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl WaiterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarehouseConfig {
    pub database: String,
    pub schema: String,
    /// Parameterized load statement; relative paths resolve against `template_dir`
    pub sql_path: PathBuf,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Connection URL for the warehouse connector
    #[serde(default)]
    pub url: Option<String>,
}

impl WarehouseConfig {
    pub fn resolved_sql_path(&self) -> PathBuf {
        if self.sql_path.is_absolute() {
            self.sql_path.clone()
        } else {
            self.template_dir.join(&self.sql_path)
        }
    }

    pub fn target(&self) -> WarehouseTarget {
        WarehouseTarget {
            database: self.database.clone(),
            schema: self.schema.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Calendar trigger of the host scheduler; informational here
    pub cron: String,
    /// Run every partition in the window rather than only the latest one
    pub catchup: bool,
    /// Halt the window at the first failed partition
    pub depends_on_past: bool,
    pub max_active_runs: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/storage")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("config/sql")
}

fn default_step_jar() -> String {
    DEFAULT_STEP_JAR.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                bucket: "sales-landing".to_string(),
                root: default_storage_root(),
                delimiter: None,
            },
            cluster: ClusterConfig {
                id: ClusterId::new("local-cluster"),
                steps: vec![StepTemplate {
                    name: "sales_processing".to_string(),
                    action_on_failure: ActionOnFailure::Continue,
                    jar: default_step_jar(),
                    args: vec![
                        "/usr/bin/spark-submit".to_string(),
                        "--master".to_string(),
                        "yarn".to_string(),
                        "s3://{{ bucket }}/pyspark_sales.py".to_string(),
                        "{{ ds_nodash }}".to_string(),
                        "s3://{{ bucket }}/{{ prefix }}/".to_string(),
                    ],
                }],
            },
            waiter: WaiterConfig::default(),
            warehouse: WarehouseConfig {
                database: "sales_db".to_string(),
                schema: "sales_schema".to_string(),
                sql_path: PathBuf::from("warehouse_load.sql"),
                template_dir: default_template_dir(),
                url: None,
            },
            schedule: ScheduleConfig {
                start_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap_or_default(),
                end_date: None,
                cron: "0 6 * * *".to_string(),
                catchup: true,
                depends_on_past: true,
                max_active_runs: 1,
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject configurations that cannot drive a run
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "bucket", "storage",
            ));
        }
        if self.storage.bucket.contains('/') {
            return Err(ConfigurationError::invalid_value(
                "storage.bucket",
                &self.storage.bucket,
                "bucket names cannot contain '/'",
            ));
        }

        if self.cluster.id.as_str().trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("id", "cluster"));
        }
        if self.cluster.steps.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "steps", "cluster",
            ));
        }
        for step in &self.cluster.steps {
            if step.name.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "name",
                    "cluster.steps",
                ));
            }
            if step.args.is_empty() {
                return Err(ConfigurationError::invalid_value(
                    format!("cluster.steps.{}.args", step.name),
                    "[]",
                    "a step needs at least a program to run",
                ));
            }
        }

        if self.waiter.poll_interval_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "waiter.poll_interval_secs",
                "0",
                "poll interval must be at least one second",
            ));
        }
        if self.waiter.timeout_secs == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "waiter.timeout_secs",
                "0",
                "omit the timeout instead of setting it to zero",
            ));
        }

        if self.warehouse.database.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database",
                "warehouse",
            ));
        }
        if !is_identifier(&self.warehouse.schema) {
            return Err(ConfigurationError::invalid_value(
                "warehouse.schema",
                &self.warehouse.schema,
                "schema must be a plain SQL identifier",
            ));
        }

        if let Some(end) = self.schedule.end_date {
            if end < self.schedule.start_date {
                return Err(ConfigurationError::invalid_value(
                    "schedule.end_date",
                    end.to_string(),
                    format!("end date precedes start date {}", self.schedule.start_date),
                ));
            }
        }
        if self.schedule.max_active_runs != 1 {
            return Err(ConfigurationError::invalid_value(
                "schedule.max_active_runs",
                self.schedule.max_active_runs.to_string(),
                "runs must execute one at a time in calendar order",
            ));
        }

        Ok(())
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
