//! # Partitions and Run Context
//!
//! A partition is one logical execution date. Every string form used by the
//! pipeline (calendar date, storage prefix, job argument) is derived from the
//! same `NaiveDate` on demand and never stored on its own.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::orchestration::types::{ClusterId, WarehouseTarget};
use crate::template::TemplateVars;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Logical execution date of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(NaiveDate);

impl PartitionKey {
    pub const DS_FORMAT: &'static str = "%Y-%m-%d";
    pub const PREFIX_FORMAT: &'static str = "%Y/%m/%d";
    pub const JOB_DATE_FORMAT: &'static str = "%Y%m%d";

    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a `YYYY-MM-DD` calendar date
    pub fn parse(value: &str) -> PipelineResult<Self> {
        NaiveDate::parse_from_str(value.trim(), Self::DS_FORMAT)
            .map(Self)
            .map_err(|e| PipelineError::InvalidPartition {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Scheduling calendar form, `YYYY-MM-DD`
    pub fn ds(&self) -> String {
        self.0.format(Self::DS_FORMAT).to_string()
    }

    /// Storage key prefix, `YYYY/MM/DD`
    pub fn storage_prefix(&self) -> String {
        self.0.format(Self::PREFIX_FORMAT).to_string()
    }

    /// Batch job argument, `YYYYMMDD`
    pub fn job_date(&self) -> String {
        self.0.format(Self::JOB_DATE_FORMAT).to_string()
    }

    pub fn next(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    pub fn previous(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::DS_FORMAT))
    }
}

impl FromStr for PartitionKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDate> for PartitionKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

/// Immutable inputs of one run: the partition plus the fixed configuration
#[derive(Debug, Clone)]
pub struct RunContext {
    partition: PartitionKey,
    config: Arc<PipelineConfig>,
}

impl RunContext {
    pub fn new(partition: PartitionKey, config: Arc<PipelineConfig>) -> Self {
        Self { partition, config }
    }

    pub fn partition(&self) -> PartitionKey {
        self.partition
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bucket(&self) -> &str {
        &self.config.storage.bucket
    }

    pub fn cluster_id(&self) -> &ClusterId {
        &self.config.cluster.id
    }

    pub fn warehouse_target(&self) -> WarehouseTarget {
        self.config.warehouse.target()
    }

    /// Placeholder values shared by step and SQL templates
    pub fn template_vars(&self) -> TemplateVars {
        TemplateVars::for_partition(&self.partition, self.bucket())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_formats_share_one_date() {
        let partition = PartitionKey::parse("2024-01-05").unwrap();
        assert_eq!(partition.ds(), "2024-01-05");
        assert_eq!(partition.storage_prefix(), "2024/01/05");
        assert_eq!(partition.job_date(), "20240105");
        assert_eq!(partition.to_string(), "2024-01-05");
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        assert!(matches!(
            PartitionKey::parse("2024/01/05"),
            Err(PipelineError::InvalidPartition { .. })
        ));
        assert!("2024-02-30".parse::<PartitionKey>().is_err());
        assert!(PartitionKey::parse("").is_err());
    }

    #[test]
    fn test_calendar_neighbours() {
        let partition = PartitionKey::parse("2024-02-28").unwrap();
        assert_eq!(partition.next().unwrap().ds(), "2024-02-29");
        assert_eq!(partition.previous().unwrap().ds(), "2024-02-27");
        assert!(partition < partition.next().unwrap());
    }

    #[test]
    fn test_serde_uses_calendar_form() {
        let partition = PartitionKey::parse("2024-01-05").unwrap();
        let json = serde_json::to_string(&partition).unwrap();
        assert_eq!(json, "\"2024-01-05\"");
    }

    #[test]
    fn test_run_context_accessors() {
        let config = Arc::new(PipelineConfig::default());
        let ctx = RunContext::new(PartitionKey::parse("2024-01-05").unwrap(), config);
        assert_eq!(ctx.bucket(), "sales-landing");
        assert_eq!(ctx.cluster_id().as_str(), "local-cluster");
        assert_eq!(ctx.warehouse_target().schema, "sales_schema");
    }
}
