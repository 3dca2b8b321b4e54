#![allow(dead_code)]

pub mod mocks;
pub mod strategies;

pub use mocks::*;
pub use strategies::*;

use ingest_core::config::PipelineConfig;
use ingest_core::orchestration::{IngestPipeline, PipelineConnectors, StepStatus};
use ingest_core::partition::PartitionKey;
use std::sync::Arc;
use tempfile::TempDir;

pub const LOAD_SQL: &str =
    "DELETE FROM {{ schema }}.sales WHERE sale_date = DATE '{{ ds }}';\n\
     INSERT INTO {{ schema }}.sales SELECT * FROM {{ schema }}.sales_processed WHERE batch_date = '{{ ds_nodash }}';";

pub fn partition(ds: &str) -> PartitionKey {
    PartitionKey::parse(ds).expect("valid test partition")
}

/// Pipeline wired to recording connectors, with the load SQL in a temp dir
pub struct PipelineHarness {
    pub config: PipelineConfig,
    pub lister: Arc<StaticLister>,
    pub cluster: Arc<ScriptedCluster>,
    pub warehouse: Arc<RecordingWarehouse>,
    pub notifier: Arc<RecordingNotifier>,
    _sql_dir: TempDir,
}

impl PipelineHarness {
    pub fn new(keys: &[&str]) -> Self {
        Self::with_lister(StaticLister::with_keys(keys))
    }

    pub fn with_lister(lister: StaticLister) -> Self {
        let sql_dir = TempDir::new().expect("temp dir");
        std::fs::write(sql_dir.path().join("load.sql"), LOAD_SQL).expect("write load sql");

        let mut config = PipelineConfig::default();
        config.warehouse.template_dir = sql_dir.path().to_path_buf();
        config.warehouse.sql_path = "load.sql".into();
        config.waiter.poll_interval_secs = 1;

        Self {
            config,
            lister: Arc::new(lister),
            cluster: Arc::new(ScriptedCluster::new(&["s-1"], &[StepStatus::Completed])),
            warehouse: Arc::new(RecordingWarehouse::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            _sql_dir: sql_dir,
        }
    }

    pub fn cluster(mut self, cluster: ScriptedCluster) -> Self {
        self.cluster = Arc::new(cluster);
        self
    }

    pub fn warehouse(mut self, warehouse: RecordingWarehouse) -> Self {
        self.warehouse = Arc::new(warehouse);
        self
    }

    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut PipelineConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn connectors(&self) -> PipelineConnectors {
        PipelineConnectors {
            lister: self.lister.clone(),
            submitter: self.cluster.clone(),
            status: self.cluster.clone(),
            warehouse: self.warehouse.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(Arc::new(self.config.clone()), self.connectors())
    }
}
