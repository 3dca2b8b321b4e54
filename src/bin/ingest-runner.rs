//! # Ingest Runner
//!
//! Command-line host for the ingest pipeline. Runs one partition or an ordered
//! window of partitions, renders what a run would submit, and validates the
//! configuration.

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ingest_core::config::{ConfigManager, PipelineConfig};
use ingest_core::connectors::{FsObjectLister, LocalCluster, PgWarehouse};
use ingest_core::logging::init_structured_logging;
use ingest_core::orchestration::{
    render_statement, BatchTrigger, DedupNotifier, IngestPipeline, LoggingNotifier,
    PipelineConnectors, RunWindow, WindowRunner,
};
use ingest_core::partition::{PartitionKey, RunContext};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ingest-runner")]
#[command(about = "Run the daily partitioned ingest pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: config/ingest.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Environment overlay to apply (development, test, production)
    #[arg(short, long, global = true, env = "INGEST_ENV")]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline for one partition
    Run {
        /// Partition date, YYYY-MM-DD
        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Run every due partition in calendar order
    Backfill {
        /// First partition (default: schedule.start_date)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last partition (default: schedule.end_date capped at yesterday)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Print the rendered steps and load statement for a partition as JSON
    Render {
        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Load and validate the configuration, then print it with secrets masked
    ValidateConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_with_env(cli.config.clone(), &environment)
        .context("failed to load configuration")?;
    init_structured_logging(manager.environment(), &manager.config().logging);

    match cli.command {
        Commands::Run { date } => run_partition(&manager, PartitionKey::new(date)).await,
        Commands::Backfill { start, end } => backfill(&manager, start, end).await,
        Commands::Render { date } => render(&manager, PartitionKey::new(date)).await,
        Commands::ValidateConfig => {
            info!(
                config_path = %manager.config_path().display(),
                environment = %manager.environment(),
                "✅ Configuration is valid"
            );
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_pipeline(config: Arc<PipelineConfig>) -> anyhow::Result<IngestPipeline> {
    let Some(url) = config.warehouse.url.as_deref() else {
        bail!("warehouse.url is required to run the pipeline (set INGEST__WAREHOUSE__URL)");
    };

    let cluster = Arc::new(LocalCluster::spawn(config.cluster.id.clone()));
    let connectors = PipelineConnectors {
        lister: Arc::new(FsObjectLister::new(config.storage.root.clone())),
        submitter: cluster.clone(),
        status: cluster,
        warehouse: Arc::new(
            PgWarehouse::connect_lazy(url).context("invalid warehouse connection url")?,
        ),
        notifier: Arc::new(DedupNotifier::new(LoggingNotifier::new())),
    };

    Ok(IngestPipeline::new(config, connectors))
}

async fn run_partition(manager: &ConfigManager, partition: PartitionKey) -> anyhow::Result<ExitCode> {
    let pipeline = build_pipeline(manager.shared())?;

    let report = tokio::select! {
        report = pipeline.run(partition) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!(
                partition = %partition,
                "Interrupted; a step already running on the cluster is left running"
            );
            return Ok(ExitCode::from(130));
        }
    };

    println!("{}", serde_json::to_string_pretty(&report.summary())?);
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        if let Some(err) = &report.failure {
            error!(partition = %partition, category = err.category(), "Run failed: {err}");
        }
        Ok(ExitCode::FAILURE)
    }
}

async fn backfill(
    manager: &ConfigManager,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> anyhow::Result<ExitCode> {
    let schedule = &manager.config().schedule;
    let today = Utc::now().date_naive();

    let window = match (start, end) {
        (None, None) => RunWindow::from_schedule(schedule, today),
        (start, end) => {
            let start = start.unwrap_or(schedule.start_date);
            let end = match end {
                Some(end) => end,
                None => {
                    let due = RunWindow::from_schedule(schedule, today)
                        .context("no partition of the schedule is due yet")?;
                    due.end().date()
                }
            };
            Some(RunWindow::new(PartitionKey::new(start), PartitionKey::new(end))?)
        }
    };

    let Some(window) = window else {
        info!(today = %today, "No partitions due");
        return Ok(ExitCode::SUCCESS);
    };

    let pipeline = build_pipeline(manager.shared())?;
    let runner = WindowRunner::new(&pipeline);

    let report = tokio::select! {
        report = runner.run(&window) => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; a step already running on the cluster is left running");
            return Ok(ExitCode::from(130));
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn render(manager: &ConfigManager, partition: PartitionKey) -> anyhow::Result<ExitCode> {
    let ctx = RunContext::new(partition, manager.shared());
    let steps = BatchTrigger::from_config(ctx.config()).render(&ctx)?;
    let statement = render_statement(&ctx).await?;

    let rendered = json!({
        "partition": partition,
        "prefix": partition.storage_prefix(),
        "cluster_id": ctx.cluster_id(),
        "steps": steps,
        "warehouse": ctx.warehouse_target(),
        "statement": statement,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(ExitCode::SUCCESS)
}
