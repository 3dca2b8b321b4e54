#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ingest Core
//!
//! Daily partitioned ingest pipeline: raw files landed in object storage are
//! checked, transformed by batch steps on a shared compute cluster, and loaded
//! into a warehouse table.
//!
//! ## Overview
//!
//! One run handles one partition (a calendar date). The run lists the
//! partition's `YYYY/MM/DD` prefix, and then either alerts that no input
//! landed or submits the configured steps, polls the first one to completion
//! and executes the load statement.
//!
//! Every managed service sits behind a connector trait in [`connectors`], so
//! the pipeline itself owns only the wiring, the branch decision, the run
//! state machine, partition formatting and templating.
//!
//! ## Module Organization
//!
//! - [`partition`] - Partition keys and the immutable run context
//! - [`template`] - `{{ placeholder }}` rendering for steps and SQL
//! - [`orchestration`] - Pipeline stages, the pipeline and the window runner
//! - [`state_machine`] - Run lifecycle states and transitions
//! - [`connectors`] - Service traits and the shipped implementations
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ingest_core::config::ConfigManager;
//! use ingest_core::orchestration::BatchTrigger;
//! use ingest_core::partition::{PartitionKey, RunContext};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let ctx = RunContext::new(PartitionKey::parse("2024-01-05")?, manager.shared());
//!
//! for step in BatchTrigger::from_config(ctx.config()).render(&ctx)? {
//!     println!("{} {:?}", step.name, step.args);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and pipeline integration tests
//! ```

pub mod config;
pub mod connectors;
pub mod constants;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod partition;
pub mod state_machine;
pub mod template;

pub use config::{ConfigManager, ConfigurationError, PipelineConfig};
pub use connectors::{ConnectorError, ConnectorResult};
pub use error::{PipelineError, PipelineResult};
pub use orchestration::{
    Branch, ExistenceGate, IngestPipeline, PipelineConnectors, RunReport, RunWindow,
    WindowRunner,
};
pub use partition::{PartitionKey, RunContext};
pub use state_machine::{RunEvent, RunState, RunStateMachine};
