//! # Orchestration
//!
//! Stages of the daily ingest run and the pipeline that wires them.
//!
//! ## Core Components
//!
//! - **InventoryLister**: lists the partition's landing prefix
//! - **ExistenceGate**: picks the `process` or `notify` branch from the listing
//! - **Notifier**: alerts on missing input; `DedupNotifier` alerts once per partition
//! - **BatchTrigger**: renders the configured cluster steps for the partition
//! - **JobSubmitter**: adds the rendered steps to the fixed cluster
//! - **JobWaiter**: polls the first submitted step until it is terminal
//! - **WarehouseLoader**: renders and executes the load statement
//! - **IngestPipeline**: runs one partition through the stages above
//! - **WindowRunner**: runs a date window in calendar order

pub mod gate;
pub mod handoff;
pub mod lister;
pub mod loader;
pub mod notifier;
pub mod pipeline;
pub mod submitter;
pub mod trigger;
pub mod types;
pub mod waiter;
pub mod window;

pub use gate::{Branch, ExistenceGate};
pub use handoff::{Handoff, RunMessages};
pub use lister::InventoryLister;
pub use loader::{render_statement, WarehouseLoader};
pub use notifier::{DedupNotifier, LoggingNotifier, MissingInput, Notifier};
pub use pipeline::{IngestPipeline, PipelineConnectors, RunReport, RunSlot};
pub use submitter::JobSubmitter;
pub use trigger::BatchTrigger;
pub use types::*;
pub use waiter::JobWaiter;
pub use window::{PartitionOutcome, RunWindow, WindowReport, WindowRunner};
