//! # Pipeline Constants
//!
//! Stage names and lifecycle event names used in structured log records, and
//! the defaults shared by configuration and connectors.

/// Jar that runs `args[0]` with the remaining args as a plain command line
pub const DEFAULT_STEP_JAR: &str = "command-runner.jar";

/// Stage names of the run, in pipeline order
pub mod stages {
    pub const LIST_OBJECTS: &str = "list_objects";
    pub const CHECK_INPUT_EXISTS: &str = "check_input_exists";
    pub const NOTIFY_MISSING_INPUT: &str = "notify_missing_input";
    pub const TRIGGER_BATCH: &str = "trigger_batch";
    pub const ADD_STEPS: &str = "add_steps";
    pub const WAIT_FOR_STEP: &str = "wait_for_step";
    pub const LOAD_WAREHOUSE: &str = "load_warehouse";
}

/// Run lifecycle events
pub mod events {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_NOTIFIED: &str = "run.notified";
    pub const RUN_LOADED: &str = "run.loaded";
    pub const RUN_FAILED: &str = "run.failed";
    pub const RUN_BLOCKED: &str = "run.blocked";

    pub const STEPS_SUBMITTED: &str = "step.submitted";
    pub const STEP_STATUS_CHANGED: &str = "step.status_changed";
    pub const STEP_TERMINAL: &str = "step.terminal";
}
