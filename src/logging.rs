//! # Structured Logging Module
//!
//! Environment-aware structured logging for pipeline runs. Output is either a
//! human-readable console format or one JSON object per line.

use crate::config::{LogFormat, LoggingConfig};
use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. `RUST_LOG` wins over the environment default.
pub fn init_structured_logging(environment: &str, config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(environment)))
        };

        let result = match config.format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true)
                        .with_filter(filter()),
                )
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_filter(filter()),
                )
                .try_init(),
        };

        // A global subscriber may already be installed (tests, embedding hosts)
        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            format = ?config.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for run-level operations
pub fn log_run_operation(operation: &str, partition: &str, state: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        partition = %partition,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 RUN_OPERATION"
    );
}

/// Log structured data for cluster step operations
pub fn log_step_operation(
    operation: &str,
    partition: &str,
    cluster_id: &str,
    step_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        partition = %partition,
        cluster_id = %cluster_id,
        step_id = step_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 STEP_OPERATION"
    );
}

/// Log a run failure with its category
pub fn log_error(component: &str, partition: &str, category: &str, error: &str) {
    tracing::error!(
        component = %component,
        partition = %partition,
        category = %category,
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
