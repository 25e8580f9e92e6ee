//! # Structured Logging Module
//!
//! Environment-aware structured logging for embedders that do not already
//! install a `tracing` subscriber. Console output always; JSON file output
//! when a log directory is configured.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Reads `WORKQUEUE_ENV`/`APP_ENV` for the environment name and
/// `WORKQUEUE_LOG_DIR` for an optional JSON log file directory. Safe to call
/// more than once and tolerant of an already-installed global subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let file_layer = log_dir().map(|log_dir| {
            if !log_dir.exists() {
                fs::create_dir_all(&log_dir).expect("failed to create log directory");
            }
            let pid = process::id();
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
            let filename = format!("{environment}.{pid}.{timestamp}.log");
            let file_appender = tracing_appender::rolling::never(&log_dir, filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the writer guard alive for the process lifetime.
            std::mem::forget(guard);

            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(log_level.clone()))
        });

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        // try_init so an embedder-installed global subscriber wins.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already installed, keeping it");
        }

        tracing::info!(
            environment = %environment,
            "structured logging initialized"
        );
    });
}

/// Current environment from environment variables.
fn get_environment() -> String {
    std::env::var("WORKQUEUE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Optional JSON log file directory.
fn log_dir() -> Option<PathBuf> {
    std::env::var("WORKQUEUE_LOG_DIR").ok().map(PathBuf::from)
}

/// Default log level per environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
