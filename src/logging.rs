//! Logging setup
//!
//! Installs the process-wide `tracing` subscriber. Call once at startup and
//! keep the returned guard alive for as long as file logging should flush.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging options
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log this crate at debug level (agents also need `debug_enabled` for payloads)
    pub debug: bool,

    /// Emit JSON lines on stdout instead of human-readable text
    pub json: bool,

    /// Also write a daily-rolling log file into this directory
    pub log_dir: Option<PathBuf>,

    /// File name prefix for the rolling log file
    pub file_prefix: String,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self {
            debug: false,
            json: false,
            log_dir: None,
            file_prefix: "clinical-agent.log".to_string(),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> &'static str {
        if self.debug {
            "warn,clinical_agent_sdk=debug"
        } else {
            "warn,clinical_agent_sdk=info"
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber
///
/// Returns the file writer's guard when `log_dir` is set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.default_directive()))
        .context("Invalid log filter directive")?;

    let stdout_layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Logging is already initialized")?;

    tracing::info!(
        "[Logging] Initialized (debug: {}, json: {}, file: {:?})",
        config.debug,
        config.json,
        config.log_dir
    );

    Ok(guard)
}
