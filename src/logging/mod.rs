pub mod config;
pub mod context;
pub mod sinks;

pub use context::{detect_context, ConsoleOutput, LogContext};

use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps logging sinks alive; the file writer flushes when dropped.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    console_output: ConsoleOutput,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// Install the global tracing subscriber for the host process.
///
/// `RUST_LOG` wins over the configured level. Configuration is read from
/// `<workspace>/.sfn-local/logging.toml` when a workspace is given. Errors when
/// called twice in one process.
pub fn init(context: LogContext, workspace_root: Option<&Path>) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let config = LoggingConfig::load(workspace_root)?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;

    let log_dir = sinks::log_dir(&config, workspace_root)?;
    let (file_writer, file_guard) = sinks::file_writer(&log_dir, config.enable_file)?;
    let console_output = context.console_output(config.console_output);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_writer(sinks::console_writer(console_output))
                .with_target(false),
        )
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    let log_file_path = log_dir.join(sinks::LOG_FILE_NAME);
    tracing::debug!(
        log_file = %log_file_path.display(),
        console = %console_output,
        "logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
        console_output,
        log_file_path,
    })
}
