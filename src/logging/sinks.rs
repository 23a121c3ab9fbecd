use crate::logging::config::LoggingConfig;
use crate::logging::context::ConsoleOutput;
use crate::Result;
use anyhow::{anyhow, Context};
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_FILE_NAME: &str = "sfn-local.log";

/// Directory that receives `sfn-local.log`.
///
/// An absolute `log_dir` is used as is. A relative one, and the default
/// `.sfn-local/logs`, hang off the workspace, or the home directory when
/// no workspace is given.
pub fn log_dir(config: &LoggingConfig, workspace_root: Option<&Path>) -> Result<PathBuf> {
    let base = || -> Result<PathBuf> {
        match workspace_root {
            Some(workspace) => Ok(workspace.to_path_buf()),
            None => dirs_next::home_dir()
                .ok_or_else(|| anyhow!("no workspace or home directory for log files")),
        }
    };
    Ok(match &config.log_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => base()?.join(dir),
        None => base()?.join(".sfn-local").join("logs"),
    })
}

/// Non-blocking writer appending to `<dir>/sfn-local.log`. The guard flushes
/// buffered lines when dropped. A disabled sink discards everything.
pub fn file_writer(dir: &Path, enabled: bool) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
    if !enabled {
        return Ok((BoxMakeWriter::new(io::sink), None));
    }
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("sfn-local")
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(writer), Some(guard)))
}

pub fn console_writer(output: ConsoleOutput) -> BoxMakeWriter {
    match output {
        ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
        ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
        ConsoleOutput::None => BoxMakeWriter::new(io::sink),
    }
}
