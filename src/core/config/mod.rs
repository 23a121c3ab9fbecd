#![allow(clippy::result_large_err)] // Config loading returns AppError so validation codes reach the caller.

use crate::core::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration loaded from `.sfn-local/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Function invocation transport
    #[serde(default)]
    pub function: FunctionConfig,

    /// Container orchestration transport
    #[serde(default)]
    pub container: ContainerConfig,

    /// Activity task pickup
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Execution limits
    #[serde(default)]
    pub execution: ExecutionSettings,
}

/// Function invocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Endpoint override, e.g. a local emulator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,
}

/// Container orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Interval between task status checks (humantime, e.g. "3s")
    #[serde(default = "default_container_poll_interval")]
    pub poll_interval: String,
}

/// Activity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Interval between result checks (humantime)
    #[serde(default = "default_activity_poll_interval")]
    pub poll_interval: String,
}

/// Execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Task timeout applied when a Task state declares no TimeoutSeconds
    #[serde(default = "default_task_timeout_seconds")]
    pub default_task_timeout_seconds: u64,

    /// Upper bound on state transitions per run
    #[serde(default = "default_max_transitions")]
    pub max_transitions: usize,
}

// Default functions
fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_container_poll_interval() -> String {
    "3s".to_string()
}

fn default_activity_poll_interval() -> String {
    "1s".to_string()
}

fn default_task_timeout_seconds() -> u64 {
    99_999_999
}

fn default_max_transitions() -> usize {
    25_000
}

impl Default for FunctionConfig {
    fn default() -> Self {
        FunctionConfig {
            endpoint: None,
            region: default_region(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            endpoint: None,
            region: default_region(),
            poll_interval: default_container_poll_interval(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        ActivityConfig {
            poll_interval: default_activity_poll_interval(),
        }
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            default_task_timeout_seconds: default_task_timeout_seconds(),
            max_transitions: default_max_transitions(),
        }
    }
}

impl FunctionConfig {
    /// Endpoint override, or the regional service endpoint.
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://lambda.{}.amazonaws.com", self.region))
    }
}

impl ContainerConfig {
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://ecs.{}.amazonaws.com", self.region))
    }

    pub fn poll_interval(&self) -> Result<Duration, AppError> {
        parse_interval("container.poll_interval", &self.poll_interval)
    }
}

impl ActivityConfig {
    pub fn poll_interval(&self) -> Result<Duration, AppError> {
        parse_interval("activity.poll_interval", &self.poll_interval)
    }
}

impl ExecutionSettings {
    pub fn default_task_timeout(&self) -> Duration {
        Duration::from_secs(self.default_task_timeout_seconds)
    }
}

pub(crate) fn parse_interval(field: &str, raw: &str) -> Result<Duration, AppError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        AppError::configuration(format!("{} '{}' is not a valid duration: {}", field, raw, err))
            .with_code("SFN-CFG-002")
    })
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
