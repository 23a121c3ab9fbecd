use super::{ConfigValidator, RuntimeConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::Path;

const CONFIG_DIR: &str = ".sfn-local";
const CONFIG_FILE: &str = "config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from `<workspace>/.sfn-local/config.toml`, then apply
    /// environment overrides and validate. A missing file yields defaults.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<RuntimeConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_DIR).join(CONFIG_FILE);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;

        tracing::debug!(
            path = %config_path.display(),
            function_endpoint = %config.function.resolved_endpoint(),
            container_endpoint = %config.container.resolved_endpoint(),
            "runtime configuration loaded"
        );
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<RuntimeConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: RuntimeConfig = toml::from_str(&content).map_err(|e| {
            AppError::configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
            .with_code("SFN-CFG-001")
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut RuntimeConfig) {
        if let Ok(endpoint) = env::var("SFN_LOCAL_LAMBDA_ENDPOINT") {
            config.function.endpoint = Some(endpoint);
        }

        if let Ok(region) = env::var("SFN_LOCAL_LAMBDA_REGION") {
            config.function.region = region;
        }

        if let Ok(endpoint) = env::var("SFN_LOCAL_ECS_ENDPOINT") {
            config.container.endpoint = Some(endpoint);
        }

        if let Ok(region) = env::var("SFN_LOCAL_ECS_REGION") {
            config.container.region = region;
        }

        if let Ok(interval) = env::var("SFN_LOCAL_ECS_POLL_INTERVAL") {
            config.container.poll_interval = interval;
        }

        if let Ok(interval) = env::var("SFN_LOCAL_ACTIVITY_POLL_INTERVAL") {
            config.activity.poll_interval = interval;
        }

        if let Ok(raw) = env::var("SFN_LOCAL_MAX_TRANSITIONS") {
            if let Ok(max_transitions) = raw.parse::<usize>() {
                config.execution.max_transitions = max_transitions;
            }
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "SFN_LOCAL_LAMBDA_ENDPOINT - Override the function invocation endpoint",
            "SFN_LOCAL_LAMBDA_REGION - Override the function invocation region (default: us-east-1)",
            "SFN_LOCAL_ECS_ENDPOINT - Override the container orchestration endpoint",
            "SFN_LOCAL_ECS_REGION - Override the container orchestration region (default: us-east-1)",
            "SFN_LOCAL_ECS_POLL_INTERVAL - Interval between container status checks (default: 3s)",
            "SFN_LOCAL_ACTIVITY_POLL_INTERVAL - Interval between activity result checks (default: 1s)",
            "SFN_LOCAL_MAX_TRANSITIONS - Maximum state transitions per run (default: 25000)",
        ]
    }
}
