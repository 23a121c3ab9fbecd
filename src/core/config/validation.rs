use super::RuntimeConfig;
use crate::core::error::AppError;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &RuntimeConfig) -> Result<(), AppError> {
        if let Some(endpoint) = &config.function.endpoint {
            Self::validate_endpoint("function.endpoint", endpoint)?;
        }
        if let Some(endpoint) = &config.container.endpoint {
            Self::validate_endpoint("container.endpoint", endpoint)?;
        }

        if config.function.region.trim().is_empty() {
            return Err(
                AppError::configuration("function.region cannot be empty").with_code("SFN-CFG-003")
            );
        }
        if config.container.region.trim().is_empty() {
            return Err(AppError::configuration("container.region cannot be empty")
                .with_code("SFN-CFG-003"));
        }

        config.container.poll_interval()?;
        config.activity.poll_interval()?;

        if config.execution.max_transitions == 0 {
            return Err(AppError::configuration("execution.max_transitions must be >= 1")
                .with_code("SFN-CFG-003"));
        }
        if config.execution.default_task_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "execution.default_task_timeout_seconds must be >= 1",
            )
            .with_code("SFN-CFG-003"));
        }

        Ok(())
    }

    fn validate_endpoint(field: &str, endpoint: &str) -> Result<(), AppError> {
        let parsed = Url::parse(endpoint).map_err(|err| {
            AppError::configuration(format!("invalid {} '{}': {}", field, endpoint, err))
                .with_code("SFN-CFG-004")
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::configuration(format!(
                "{} must use http or https, got {}",
                field,
                parsed.scheme()
            ))
            .with_code("SFN-CFG-004"));
        }
        Ok(())
    }
}
