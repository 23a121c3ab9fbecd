use serde::{Deserialize, Serialize};

/// Final status of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Succeeded => "SUCCEEDED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::TimedOut => "TIMED_OUT",
        }
    }
}

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed workflow definition or runtime configuration. Never retried.
    ConfigurationError,
    /// A path selector could not be applied to the data. Never retried.
    PathError,
    /// The invoked resource reported a failure.
    InvocationError,
    /// A bounded wait elapsed.
    TimeoutError,
    /// A container task could not be scheduled at all.
    LaunchFailureError,
    /// A Fail state or a failed branch.
    StateFailure,
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCategory {
    /// Whether errors of this category may flow through Retry and Catch.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ErrorCategory::ConfigurationError | ErrorCategory::PathError
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
}
