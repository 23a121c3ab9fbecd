use crate::core::config::ContainerConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::utils::case::{pascal_case_to_camel_case, pascal_case_to_camel_case_keys};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const RUN_TASK_TARGET: &str = "AmazonEC2ContainerServiceV20141113.RunTask";
pub const DESCRIBE_TASKS_TARGET: &str = "AmazonEC2ContainerServiceV20141113.DescribeTasks";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// `Parameters` keys forwarded to RunTask.
const SUPPORTED_PARAMETERS: &[&str] = &[
    "Cluster",
    "Group",
    "LaunchType",
    "NetworkConfiguration",
    "Overrides",
    "PlacementConstraints",
    "PlacementStrategy",
    "PlatformVersion",
    "TaskDefinition",
];

pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_STOPPED: &str = "STOPPED";

/// Container orchestration API: launch a task and describe its status.
#[async_trait]
pub trait ContainerTransport: Send + Sync {
    async fn run_task(&self, request: Value) -> Result<Value, AppError>;
    async fn describe_tasks(&self, request: Value) -> Result<Value, AppError>;
}

/// Talks to an ECS-compatible endpoint with the JSON 1.1 target protocol.
#[derive(Clone)]
pub struct HttpContainerTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpContainerTransport {
    pub fn new(config: &ContainerConfig) -> Self {
        Self::with_endpoint(config.resolved_endpoint())
    }

    pub fn with_endpoint<T: Into<String>>(endpoint: T) -> Self {
        HttpContainerTransport {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, target: &str, request: Value) -> Result<Value, AppError> {
        tracing::debug!(target_op = target, endpoint = %self.endpoint, "container api call");
        let response = self
            .http
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", target)
            .header("Content-Type", CONTENT_TYPE)
            .body(request.to_string())
            .send()
            .await
            .map_err(|err| {
                AppError::with_source(
                    ErrorCategory::InvocationError,
                    format!("container api request failed: {}", err),
                    Box::new(err),
                )
                .with_name("ECS.SdkClientException")
                .with_code("SFN-HTTP-001")
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            AppError::new(
                ErrorCategory::InvocationError,
                format!("failed to read container api response: {}", err),
            )
            .with_code("SFN-HTTP-001")
        })?;
        let payload: Value = if body.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&body)?
        };

        if !status.is_success() {
            let kind = payload
                .get("__type")
                .and_then(Value::as_str)
                .map(|raw| raw.rsplit('#').next().unwrap_or(raw))
                .unwrap_or("ServiceException");
            let message = payload
                .get("message")
                .or_else(|| payload.get("Message"))
                .and_then(Value::as_str)
                .unwrap_or(body.as_str())
                .to_string();
            return Err(AppError::named(
                ErrorCategory::InvocationError,
                format!("ECS.{}", kind),
                message,
            )
            .with_code("SFN-HTTP-002"));
        }
        Ok(payload)
    }
}

#[async_trait]
impl ContainerTransport for HttpContainerTransport {
    async fn run_task(&self, request: Value) -> Result<Value, AppError> {
        self.call(RUN_TASK_TARGET, request).await
    }

    async fn describe_tasks(&self, request: Value) -> Result<Value, AppError> {
        self.call(DESCRIBE_TASKS_TARGET, request).await
    }
}

/// Check the declared `Parameters` before anything is launched.
pub fn validate_parameters(state_name: &str, parameters: Option<&Value>) -> Result<(), AppError> {
    let Some(parameters) = parameters else {
        return Err(AppError::configuration(format!(
            "Required attribute 'Parameters' not found for ECS state {}.",
            state_name
        ))
        .with_code("SFN-TASK-003"));
    };
    let non_empty = |key: &str| {
        parameters
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|value| !value.trim().is_empty())
    };
    let has_task_definition = non_empty("TaskDefinition") || non_empty("TaskDefinition.$");
    if !has_task_definition {
        return Err(AppError::configuration(format!(
            "Required attribute 'Parameters.TaskDefinition' not found for ECS state {}.",
            state_name
        ))
        .with_code("SFN-TASK-003"));
    }
    Ok(())
}

/// RunTask request body: supported parameters with their keys lowered to
/// the API's casing, recursively.
pub fn build_run_task_request(parameters: &Value) -> Value {
    let mut request = Map::new();
    if let Some(map) = parameters.as_object() {
        for key in SUPPORTED_PARAMETERS {
            if let Some(value) = map.get(*key) {
                request.insert(
                    pascal_case_to_camel_case(key),
                    pascal_case_to_camel_case_keys(value),
                );
            }
        }
    }
    Value::Object(request)
}

/// Fail when RunTask reported launch failures.
pub fn check_launch_failures(state_name: &str, run_result: &Value) -> Result<(), AppError> {
    match run_result.get("failures").and_then(Value::as_array) {
        Some(failures) if !failures.is_empty() => Err(AppError::new(
            ErrorCategory::LaunchFailureError,
            format!(
                "There were failures running the ECS Task for state {}: {}",
                state_name,
                Value::Array(failures.clone())
            ),
        )
        .with_code("SFN-TASK-004")),
        _ => Ok(()),
    }
}

/// The single task carried by a RunTask or DescribeTasks result.
pub fn single_task(result: &Value) -> Result<&Value, AppError> {
    match result.get("tasks").and_then(Value::as_array) {
        Some(tasks) if tasks.len() == 1 => Ok(&tasks[0]),
        _ => Err(AppError::new(
            ErrorCategory::InvocationError,
            format!(
                "Expected to find one ECS Task in the results, but got: {}",
                result.get("tasks").cloned().unwrap_or(Value::Null)
            ),
        )
        .with_code("SFN-TASK-005")),
    }
}

/// DescribeTasks request for the task launched by `run_result`.
pub fn describe_request(run_result: &Value, run_request: &Value) -> Result<Value, AppError> {
    let task = single_task(run_result)?;
    let task_arn = task.get("taskArn").and_then(Value::as_str).ok_or_else(|| {
        AppError::new(
            ErrorCategory::InvocationError,
            format!("RunTask result has no taskArn: {}", task),
        )
        .with_code("SFN-TASK-005")
    })?;
    let cluster = task
        .get("clusterArn")
        .or_else(|| run_request.get("cluster"))
        .cloned()
        .unwrap_or(Value::Null);
    let mut request = json!({ "tasks": [task_arn] });
    if !cluster.is_null() {
        request["cluster"] = cluster;
    }
    Ok(request)
}

/// `lastStatus` of the single described task.
pub fn last_status(describe_result: &Value) -> Result<String, AppError> {
    let task = single_task(describe_result)?;
    Ok(task
        .get("lastStatus")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}
