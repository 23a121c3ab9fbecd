use super::{shape_output, State, StateOutcome, StateScope, Transition};
use crate::core::error::AppError;
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateType};
use crate::core::state_machine::paths;
use crate::core::state_machine::poller::{self, ProbeOutcome};
use crate::core::state_machine::resource::container::{self, STATUS_RUNNING, STATUS_STOPPED};
use crate::core::state_machine::resource::{
    ActivityResult, ActivityTaskStatus, FunctionRequest, ResourceHandle,
};
use crate::core::state_machine::retry::{ErrorPolicy, Recovery};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// A Task state bound to its resolved resource.
pub struct TaskState {
    name: String,
    definition: StateDefinition,
    handle: ResourceHandle,
    scope: StateScope,
}

impl TaskState {
    /// Resolve the resource up front; an unknown resource fails here, before
    /// any call is made.
    pub fn new(
        name: &str,
        definition: StateDefinition,
        scope: StateScope,
    ) -> Result<Self, AppError> {
        let resource = definition.resource.as_deref().ok_or_else(|| {
            AppError::configuration(format!("Task state '{}' is missing Resource", name))
                .with_code("SFN-TASK-001")
        })?;
        let handle = ResourceHandle::classify(resource)?;
        Ok(TaskState {
            name: name.to_string(),
            definition,
            handle,
            scope,
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    fn timeout(&self) -> Duration {
        match self.definition.timeout_seconds {
            Some(seconds) => Duration::from_secs(seconds),
            None => self.scope.runtime.config.execution.default_task_timeout(),
        }
    }

    fn poll_interval(&self) -> Result<Duration, AppError> {
        match self.handle {
            ResourceHandle::Activity { .. } => self.scope.runtime.config.activity.poll_interval(),
            _ => self.scope.runtime.config.container.poll_interval(),
        }
    }

    fn record(&self, event_type: HistoryEventType) {
        self.scope.execution.record(event_type, Some(&self.name));
    }

    fn timeout_error(&self, timeout: Duration) -> AppError {
        AppError::timeout(format!(
            "Exceeded timeout of {}s for state {}",
            timeout.as_secs(),
            self.name
        ))
        .with_code("SFN-TASK-006")
    }

    /// Poll `probe` at this resource's interval until it completes or
    /// `timeout` elapses.
    pub async fn run_until_completion_or_timeout<T, F, Fut>(
        &self,
        probe: F,
        timeout: Duration,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ProbeOutcome<T>, AppError>>,
    {
        let interval = self.poll_interval()?;
        poller::run_until_completion_or_timeout(probe, interval, timeout).await
    }

    /// One attempt against the resource, bracketed by task history events.
    async fn invoke(&self, parameters: Value) -> Result<Value, AppError> {
        let result = match &self.handle {
            ResourceHandle::Function { arn } => self.invoke_function(arn, parameters).await,
            ResourceHandle::RunTaskSync => self.run_container_task(parameters, true).await,
            ResourceHandle::RunTaskAsync => self.run_container_task(parameters, false).await,
            ResourceHandle::Activity { arn } => self.run_activity(arn, parameters).await,
        };
        match &result {
            Ok(_) => self.record(HistoryEventType::TaskSucceeded),
            Err(error) => {
                self.scope.execution.record_failure(
                    HistoryEventType::TaskFailed,
                    Some(&self.name),
                    error,
                );
            }
        }
        result
    }

    async fn invoke_function(&self, arn: &str, payload: Value) -> Result<Value, AppError> {
        self.record(HistoryEventType::TaskScheduled);
        self.record(HistoryEventType::TaskStarted);
        tracing::debug!(state = %self.name, function = arn, "invoking function");

        let request = FunctionRequest {
            function_arn: arn.to_string(),
            payload,
        };
        let timeout = self.timeout();
        let response = tokio::time::timeout(timeout, self.scope.runtime.functions.invoke(request))
            .await
            .map_err(|_| self.timeout_error(timeout))??;
        response.into_result()
    }

    async fn run_container_task(
        &self,
        parameters: Value,
        wait_for_completion: bool,
    ) -> Result<Value, AppError> {
        let transport = self.scope.runtime.containers.as_ref();
        let request = container::build_run_task_request(&parameters);
        let launched = transport.run_task(request.clone()).await?;
        container::check_launch_failures(&self.name, &launched)?;
        self.record(HistoryEventType::TaskScheduled);

        if !wait_for_completion {
            self.record(HistoryEventType::TaskStarted);
            return Ok(launched);
        }

        let describe = container::describe_request(&launched, &request)?;
        let started = AtomicBool::new(false);
        let (started, describe) = (&started, &describe);
        self.run_until_completion_or_timeout(
            move || async move {
                let described = transport.describe_tasks(describe.clone()).await?;
                let status = container::last_status(&described)?;
                let stopped = status == STATUS_STOPPED;
                tracing::debug!(state = %self.name, status = %status, "container task polled");
                if (stopped || status == STATUS_RUNNING) && !started.swap(true, Ordering::SeqCst) {
                    self.record(HistoryEventType::TaskStarted);
                }
                Ok(if stopped {
                    ProbeOutcome::Done(described)
                } else {
                    ProbeOutcome::Pending
                })
            },
            self.timeout(),
        )
        .await
    }

    async fn run_activity(&self, arn: &str, input: Value) -> Result<Value, AppError> {
        let queue = self.scope.runtime.activities.as_ref();
        let token = queue.schedule_task(arn, input).await?;
        self.record(HistoryEventType::TaskScheduled);

        let started = AtomicBool::new(false);
        let (started, token) = (&started, token.as_str());
        let outcome = self.run_until_completion_or_timeout(
            move || async move {
                let status = queue.task_status(token).await?;
                if !matches!(status, ActivityTaskStatus::Pending)
                    && !started.swap(true, Ordering::SeqCst)
                {
                    self.record(HistoryEventType::TaskStarted);
                }
                match status {
                    ActivityTaskStatus::Completed(ActivityResult::Success(output)) => {
                        Ok(ProbeOutcome::Done(output))
                    }
                    ActivityTaskStatus::Completed(ActivityResult::Failure { error, cause }) => {
                        Err(AppError::named(ErrorCategory::InvocationError, error, cause)
                            .with_code("SFN-TASK-007"))
                    }
                    ActivityTaskStatus::Pending | ActivityTaskStatus::InProgress => {
                        Ok(ProbeOutcome::Pending)
                    }
                }
            },
            self.timeout(),
        )
        .await;
        if outcome.is_err() {
            // A retry schedules a fresh token; the abandoned one must not reach a worker.
            if let Err(error) = queue.withdraw_task(token).await {
                tracing::warn!(
                    state = %self.name,
                    task_token = token,
                    error = %error,
                    "failed to withdraw activity task"
                );
            }
        }
        outcome
    }
}

#[async_trait]
impl State for TaskState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Task
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        if self.handle.is_container() {
            container::validate_parameters(&self.name, self.definition.parameters.as_ref())?;
        }

        let entered_at = Utc::now();
        self.record(HistoryEventType::TaskStateEntered);
        tracing::info!(state = %self.name, resource = self.handle.kind(), "task state entered");

        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let policy = ErrorPolicy::new(&self.definition.retry, &self.definition.catch);
        let mut retries = 0u32;

        loop {
            let context = self.scope.context_object(&self.name, entered_at, retries);
            let parameters = paths::apply_parameters(
                &effective_input,
                self.definition.parameters.as_ref(),
                &context,
            )?;

            let error = match self.invoke(parameters).await {
                Ok(result) => {
                    let output =
                        shape_output(&self.definition, &effective_input, result, &context)?;
                    self.record(HistoryEventType::TaskStateExited);
                    return Ok(StateOutcome {
                        output,
                        next: Transition::declared(&self.definition),
                    });
                }
                Err(error) => error,
            };

            match policy.evaluate(&error, retries) {
                Recovery::Retry { delay, attempt } => {
                    tracing::info!(
                        state = %self.name,
                        error = %error.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying task"
                    );
                    sleep(delay).await;
                    retries = attempt;
                }
                Recovery::Catch {
                    next,
                    result_path,
                    error_output,
                } => {
                    tracing::info!(state = %self.name, error = %error.name, next = %next, "task error caught");
                    let output =
                        paths::apply_result_path(&effective_input, &result_path, error_output)?;
                    return Ok(StateOutcome {
                        output,
                        next: Transition::Next(next),
                    });
                }
                Recovery::Propagate => {
                    tracing::warn!(state = %self.name, error = %error, "task failed");
                    return Err(error);
                }
            }
        }
    }
}
