//! Local States Language interpreter: definition model, data-flow paths,
//! retry policy, resources, state variants and the driver that steps
//! through them.

#![allow(clippy::result_large_err)] // State machine APIs return AppError directly to keep diagnostics structured.

pub mod arn;
pub mod definition;
pub mod paths;
pub mod poller;
pub mod resource;
pub mod retry;
pub mod runtime;
pub mod states;

pub use definition::{StateDefinition, StateMachineDefinition, StateType};
pub use runtime::{Runtime, RuntimeBuilder};
pub use states::{State, StateOutcome, StateScope, TaskState, Transition};

use crate::core::error::AppError;
use crate::core::history_recorder::{Execution, FailureDetails, HistoryEventType};
use crate::core::types::{ErrorCategory, ExecutionStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use states::{instantiate_state, BranchRunner};
use std::sync::Arc;
use std::time::Duration;

/// Final result of one top-level run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub status: ExecutionStatus,
    /// Workflow output on success; `{"Error", "Cause"}` otherwise.
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetails>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// Output of a successful run, or the failure as an error carrying the
    /// original error name and message.
    pub fn into_output(self) -> Result<Value, AppError> {
        match self.error {
            None => Ok(self.output),
            Some(details) => {
                let category = match self.status {
                    ExecutionStatus::TimedOut => ErrorCategory::TimeoutError,
                    _ => ErrorCategory::StateFailure,
                };
                let mut error = AppError::named(category, details.cause, details.error)
                    .with_code("SFN-EXEC-003");
                error.add_context("execution_id", &self.execution_id);
                Err(error)
            }
        }
    }
}

/// Branch runner backed by the driver's own stepping loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachineRunner;

#[async_trait]
impl BranchRunner for StateMachineRunner {
    async fn run_branch(
        &self,
        branch: &StateMachineDefinition,
        input: Value,
        scope: &StateScope,
    ) -> Result<Value, AppError> {
        run_states(branch, input, scope).await
    }
}

/// Step through `definition` from `StartAt` until a state ends the run.
pub async fn run_states(
    definition: &StateMachineDefinition,
    input: Value,
    scope: &StateScope,
) -> Result<Value, AppError> {
    let max_transitions = scope.runtime.config.execution.max_transitions;
    let mut current = definition.start_at.clone();
    let mut value = input;
    let mut transitions = 0usize;

    loop {
        transitions += 1;
        if transitions > max_transitions {
            return Err(AppError::new(
                ErrorCategory::StateFailure,
                format!(
                    "execution exceeded {} state transitions at state {}",
                    max_transitions, current
                ),
            )
            .with_name(crate::core::error::names::RUNTIME)
            .with_code("SFN-EXEC-002"));
        }

        let state_definition = definition.state(&current).ok_or_else(|| {
            AppError::configuration(format!("state '{}' is not defined", current))
                .with_code("SFN-EXEC-001")
        })?;
        let state = instantiate_state(&current, state_definition, scope)?;
        let outcome = state.execute(value).await?;
        value = outcome.output;

        match outcome.next {
            states::Transition::Next(next) => {
                tracing::debug!(from = %current, to = %next, "state transition");
                current = next;
            }
            states::Transition::End => return Ok(value),
        }
    }
}

/// Build a Task state for `definition` within `execution`. Fails before any
/// external call when the resource is not supported.
pub fn instantiate_task(
    definition: &StateDefinition,
    execution: &Execution,
    name: &str,
    runtime: &Runtime,
) -> Result<TaskState, AppError> {
    let scope = StateScope::new(
        execution.clone(),
        runtime.clone(),
        Arc::new(StateMachineRunner),
    );
    TaskState::new(name, definition.clone(), scope)
}

/// A parsed workflow bound to one execution.
pub struct StateMachine {
    definition: StateMachineDefinition,
    scope: StateScope,
}

impl StateMachine {
    /// Validate `definition` and start a fresh execution named after
    /// `name`.
    pub fn new(
        name: &str,
        definition: StateMachineDefinition,
        runtime: Runtime,
    ) -> Result<Self, AppError> {
        Self::with_execution(definition, runtime, Execution::for_state_machine(name))
    }

    pub fn with_execution(
        definition: StateMachineDefinition,
        runtime: Runtime,
        execution: Execution,
    ) -> Result<Self, AppError> {
        definition.validate()?;
        Ok(StateMachine {
            definition,
            scope: StateScope::new(execution, runtime, Arc::new(StateMachineRunner)),
        })
    }

    /// Swap the capability Parallel states use to run their branches.
    pub fn with_branch_runner(mut self, runner: Arc<dyn BranchRunner>) -> Self {
        self.scope.branch_runner = runner;
        self
    }

    pub fn execution(&self) -> &Execution {
        &self.scope.execution
    }

    pub fn definition(&self) -> &StateMachineDefinition {
        &self.definition
    }

    /// Run the workflow to completion and record the execution-level
    /// history events.
    pub async fn execute(&self, input: Value) -> ExecutionResult {
        let execution = &self.scope.execution;
        execution.record(HistoryEventType::ExecutionStarted, None);
        tracing::info!(execution_id = %execution.id(), start_at = %self.definition.start_at, "execution started");

        let run = run_states(&self.definition, input, &self.scope);
        let outcome = match self.definition.timeout_seconds {
            Some(seconds) => {
                let limit = Duration::from_secs(seconds);
                match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => {
                        let error = AppError::timeout(format!(
                            "Execution exceeded its timeout of {}s",
                            seconds
                        ))
                        .with_code("SFN-EXEC-004");
                        execution.record_failure(HistoryEventType::ExecutionTimedOut, None, &error);
                        tracing::warn!(execution_id = %execution.id(), "execution timed out");
                        return self.failed(ExecutionStatus::TimedOut, &error);
                    }
                }
            }
            None => run.await,
        };

        match outcome {
            Ok(output) => {
                execution.record(HistoryEventType::ExecutionSucceeded, None);
                tracing::info!(execution_id = %execution.id(), "execution succeeded");
                ExecutionResult {
                    execution_id: execution.id().to_string(),
                    status: ExecutionStatus::Succeeded,
                    output,
                    error: None,
                }
            }
            Err(error) => {
                execution.record_failure(HistoryEventType::ExecutionFailed, None, &error);
                tracing::warn!(execution_id = %execution.id(), error = %error, "execution failed");
                self.failed(ExecutionStatus::Failed, &error)
            }
        }
    }

    fn failed(&self, status: ExecutionStatus, error: &AppError) -> ExecutionResult {
        ExecutionResult {
            execution_id: self.scope.execution.id().to_string(),
            status,
            output: error.error_output(),
            error: Some(FailureDetails::from(error)),
        }
    }
}
