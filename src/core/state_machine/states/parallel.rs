use super::{shape_output, State, StateOutcome, StateScope, Transition};
use crate::core::error::AppError;
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateMachineDefinition, StateType};
use crate::core::state_machine::paths;
use crate::core::state_machine::retry::{ErrorPolicy, Recovery};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::time::sleep;

/// Runs one branch as a sub-workflow and returns its final output.
#[async_trait]
pub trait BranchRunner: Send + Sync {
    async fn run_branch(
        &self,
        branch: &StateMachineDefinition,
        input: Value,
        scope: &StateScope,
    ) -> Result<Value, AppError>;
}

pub struct ParallelState {
    name: String,
    definition: StateDefinition,
    scope: StateScope,
}

impl ParallelState {
    pub fn new(name: &str, definition: StateDefinition, scope: StateScope) -> Self {
        ParallelState {
            name: name.to_string(),
            definition,
            scope,
        }
    }

    fn record(&self, event_type: HistoryEventType) {
        self.scope.execution.record(event_type, Some(&self.name));
    }

    /// Run every branch on the same input and wait for all of them. Outputs
    /// keep declared branch order; the first failing branch in that order
    /// decides the error.
    async fn run_branches(&self, input: &Value) -> Result<Vec<Value>, AppError> {
        let runner = self.scope.branch_runner.as_ref();
        let runs = self
            .definition
            .branches
            .iter()
            .map(|branch| runner.run_branch(branch, input.clone(), &self.scope));
        join_all(runs).await.into_iter().collect()
    }
}

#[async_trait]
impl State for ParallelState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Parallel
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        let entered_at = Utc::now();
        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let branch_input = paths::apply_parameters(
            &effective_input,
            self.definition.parameters.as_ref(),
            &self.scope.context_object(&self.name, entered_at, 0),
        )?;
        self.record(HistoryEventType::ParallelStateEntered);
        self.record(HistoryEventType::ParallelStateStarted);
        tracing::info!(
            state = %self.name,
            branches = self.definition.branches.len(),
            "parallel state started"
        );

        let policy = ErrorPolicy::new(&self.definition.retry, &self.definition.catch);
        let mut retries = 0u32;

        loop {
            let error = match self.run_branches(&branch_input).await {
                Ok(outputs) => {
                    let context = self.scope.context_object(&self.name, entered_at, retries);
                    let output = match shape_output(
                        &self.definition,
                        &effective_input,
                        Value::Array(outputs),
                        &context,
                    ) {
                        Ok(output) => output,
                        Err(error) => {
                            self.scope.execution.record_failure(
                                HistoryEventType::ParallelStateFailed,
                                Some(&self.name),
                                &error,
                            );
                            return Err(error);
                        }
                    };
                    self.record(HistoryEventType::ParallelStateSucceeded);
                    self.record(HistoryEventType::ParallelStateExited);
                    return Ok(StateOutcome {
                        output,
                        next: Transition::declared(&self.definition),
                    });
                }
                Err(error) => error,
            };

            let recovery = policy.evaluate(&error, retries);
            if let Recovery::Retry { delay, attempt } = recovery {
                tracing::info!(
                    state = %self.name,
                    error = %error.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying all branches"
                );
                sleep(delay).await;
                retries = attempt;
                continue;
            }

            self.scope.execution.record_failure(
                HistoryEventType::ParallelStateFailed,
                Some(&self.name),
                &error,
            );
            return match recovery {
                Recovery::Catch {
                    next,
                    result_path,
                    error_output,
                } => {
                    tracing::info!(state = %self.name, error = %error.name, next = %next, "parallel error caught");
                    let output =
                        paths::apply_result_path(&effective_input, &result_path, error_output)?;
                    Ok(StateOutcome {
                        output,
                        next: Transition::Next(next),
                    })
                }
                _ => {
                    tracing::warn!(state = %self.name, error = %error, "parallel state failed");
                    Err(error)
                }
            };
        }
    }
}
