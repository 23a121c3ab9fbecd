//! State variants and the pieces they share.

pub mod choice;
pub mod fail;
pub mod parallel;
pub mod pass;
pub mod succeed;
pub mod task;
pub mod wait;

pub use choice::ChoiceState;
pub use fail::FailState;
pub use parallel::{BranchRunner, ParallelState};
pub use pass::PassState;
pub use succeed::SucceedState;
pub use task::TaskState;
pub use wait::WaitState;

use super::definition::{StateDefinition, StateType};
use super::paths;
use super::runtime::Runtime;
use crate::core::error::AppError;
use crate::core::history_recorder::Execution;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Where control goes after a state finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    End,
}

impl Transition {
    /// `Next` when declared, otherwise the end of the workflow.
    pub fn declared(definition: &StateDefinition) -> Self {
        match &definition.next {
            Some(next) => Transition::Next(next.clone()),
            None => Transition::End,
        }
    }

    pub fn next_state(&self) -> Option<&str> {
        match self {
            Transition::Next(name) => Some(name),
            Transition::End => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateOutcome {
    pub output: Value,
    pub next: Transition,
}

/// One executable node of the workflow graph.
#[async_trait]
pub trait State: Send + Sync {
    fn name(&self) -> &str;

    fn state_type(&self) -> StateType;

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError>;
}

/// Everything a state needs from the run it belongs to.
#[derive(Clone)]
pub struct StateScope {
    pub execution: Execution,
    pub runtime: Runtime,
    pub branch_runner: Arc<dyn BranchRunner>,
}

impl StateScope {
    pub fn new(
        execution: Execution,
        runtime: Runtime,
        branch_runner: Arc<dyn BranchRunner>,
    ) -> Self {
        Self {
            execution,
            runtime,
            branch_runner,
        }
    }

    /// The `$$` context object seen by path expressions.
    pub fn context_object(
        &self,
        state_name: &str,
        entered_at: DateTime<Utc>,
        retry_count: u32,
    ) -> Value {
        json!({
            "Execution": {
                "Id": self.execution.id(),
                "StartTime": self.execution.started_at().to_rfc3339(),
            },
            "State": {
                "Name": state_name,
                "EnteredTime": entered_at.to_rfc3339(),
                "RetryCount": retry_count,
            },
        })
    }
}

/// ResultSelector, then ResultPath into the effective input, then OutputPath.
pub(crate) fn shape_output(
    definition: &StateDefinition,
    effective_input: &Value,
    result: Value,
    context: &Value,
) -> Result<Value, AppError> {
    let selected = match &definition.result_selector {
        Some(selector) => paths::apply_parameters(&result, Some(selector), context)?,
        None => result,
    };
    let merged = paths::apply_result_path(effective_input, &definition.result_path, selected)?;
    Ok(paths::apply_output_path(
        &merged,
        definition.output_path.as_deref(),
    )?)
}

/// Build the executable state for a definition.
pub fn instantiate_state(
    name: &str,
    definition: &StateDefinition,
    scope: &StateScope,
) -> Result<Box<dyn State>, AppError> {
    let state: Box<dyn State> = match definition.state_type {
        StateType::Task => Box::new(TaskState::new(name, definition.clone(), scope.clone())?),
        StateType::Parallel => Box::new(ParallelState::new(name, definition.clone(), scope.clone())),
        StateType::Pass => Box::new(PassState::new(name, definition.clone(), scope.clone())),
        StateType::Wait => Box::new(WaitState::new(name, definition.clone(), scope.clone())?),
        StateType::Choice => Box::new(ChoiceState::new(name, definition.clone(), scope.clone())?),
        StateType::Succeed => Box::new(SucceedState::new(name, definition.clone(), scope.clone())),
        StateType::Fail => Box::new(FailState::new(name, definition.clone(), scope.clone())),
    };
    Ok(state)
}
