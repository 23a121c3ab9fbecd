use super::{State, StateOutcome, StateScope};
use crate::core::error::{names, AppError};
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateType};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::Value;

/// Stops the workflow with the declared `Error` and `Cause`.
pub struct FailState {
    name: String,
    definition: StateDefinition,
    scope: StateScope,
}

impl FailState {
    pub fn new(name: &str, definition: StateDefinition, scope: StateScope) -> Self {
        FailState {
            name: name.to_string(),
            definition,
            scope,
        }
    }
}

#[async_trait]
impl State for FailState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Fail
    }

    async fn execute(&self, _input: Value) -> Result<StateOutcome, AppError> {
        self.scope
            .execution
            .record(HistoryEventType::FailStateEntered, Some(&self.name));
        let error = self.definition.error.as_deref().unwrap_or(names::FAIL);
        let cause = self.definition.cause.clone().unwrap_or_default();
        tracing::info!(state = %self.name, error, "fail state reached");
        Err(AppError::named(ErrorCategory::StateFailure, error, cause).with_code("SFN-FAIL-001"))
    }
}
