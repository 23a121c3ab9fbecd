use super::{State, StateOutcome, StateScope, Transition};
use crate::core::error::AppError;
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateType};
use crate::core::state_machine::paths;
use async_trait::async_trait;
use serde_json::Value;

pub struct SucceedState {
    name: String,
    definition: StateDefinition,
    scope: StateScope,
}

impl SucceedState {
    pub fn new(name: &str, definition: StateDefinition, scope: StateScope) -> Self {
        SucceedState {
            name: name.to_string(),
            definition,
            scope,
        }
    }
}

#[async_trait]
impl State for SucceedState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Succeed
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        let execution = &self.scope.execution;
        execution.record(HistoryEventType::SucceedStateEntered, Some(&self.name));
        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let output =
            paths::apply_output_path(&effective_input, self.definition.output_path.as_deref())?;
        execution.record(HistoryEventType::SucceedStateExited, Some(&self.name));
        Ok(StateOutcome {
            output,
            next: Transition::End,
        })
    }
}
