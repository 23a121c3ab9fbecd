use super::{shape_output, State, StateOutcome, StateScope, Transition};
use crate::core::error::AppError;
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateType};
use crate::core::state_machine::paths;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

/// Passes its input, or a fixed `Result`, to the next state.
pub struct PassState {
    name: String,
    definition: StateDefinition,
    scope: StateScope,
}

impl PassState {
    pub fn new(name: &str, definition: StateDefinition, scope: StateScope) -> Self {
        PassState {
            name: name.to_string(),
            definition,
            scope,
        }
    }
}

#[async_trait]
impl State for PassState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Pass
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        let execution = &self.scope.execution;
        execution.record(HistoryEventType::PassStateEntered, Some(&self.name));

        let context = self.scope.context_object(&self.name, Utc::now(), 0);
        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let result = match &self.definition.result {
            Some(result) => result.clone(),
            None => paths::apply_parameters(
                &effective_input,
                self.definition.parameters.as_ref(),
                &context,
            )?,
        };
        let output = shape_output(&self.definition, &effective_input, result, &context)?;

        execution.record(HistoryEventType::PassStateExited, Some(&self.name));
        Ok(StateOutcome {
            output,
            next: Transition::declared(&self.definition),
        })
    }
}
