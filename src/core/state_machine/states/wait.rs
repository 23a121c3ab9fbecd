use super::{State, StateOutcome, StateScope, Transition};
use crate::core::error::AppError;
use crate::core::history_recorder::HistoryEventType;
use crate::core::state_machine::definition::{StateDefinition, StateType};
use crate::core::state_machine::paths;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
enum WaitFor {
    Seconds(u64),
    SecondsPath(String),
    Timestamp(DateTime<Utc>),
    TimestampPath(String),
}

/// Delays the workflow for a fixed or input-derived duration.
pub struct WaitState {
    name: String,
    definition: StateDefinition,
    wait_for: WaitFor,
    scope: StateScope,
}

fn runtime_error(message: String) -> AppError {
    AppError::new(ErrorCategory::PathError, message).with_code("SFN-WAIT-002")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

impl WaitState {
    pub fn new(
        name: &str,
        definition: StateDefinition,
        scope: StateScope,
    ) -> Result<Self, AppError> {
        let mut declared = Vec::new();
        if let Some(seconds) = definition.seconds {
            declared.push(WaitFor::Seconds(seconds));
        }
        if let Some(path) = &definition.seconds_path {
            declared.push(WaitFor::SecondsPath(path.clone()));
        }
        if let Some(raw) = &definition.timestamp {
            let timestamp = parse_timestamp(raw).ok_or_else(|| {
                AppError::configuration(format!(
                    "Wait state '{}' has an invalid Timestamp '{}'",
                    name, raw
                ))
                .with_code("SFN-WAIT-001")
            })?;
            declared.push(WaitFor::Timestamp(timestamp));
        }
        if let Some(path) = &definition.timestamp_path {
            declared.push(WaitFor::TimestampPath(path.clone()));
        }

        if declared.len() != 1 {
            return Err(AppError::configuration(format!(
                "Wait state '{}' must declare exactly one of Seconds, SecondsPath, Timestamp or TimestampPath",
                name
            ))
            .with_code("SFN-WAIT-001"));
        }
        let wait_for = declared.remove(0);

        Ok(WaitState {
            name: name.to_string(),
            definition,
            wait_for,
            scope,
        })
    }

    fn delay_for(&self, input: &Value) -> Result<Duration, AppError> {
        let until = |timestamp: DateTime<Utc>| {
            (timestamp - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        };
        match &self.wait_for {
            WaitFor::Seconds(seconds) => Ok(Duration::from_secs(*seconds)),
            WaitFor::SecondsPath(path) => {
                let value = paths::select(input, &Value::Null, path)?;
                value.as_u64().map(Duration::from_secs).ok_or_else(|| {
                    runtime_error(format!(
                        "SecondsPath '{}' must select a non-negative integer, got {}",
                        path, value
                    ))
                })
            }
            WaitFor::Timestamp(timestamp) => Ok(until(*timestamp)),
            WaitFor::TimestampPath(path) => {
                let value = paths::select(input, &Value::Null, path)?;
                value
                    .as_str()
                    .and_then(parse_timestamp)
                    .map(until)
                    .ok_or_else(|| {
                        runtime_error(format!(
                            "TimestampPath '{}' must select an RFC 3339 timestamp, got {}",
                            path, value
                        ))
                    })
            }
        }
    }
}

#[async_trait]
impl State for WaitState {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_type(&self) -> StateType {
        StateType::Wait
    }

    async fn execute(&self, input: Value) -> Result<StateOutcome, AppError> {
        let execution = &self.scope.execution;
        execution.record(HistoryEventType::WaitStateEntered, Some(&self.name));

        let effective_input =
            paths::apply_input_path(&input, self.definition.input_path.as_deref())?;
        let delay = self.delay_for(&effective_input)?;
        tracing::debug!(state = %self.name, delay_ms = delay.as_millis() as u64, "waiting");
        sleep(delay).await;

        let output =
            paths::apply_output_path(&effective_input, self.definition.output_path.as_deref())?;
        execution.record(HistoryEventType::WaitStateExited, Some(&self.name));
        Ok(StateOutcome {
            output,
            next: Transition::declared(&self.definition),
        })
    }
}
