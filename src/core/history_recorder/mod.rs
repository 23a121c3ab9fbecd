//! Append-only execution history shared by every state of one run.

use crate::core::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Lifecycle transitions recorded in an execution's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    ExecutionStarted,
    ExecutionSucceeded,
    ExecutionFailed,
    ExecutionTimedOut,
    TaskStateEntered,
    TaskStateExited,
    TaskScheduled,
    TaskStarted,
    TaskSucceeded,
    TaskFailed,
    ParallelStateEntered,
    ParallelStateStarted,
    ParallelStateSucceeded,
    ParallelStateFailed,
    ParallelStateExited,
    PassStateEntered,
    PassStateExited,
    WaitStateEntered,
    WaitStateExited,
    ChoiceStateEntered,
    ChoiceStateExited,
    SucceedStateEntered,
    SucceedStateExited,
    FailStateEntered,
}

impl HistoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventType::ExecutionStarted => "EXECUTION_STARTED",
            HistoryEventType::ExecutionSucceeded => "EXECUTION_SUCCEEDED",
            HistoryEventType::ExecutionFailed => "EXECUTION_FAILED",
            HistoryEventType::ExecutionTimedOut => "EXECUTION_TIMED_OUT",
            HistoryEventType::TaskStateEntered => "TASK_STATE_ENTERED",
            HistoryEventType::TaskStateExited => "TASK_STATE_EXITED",
            HistoryEventType::TaskScheduled => "TASK_SCHEDULED",
            HistoryEventType::TaskStarted => "TASK_STARTED",
            HistoryEventType::TaskSucceeded => "TASK_SUCCEEDED",
            HistoryEventType::TaskFailed => "TASK_FAILED",
            HistoryEventType::ParallelStateEntered => "PARALLEL_STATE_ENTERED",
            HistoryEventType::ParallelStateStarted => "PARALLEL_STATE_STARTED",
            HistoryEventType::ParallelStateSucceeded => "PARALLEL_STATE_SUCCEEDED",
            HistoryEventType::ParallelStateFailed => "PARALLEL_STATE_FAILED",
            HistoryEventType::ParallelStateExited => "PARALLEL_STATE_EXITED",
            HistoryEventType::PassStateEntered => "PASS_STATE_ENTERED",
            HistoryEventType::PassStateExited => "PASS_STATE_EXITED",
            HistoryEventType::WaitStateEntered => "WAIT_STATE_ENTERED",
            HistoryEventType::WaitStateExited => "WAIT_STATE_EXITED",
            HistoryEventType::ChoiceStateEntered => "CHOICE_STATE_ENTERED",
            HistoryEventType::ChoiceStateExited => "CHOICE_STATE_EXITED",
            HistoryEventType::SucceedStateEntered => "SUCCEED_STATE_ENTERED",
            HistoryEventType::SucceedStateExited => "SUCCEED_STATE_EXITED",
            HistoryEventType::FailStateEntered => "FAIL_STATE_ENTERED",
        }
    }
}

impl std::fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure payload attached to failed events: `cause` holds the error
/// name, `error` the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetails {
    pub cause: String,
    pub error: String,
}

impl From<&AppError> for FailureDetails {
    fn from(error: &AppError) -> Self {
        FailureDetails {
            cause: error.name.clone(),
            error: error.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    #[serde(default, flatten, skip_serializing_if = "Option::is_none")]
    pub details: Option<FailureDetails>,
}

struct ExecutionRecord {
    id: String,
    started_at: DateTime<Utc>,
    events: Mutex<Vec<HistoryEvent>>,
}

/// Handle on one workflow run. Clones share the same history log, so
/// sibling Parallel branches may append concurrently.
#[derive(Clone)]
pub struct Execution {
    inner: Arc<ExecutionRecord>,
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.inner.id)
            .field("events", &self.len())
            .finish()
    }
}

impl Execution {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Execution {
            inner: Arc::new(ExecutionRecord {
                id: id.into(),
                started_at: Utc::now(),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start a run whose identifier is derived from the state machine name.
    pub fn for_state_machine(state_machine_name: &str) -> Self {
        Execution::new(format!(
            "arn:aws:states:local:000000000000:execution:{}:{}",
            state_machine_name,
            Uuid::new_v4()
        ))
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Append an event and return its sequence id.
    pub fn record(&self, event_type: HistoryEventType, state_name: Option<&str>) -> u64 {
        self.push(event_type, state_name, None)
    }

    /// Append a failed-status event carrying the error name and message.
    pub fn record_failure(
        &self,
        event_type: HistoryEventType,
        state_name: Option<&str>,
        error: &AppError,
    ) -> u64 {
        self.push(event_type, state_name, Some(FailureDetails::from(error)))
    }

    fn push(
        &self,
        event_type: HistoryEventType,
        state_name: Option<&str>,
        details: Option<FailureDetails>,
    ) -> u64 {
        let mut events = self.lock();
        let id = events.len() as u64 + 1;
        tracing::debug!(
            execution_id = %self.inner.id,
            event_id = id,
            event_type = %event_type,
            state = state_name.unwrap_or("-"),
            "history event"
        );
        events.push(HistoryEvent {
            id,
            event_type,
            timestamp: Utc::now(),
            state_name: state_name.map(str::to_string),
            details,
        });
        id
    }

    /// Snapshot of the log in append order.
    pub fn events(&self) -> Vec<HistoryEvent> {
        self.lock().clone()
    }

    pub fn event_types(&self) -> Vec<HistoryEventType> {
        self.lock().iter().map(|event| event.event_type).collect()
    }

    pub fn count(&self, event_type: HistoryEventType) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEvent>> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
