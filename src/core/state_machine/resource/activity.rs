use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Work handed to an activity worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTask {
    pub task_token: String,
    pub input: Value,
}

/// Outcome a worker reports for a claimed task.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityResult {
    Success(Value),
    Failure { error: String, cause: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivityTaskStatus {
    Pending,
    InProgress,
    Completed(ActivityResult),
}

/// Hand-off point between Activity tasks and external workers. A pending
/// task is returned by `find_pending_task` to at most one caller.
#[async_trait]
pub trait ActivityQueue: Send + Sync {
    /// Queue work for `activity_arn`; returns the task token.
    async fn schedule_task(&self, activity_arn: &str, input: Value) -> Result<String, AppError>;

    /// Claim the oldest pending task for `activity_arn`.
    async fn find_pending_task(&self, activity_arn: &str) -> Result<Option<ActivityTask>, AppError>;

    /// Record a worker's result for a claimed task.
    async fn enqueue_result(&self, task_token: &str, result: ActivityResult) -> Result<(), AppError>;

    /// Current status of a task. A `Completed` status is returned once and
    /// the task is then forgotten.
    async fn task_status(&self, task_token: &str) -> Result<ActivityTaskStatus, AppError>;

    /// Drop a task whose Task attempt gave up on it, whether it is still
    /// pending or already claimed. Unknown tokens are ignored.
    async fn withdraw_task(&self, task_token: &str) -> Result<(), AppError>;
}

struct Entry {
    input: Value,
    status: ActivityTaskStatus,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<String, VecDeque<String>>,
    tasks: HashMap<String, Entry>,
}

/// Process-local activity queue.
#[derive(Default)]
pub struct InMemoryActivityQueue {
    state: Mutex<QueueState>,
}

impl InMemoryActivityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unknown_token(task_token: &str) -> AppError {
    AppError::named(
        ErrorCategory::InvocationError,
        "TaskDoesNotExist",
        format!("no activity task with token {}", task_token),
    )
    .with_code("SFN-ACT-001")
}

#[async_trait]
impl ActivityQueue for InMemoryActivityQueue {
    async fn schedule_task(&self, activity_arn: &str, input: Value) -> Result<String, AppError> {
        let token = Uuid::new_v4().to_string();
        let mut state = self.lock();
        state.tasks.insert(
            token.clone(),
            Entry {
                input,
                status: ActivityTaskStatus::Pending,
            },
        );
        state
            .pending
            .entry(activity_arn.to_string())
            .or_default()
            .push_back(token.clone());
        tracing::debug!(activity = activity_arn, task_token = %token, "activity task scheduled");
        Ok(token)
    }

    async fn find_pending_task(&self, activity_arn: &str) -> Result<Option<ActivityTask>, AppError> {
        let mut state = self.lock();
        let Some(token) = state
            .pending
            .get_mut(activity_arn)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };
        let entry = state
            .tasks
            .get_mut(&token)
            .ok_or_else(|| unknown_token(&token))?;
        entry.status = ActivityTaskStatus::InProgress;
        Ok(Some(ActivityTask {
            input: entry.input.clone(),
            task_token: token,
        }))
    }

    async fn enqueue_result(&self, task_token: &str, result: ActivityResult) -> Result<(), AppError> {
        let mut state = self.lock();
        let entry = state
            .tasks
            .get_mut(task_token)
            .ok_or_else(|| unknown_token(task_token))?;
        if entry.status != ActivityTaskStatus::InProgress {
            return Err(AppError::named(
                ErrorCategory::InvocationError,
                "InvalidToken",
                format!("activity task {} is not in progress", task_token),
            )
            .with_code("SFN-ACT-002"));
        }
        entry.status = ActivityTaskStatus::Completed(result);
        Ok(())
    }

    async fn task_status(&self, task_token: &str) -> Result<ActivityTaskStatus, AppError> {
        let mut state = self.lock();
        let status = state
            .tasks
            .get(task_token)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| unknown_token(task_token))?;
        if matches!(status, ActivityTaskStatus::Completed(_)) {
            state.tasks.remove(task_token);
        }
        Ok(status)
    }

    async fn withdraw_task(&self, task_token: &str) -> Result<(), AppError> {
        let mut state = self.lock();
        if state.tasks.remove(task_token).is_none() {
            return Ok(());
        }
        for queued in state.pending.values_mut() {
            queued.retain(|token| token != task_token);
        }
        state.pending.retain(|_, queued| !queued.is_empty());
        tracing::debug!(task_token, "activity task withdrawn");
        Ok(())
    }
}
