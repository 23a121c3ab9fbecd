//! Resource identifiers and the transports that reach them.

pub mod activity;
pub mod container;
pub mod function;

pub use activity::{
    ActivityQueue, ActivityResult, ActivityTask, ActivityTaskStatus, InMemoryActivityQueue,
};
pub use container::{ContainerTransport, HttpContainerTransport};
pub use function::{
    FunctionRequest, FunctionResponse, FunctionTransport, HttpFunctionTransport,
};

use super::arn::{is_valid_arn, ArnKind};
use crate::core::error::AppError;

const RUN_TASK_SYNC: &str = "arn:aws:states:::ecs:runTask.sync";
const RUN_TASK_ASYNC: &str = "arn:aws:states:::ecs:runTask";

/// A Task's resource, resolved once when the Task is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    Function { arn: String },
    RunTaskSync,
    RunTaskAsync,
    Activity { arn: String },
}

impl ResourceHandle {
    /// Map a `Resource` string to its handle. Unknown identifiers are a
    /// configuration error.
    pub fn classify(resource: &str) -> Result<Self, AppError> {
        if resource == RUN_TASK_SYNC {
            return Ok(ResourceHandle::RunTaskSync);
        }
        if resource == RUN_TASK_ASYNC {
            return Ok(ResourceHandle::RunTaskAsync);
        }
        if is_valid_arn(resource, ArnKind::Function) {
            return Ok(ResourceHandle::Function {
                arn: resource.to_string(),
            });
        }
        if is_valid_arn(resource, ArnKind::Activity) {
            return Ok(ResourceHandle::Activity {
                arn: resource.to_string(),
            });
        }
        Err(
            AppError::configuration(format!("Unsupported Resource type: {}", resource))
                .with_code("SFN-TASK-001"),
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(self, ResourceHandle::RunTaskSync | ResourceHandle::RunTaskAsync)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceHandle::Function { .. } => "function",
            ResourceHandle::RunTaskSync => "container-sync",
            ResourceHandle::RunTaskAsync => "container-async",
            ResourceHandle::Activity { .. } => "activity",
        }
    }
}
