//! Scripted transports and fixtures shared by the state machine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use sfn_local::core::config::RuntimeConfig;
use sfn_local::core::state_machine::definition::StateDefinition;
use sfn_local::core::state_machine::resource::{
    ContainerTransport, FunctionRequest, FunctionResponse, FunctionTransport,
};
use sfn_local::core::state_machine::{Runtime, StateMachineDefinition};
use sfn_local::core::types::ErrorCategory;
use sfn_local::core::AppError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:my-function";
pub const ACTIVITY_ARN: &str = "arn:aws:states:us-east-1:123456789012:activity:my-activity";
pub const RUN_TASK_SYNC: &str = "arn:aws:states:::ecs:runTask.sync";
pub const RUN_TASK: &str = "arn:aws:states:::ecs:runTask";

/// Function transport that replays queued responses in order. Once the
/// queue is drained every call returns `{}`.
#[derive(Default)]
pub struct ScriptedFunctionTransport {
    responses: Mutex<VecDeque<Result<FunctionResponse, AppError>>>,
    requests: Mutex<Vec<FunctionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedFunctionTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, response: FunctionResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: AppError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<FunctionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl FunctionTransport for ScriptedFunctionTransport {
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, AppError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FunctionResponse::ok(json!({}))))
    }
}

/// Container transport with one RunTask result and a queue of
/// DescribeTasks results; the last describe result repeats.
pub struct ScriptedContainerTransport {
    run_result: Value,
    describes: Mutex<VecDeque<Value>>,
    run_requests: Mutex<Vec<Value>>,
    describe_calls: AtomicUsize,
}

impl ScriptedContainerTransport {
    pub fn new(run_result: Value) -> Self {
        ScriptedContainerTransport {
            run_result,
            describes: Mutex::new(VecDeque::new()),
            run_requests: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
        }
    }

    pub fn then_describe(self, result: Value) -> Self {
        self.describes.lock().unwrap().push_back(result);
        self
    }

    pub fn run_requests(&self) -> Vec<Value> {
        self.run_requests.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerTransport for ScriptedContainerTransport {
    async fn run_task(&self, request: Value) -> Result<Value, AppError> {
        self.run_requests.lock().unwrap().push(request);
        Ok(self.run_result.clone())
    }

    async fn describe_tasks(&self, _request: Value) -> Result<Value, AppError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut describes = self.describes.lock().unwrap();
        let next = if describes.len() > 1 {
            describes.pop_front()
        } else {
            describes.front().cloned()
        };
        next.ok_or_else(|| {
            AppError::new(ErrorCategory::InvocationError, "no describe result scripted")
        })
    }
}

pub fn task_json(arn: &str, status: &str) -> Value {
    json!({
        "tasks": [{
            "taskArn": arn,
            "clusterArn": "arn:aws:ecs:us-east-1:123456789012:cluster/default",
            "lastStatus": status
        }],
        "failures": []
    })
}

/// Config with short poll intervals so paused-clock tests stay small.
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.container.poll_interval = "1s".to_string();
    config.activity.poll_interval = "100ms".to_string();
    config
}

pub fn runtime_with_functions(functions: Arc<ScriptedFunctionTransport>) -> Runtime {
    Runtime::builder(test_config())
        .with_function_transport(functions)
        .build()
}

pub fn runtime_with_containers(containers: Arc<ScriptedContainerTransport>) -> Runtime {
    Runtime::builder(test_config())
        .with_container_transport(containers)
        .build()
}

pub fn state(definition: Value) -> StateDefinition {
    serde_json::from_value(definition).expect("state definition")
}

pub fn machine(definition: Value) -> StateMachineDefinition {
    serde_json::from_value(definition).expect("state machine definition")
}

pub fn invocation_error(name: &str, message: &str) -> AppError {
    AppError::named(ErrorCategory::InvocationError, name, message)
}
