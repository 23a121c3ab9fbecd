#[path = "../common/mod.rs"]
mod common;

use common::*;
use serde_json::json;
use sfn_local::core::error::names;
use sfn_local::core::history_recorder::{Execution, HistoryEventType};
use sfn_local::core::state_machine::poller::ProbeOutcome;
use sfn_local::core::state_machine::resource::{
    ActivityQueue, ActivityResult, FunctionResponse, InMemoryActivityQueue,
};
use sfn_local::core::state_machine::{instantiate_task, Runtime, State, Transition};
use sfn_local::core::types::ErrorCategory;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn function_task() -> serde_json::Value {
    json!({
        "Type": "Task",
        "Resource": FUNCTION_ARN,
        "Next": "NextState"
    })
}

#[tokio::test]
async fn test_function_task_returns_payload_and_next_state() {
    let functions = Arc::new(
        ScriptedFunctionTransport::new().respond(FunctionResponse::ok(json!({"comment": "output"}))),
    );
    let runtime = runtime_with_functions(functions.clone());
    let execution = Execution::new("exec-task");
    let task = instantiate_task(&state(function_task()), &execution, "Invoke", &runtime).unwrap();

    let outcome = task.execute(json!({"comment": "input"})).await.unwrap();

    assert_eq!(outcome.output["comment"], "output");
    assert_eq!(outcome.next.next_state(), Some("NextState"));
    assert_eq!(functions.requests()[0].payload, json!({"comment": "input"}));
    assert_eq!(functions.requests()[0].function_arn, FUNCTION_ARN);
    assert_eq!(
        execution.event_types(),
        vec![
            HistoryEventType::TaskStateEntered,
            HistoryEventType::TaskScheduled,
            HistoryEventType::TaskStarted,
            HistoryEventType::TaskSucceeded,
            HistoryEventType::TaskStateExited,
        ]
    );
}

#[tokio::test]
async fn test_function_error_surfaces_kind_and_message() {
    let functions = Arc::new(ScriptedFunctionTransport::new().respond(
        FunctionResponse::function_error("Unhandled", json!({"errorMessage": "error"})),
    ));
    let runtime = runtime_with_functions(functions);
    let execution = Execution::new("exec-task");
    let task = instantiate_task(&state(function_task()), &execution, "Invoke", &runtime).unwrap();

    let err = task.execute(json!({"comment": "input"})).await.unwrap_err();

    assert_eq!(err.name, "Unhandled");
    assert_eq!(err.message, "error");
    assert_eq!(execution.count(HistoryEventType::TaskFailed), 1);
    assert_eq!(execution.count(HistoryEventType::TaskStateExited), 0);
    let failed = execution
        .events()
        .into_iter()
        .find(|event| event.event_type == HistoryEventType::TaskFailed)
        .unwrap();
    let details = failed.details.unwrap();
    assert_eq!(details.cause, "Unhandled");
    assert_eq!(details.error, "error");
}

#[tokio::test]
async fn test_paths_shape_function_input_and_output() {
    let functions = Arc::new(
        ScriptedFunctionTransport::new()
            .respond(FunctionResponse::ok(json!({"body": {"total": 42}, "meta": "drop"}))),
    );
    let runtime = runtime_with_functions(functions.clone());
    let execution = Execution::new("exec-paths");
    let definition = state(json!({
        "Type": "Task",
        "Resource": FUNCTION_ARN,
        "InputPath": "$.order",
        "Parameters": {"id.$": "$.id", "state.$": "$$.State.Name", "fixed": true},
        "ResultSelector": {"total.$": "$.body.total"},
        "ResultPath": "$.result",
        "OutputPath": "$.result",
        "End": true
    }));
    let task = instantiate_task(&definition, &execution, "Price", &runtime).unwrap();

    let outcome = task
        .execute(json!({"order": {"id": "o-1"}, "other": 1}))
        .await
        .unwrap();

    assert_eq!(
        functions.requests()[0].payload,
        json!({"id": "o-1", "state": "Price", "fixed": true})
    );
    assert_eq!(outcome.output, json!({"total": 42}));
    assert_eq!(outcome.next, Transition::End);
}

#[tokio::test]
async fn test_unknown_resource_fails_before_any_call() {
    let functions = Arc::new(ScriptedFunctionTransport::new());
    let runtime = runtime_with_functions(functions.clone());
    let execution = Execution::new("exec-unknown");
    let definition = state(json!({
        "Type": "Task",
        "Resource": "arn:aws:sqs:us-east-1:123456789012:queue",
        "End": true
    }));

    let err = match instantiate_task(&definition, &execution, "Bad", &runtime) {
        Ok(_) => panic!("unsupported resource was accepted"),
        Err(err) => err,
    };

    assert_eq!(err.category, ErrorCategory::ConfigurationError);
    assert!(err.message.contains("Unsupported Resource type"));
    assert_eq!(functions.calls(), 0);
    assert!(execution.is_empty());
}

#[tokio::test]
async fn test_container_task_without_parameters_names_attribute() {
    let containers = Arc::new(ScriptedContainerTransport::new(task_json("t-1", "PENDING")));
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task = instantiate_task(
        &state(json!({"Type": "Task", "Resource": RUN_TASK_SYNC, "End": true})),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let err = task.execute(json!({})).await.unwrap_err();

    assert!(err.message.contains("'Parameters'"));
    assert!(containers.run_requests().is_empty());
}

#[tokio::test]
async fn test_container_task_without_task_definition_names_attribute() {
    let containers = Arc::new(ScriptedContainerTransport::new(task_json("t-1", "PENDING")));
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task = instantiate_task(
        &state(json!({
            "Type": "Task",
            "Resource": RUN_TASK_SYNC,
            "Parameters": {"Cluster": "default"},
            "End": true
        })),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let err = task.execute(json!({})).await.unwrap_err();

    assert!(err.message.contains("'Parameters.TaskDefinition'"));
    assert!(containers.run_requests().is_empty());
}

fn container_task(resource: &str) -> serde_json::Value {
    json!({
        "Type": "Task",
        "Resource": resource,
        "Parameters": {
            "Cluster": "default",
            "TaskDefinition": "job:1",
            "LaunchType": "FARGATE",
            "Overrides": {"ContainerOverrides": [{"Name": "app", "Command.$": "$.command"}]}
        },
        "Next": "Done"
    })
}

#[tokio::test(start_paused = true)]
async fn test_sync_container_task_polls_until_stopped() {
    let stopped = task_json("t-1", "STOPPED");
    let containers = Arc::new(
        ScriptedContainerTransport::new(task_json("t-1", "PENDING"))
            .then_describe(task_json("t-1", "PENDING"))
            .then_describe(task_json("t-1", "PENDING"))
            .then_describe(task_json("t-1", "PENDING"))
            .then_describe(stopped.clone()),
    );
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task = instantiate_task(
        &state(container_task(RUN_TASK_SYNC)),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let outcome = task.execute(json!({"command": ["run"]})).await.unwrap();

    assert_eq!(containers.describe_calls(), 4);
    assert_eq!(outcome.output, stopped);
    assert_eq!(outcome.next.next_state(), Some("Done"));
    assert_eq!(execution.count(HistoryEventType::TaskStarted), 1);

    let request = &containers.run_requests()[0];
    assert_eq!(request["taskDefinition"], "job:1");
    assert_eq!(request["launchType"], "FARGATE");
    assert_eq!(
        request["overrides"]["containerOverrides"][0]["command"],
        json!(["run"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_sync_container_task_stopped_on_first_describe() {
    let containers = Arc::new(
        ScriptedContainerTransport::new(task_json("t-1", "PROVISIONING"))
            .then_describe(task_json("t-1", "STOPPED")),
    );
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task = instantiate_task(
        &state(container_task(RUN_TASK_SYNC)),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let outcome = task.execute(json!({"command": []})).await.unwrap();

    assert_eq!(containers.describe_calls(), 1);
    assert_eq!(outcome.output["tasks"][0]["lastStatus"], "STOPPED");
}

#[tokio::test]
async fn test_launch_failures_fail_before_describe() {
    let containers = Arc::new(
        ScriptedContainerTransport::new(json!({
            "tasks": [],
            "failures": [{"arn": "arn:aws:ecs:container-instance/1", "reason": "RESOURCE:MEMORY"}]
        }))
        .then_describe(task_json("t-1", "STOPPED")),
    );
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task = instantiate_task(
        &state(container_task(RUN_TASK_SYNC)),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let err = task.execute(json!({"command": []})).await.unwrap_err();

    assert_eq!(err.category, ErrorCategory::LaunchFailureError);
    assert!(err
        .message
        .starts_with("There were failures running the ECS Task for state RunIt"));
    assert!(err.message.contains("RESOURCE:MEMORY"));
    assert_eq!(containers.describe_calls(), 0);
    assert_eq!(execution.count(HistoryEventType::TaskScheduled), 0);
}

#[tokio::test]
async fn test_async_container_task_returns_run_result() {
    let launched = task_json("t-1", "PENDING");
    let containers = Arc::new(ScriptedContainerTransport::new(launched.clone()));
    let runtime = runtime_with_containers(containers.clone());
    let execution = Execution::new("exec-ecs");
    let task =
        instantiate_task(&state(container_task(RUN_TASK)), &execution, "RunIt", &runtime).unwrap();

    let outcome = task.execute(json!({"command": []})).await.unwrap();

    assert_eq!(outcome.output, launched);
    assert_eq!(containers.describe_calls(), 0);
    assert_eq!(execution.count(HistoryEventType::TaskStarted), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_completion_returns_first_done_output() {
    let runtime = Runtime::builder(test_config()).build();
    let execution = Execution::new("exec-poll");
    let task = instantiate_task(
        &state(container_task(RUN_TASK_SYNC)),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();
    let calls = AtomicUsize::new(0);

    let output = task
        .run_until_completion_or_timeout(
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Ok(if call >= 3 {
                        ProbeOutcome::Done(call)
                    } else {
                        ProbeOutcome::Pending
                    })
                }
            },
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    assert_eq!(output, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_until_completion_times_out() {
    let runtime = Runtime::builder(test_config()).build();
    let execution = Execution::new("exec-poll");
    let task = instantiate_task(
        &state(container_task(RUN_TASK_SYNC)),
        &execution,
        "RunIt",
        &runtime,
    )
    .unwrap();

    let err = task
        .run_until_completion_or_timeout(
            || async { Ok(ProbeOutcome::<()>::Pending) },
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert_eq!(err.category, ErrorCategory::TimeoutError);
    assert_eq!(err.name, names::TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_retries_then_catches_into_result_path() {
    let functions = Arc::new(
        ScriptedFunctionTransport::new()
            .fail(invocation_error("Unhandled", "boom"))
            .fail(invocation_error("Unhandled", "boom"))
            .fail(invocation_error("Unhandled", "boom")),
    );
    let runtime = runtime_with_functions(functions.clone());
    let execution = Execution::new("exec-retry");
    let definition = state(json!({
        "Type": "Task",
        "Resource": FUNCTION_ARN,
        "Retry": [{"ErrorEquals": ["Unhandled"], "IntervalSeconds": 1, "BackoffRate": 2, "MaxAttempts": 2}],
        "Catch": [{"ErrorEquals": ["States.ALL"], "Next": "Recover", "ResultPath": "$.error"}],
        "Next": "NextState"
    }));
    let task = instantiate_task(&definition, &execution, "Flaky", &runtime).unwrap();
    let started = tokio::time::Instant::now();

    let outcome = task.execute(json!({"id": 7})).await.unwrap();

    assert_eq!(functions.calls(), 3);
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(outcome.next.next_state(), Some("Recover"));
    assert_eq!(
        outcome.output,
        json!({"id": 7, "error": {"Error": "Unhandled", "Cause": "boom"}})
    );
    assert_eq!(execution.count(HistoryEventType::TaskFailed), 3);
    assert_eq!(execution.count(HistoryEventType::TaskScheduled), 3);
    assert_eq!(execution.count(HistoryEventType::TaskStateExited), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_second_attempt() {
    let functions = Arc::new(
        ScriptedFunctionTransport::new()
            .fail(invocation_error("Lambda.ServiceException", "busy"))
            .respond(FunctionResponse::ok(json!("ok"))),
    );
    let runtime = runtime_with_functions(functions.clone());
    let execution = Execution::new("exec-retry");
    let definition = state(json!({
        "Type": "Task",
        "Resource": FUNCTION_ARN,
        "Retry": [{"ErrorEquals": ["States.TaskFailed"]}],
        "End": true
    }));
    let task = instantiate_task(&definition, &execution, "Flaky", &runtime).unwrap();

    let outcome = task.execute(json!({})).await.unwrap();

    assert_eq!(outcome.output, json!("ok"));
    assert_eq!(functions.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_function_timeout_is_states_timeout() {
    let functions = Arc::new(
        ScriptedFunctionTransport::new()
            .with_delay(Duration::from_secs(30))
            .respond(FunctionResponse::ok(json!({}))),
    );
    let runtime = runtime_with_functions(functions);
    let execution = Execution::new("exec-timeout");
    let definition = state(json!({
        "Type": "Task",
        "Resource": FUNCTION_ARN,
        "TimeoutSeconds": 5,
        "Retry": [{"ErrorEquals": ["States.TaskFailed"]}],
        "End": true
    }));
    let task = instantiate_task(&definition, &execution, "Slow", &runtime).unwrap();

    let err = task.execute(json!({})).await.unwrap_err();

    assert_eq!(err.name, names::TIMEOUT);
    assert_eq!(execution.count(HistoryEventType::TaskScheduled), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_task_completes_through_worker() {
    let queue = Arc::new(InMemoryActivityQueue::new());
    let runtime = Runtime::builder(test_config())
        .with_activity_queue(queue.clone())
        .build();
    let execution = Execution::new("exec-activity");
    let definition = state(json!({"Type": "Task", "Resource": ACTIVITY_ARN, "End": true}));
    let task = instantiate_task(&definition, &execution, "Approve", &runtime).unwrap();

    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move {
            loop {
                if let Some(claimed) = queue.find_pending_task(ACTIVITY_ARN).await.unwrap() {
                    let approved = json!({"approved": claimed.input["amount"] == 10});
                    queue
                        .enqueue_result(&claimed.task_token, ActivityResult::Success(approved))
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    };

    let outcome = task.execute(json!({"amount": 10})).await.unwrap();
    worker.await.unwrap();

    assert_eq!(outcome.output, json!({"approved": true}));
    assert_eq!(execution.count(HistoryEventType::TaskStarted), 1);
    assert_eq!(execution.count(HistoryEventType::TaskSucceeded), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_failure_is_named_by_worker_error() {
    let queue = Arc::new(InMemoryActivityQueue::new());
    let runtime = Runtime::builder(test_config())
        .with_activity_queue(queue.clone())
        .build();
    let execution = Execution::new("exec-activity");
    let definition = state(json!({"Type": "Task", "Resource": ACTIVITY_ARN, "End": true}));
    let task = instantiate_task(&definition, &execution, "Approve", &runtime).unwrap();

    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move {
            loop {
                if let Some(claimed) = queue.find_pending_task(ACTIVITY_ARN).await.unwrap() {
                    queue
                        .enqueue_result(
                            &claimed.task_token,
                            ActivityResult::Failure {
                                error: "Rejected".to_string(),
                                cause: "over budget".to_string(),
                            },
                        )
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    };

    let err = task.execute(json!({"amount": 10_000})).await.unwrap_err();
    worker.await.unwrap();

    assert_eq!(err.name, "Rejected");
    assert_eq!(err.message, "over budget");
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_activity_attempt_is_not_handed_to_worker() {
    let queue = Arc::new(InMemoryActivityQueue::new());
    let runtime = Runtime::builder(test_config())
        .with_activity_queue(queue.clone())
        .build();
    let execution = Execution::new("exec-activity");
    let definition = state(json!({
        "Type": "Task",
        "Resource": ACTIVITY_ARN,
        "TimeoutSeconds": 1,
        "Retry": [{"ErrorEquals": ["States.Timeout"], "MaxAttempts": 1}],
        "End": true
    }));
    let task = instantiate_task(&definition, &execution, "Approve", &runtime).unwrap();

    // First attempt times out at 1s; the retry schedules again at 3s.
    let worker = {
        let queue = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            let claimed = queue
                .find_pending_task(ACTIVITY_ARN)
                .await
                .unwrap()
                .expect("retry attempt is pending");
            queue
                .enqueue_result(&claimed.task_token, ActivityResult::Success(claimed.input))
                .await
                .unwrap();
            claimed.task_token
        })
    };

    let outcome = task.execute(json!({"attempt": "retry"})).await.unwrap();
    let token = worker.await.unwrap();

    assert_eq!(outcome.output, json!({"attempt": "retry"}));
    assert_eq!(execution.count(HistoryEventType::TaskScheduled), 2);
    assert!(queue.find_pending_task(ACTIVITY_ARN).await.unwrap().is_none());
    let err = queue.task_status(&token).await.unwrap_err();
    assert_eq!(err.name, "TaskDoesNotExist");
}
