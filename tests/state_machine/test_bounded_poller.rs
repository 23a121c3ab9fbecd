use sfn_local::core::error::names;
use sfn_local::core::state_machine::poller::{run_until_completion_or_timeout, ProbeOutcome};
use sfn_local::core::types::ErrorCategory;
use sfn_local::core::AppError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_done_output_is_returned_without_further_polls() {
    let calls = AtomicUsize::new(0);
    let started = Instant::now();

    let output = run_until_completion_or_timeout(
        || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Ok(match call {
                    4 => ProbeOutcome::Done(format!("done after {call}")),
                    _ => ProbeOutcome::Pending,
                })
            }
        },
        Duration::from_secs(2),
        Duration::from_secs(60),
    )
    .await
    .unwrap();

    assert_eq!(output, "done after 4");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_never_done_times_out_at_the_bound() {
    let calls = AtomicUsize::new(0);
    let started = Instant::now();

    let err = run_until_completion_or_timeout(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(ProbeOutcome::<()>::Pending) }
        },
        Duration::from_secs(3),
        Duration::from_secs(10),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category, ErrorCategory::TimeoutError);
    assert_eq!(err.name, names::TIMEOUT);
    assert_eq!(err.code, "SFN-POLL-001");
    assert!(err.message.contains("10000ms"));
    // Probes at 0s, 3s, 6s, 9s and a final one at the 10s deadline.
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_probe_error_stops_polling() {
    let calls = AtomicUsize::new(0);

    let err = run_until_completion_or_timeout(
        || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 2 {
                    Err(AppError::named(
                        ErrorCategory::InvocationError,
                        "ECS.ClusterNotFoundException",
                        "cluster gone",
                    ))
                } else {
                    Ok(ProbeOutcome::<()>::Pending)
                }
            }
        },
        Duration::from_secs(1),
        Duration::from_secs(60),
    )
    .await
    .unwrap_err();

    assert_eq!(err.name, "ECS.ClusterNotFoundException");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_still_probes_once() {
    let calls = AtomicUsize::new(0);

    let result = run_until_completion_or_timeout(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(ProbeOutcome::Done(7)) }
        },
        Duration::from_secs(1),
        Duration::ZERO,
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
