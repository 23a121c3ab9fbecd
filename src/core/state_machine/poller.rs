//! Constant-interval polling with an overall deadline.

use crate::core::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Result of one probe call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome<T> {
    Done(T),
    Pending,
}

/// Call `probe` until it reports `Done`, sleeping `interval` between calls.
/// Fails with a `States.Timeout` error once `timeout` has elapsed without
/// completion. Probe errors abort the loop.
pub async fn run_until_completion_or_timeout<T, F, Fut>(
    mut probe: F,
    interval: Duration,
    timeout: Duration,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ProbeOutcome<T>, AppError>>,
{
    let started = Instant::now();
    let mut polls: u64 = 0;
    loop {
        polls += 1;
        if let ProbeOutcome::Done(output) = probe().await? {
            tracing::debug!(polls, "poll completed");
            return Ok(output);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(AppError::timeout(format!(
                "Exceeded timeout of {}ms after {} polls",
                timeout.as_millis(),
                polls
            ))
            .with_code("SFN-POLL-001"));
        }

        let wait = interval.min(timeout - elapsed);
        tracing::trace!(polls, wait_ms = wait.as_millis() as u64, "resource pending");
        sleep(wait).await;
    }
}
