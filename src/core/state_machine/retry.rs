//! Retry and Catch evaluation shared by Task and Parallel states.

use super::definition::{Catcher, JitterStrategy, ResultPath, Retrier};
use crate::core::error::{names, AppError};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

/// What a state does with an error it raised.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Sleep `delay`, then make retry number `attempt` (1-based).
    Retry { delay: Duration, attempt: u32 },
    /// Transition to `next` with `error_output` placed at `result_path`.
    Catch {
        next: String,
        result_path: ResultPath,
        error_output: Value,
    },
    Propagate,
}

/// Whether `matcher` (one `ErrorEquals` entry) accepts `error`.
pub fn matches_error(matcher: &str, error: &AppError) -> bool {
    match matcher {
        names::ALL => true,
        names::TASK_FAILED => error.name != names::TIMEOUT,
        other => other == error.name,
    }
}

fn matches_any(matchers: &[String], error: &AppError) -> bool {
    matchers.iter().any(|matcher| matches_error(matcher, error))
}

/// Delay before retry number `attempt` (1-based):
/// `IntervalSeconds * BackoffRate^attempt`, capped by `MaxDelaySeconds`.
pub fn backoff_delay(retrier: &Retrier, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let mut seconds = retrier.interval_seconds * retrier.backoff_rate.powi(exponent);
    if let Some(cap) = retrier.max_delay_seconds {
        seconds = seconds.min(cap);
    }
    if !seconds.is_finite() || seconds < 0.0 {
        seconds = retrier.max_delay_seconds.unwrap_or(0.0).max(0.0);
    }
    // Finite products past u64::MAX seconds saturate instead of panicking.
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

fn jittered(retrier: &Retrier, delay: Duration) -> Duration {
    match retrier.jitter_strategy {
        JitterStrategy::None => delay,
        JitterStrategy::Full => {
            let seconds = rand::thread_rng().gen_range(0.0..=delay.as_secs_f64());
            Duration::try_from_secs_f64(seconds).unwrap_or(delay)
        }
    }
}

/// A state's declared `Retry` and `Catch` rules.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPolicy<'a> {
    retriers: &'a [Retrier],
    catchers: &'a [Catcher],
}

impl<'a> ErrorPolicy<'a> {
    pub fn new(retriers: &'a [Retrier], catchers: &'a [Catcher]) -> Self {
        Self { retriers, catchers }
    }

    /// Decide how to recover from `error` given the retries already made
    /// for this state instance. Errors in non-recoverable categories always
    /// propagate.
    pub fn evaluate(&self, error: &AppError, retries_made: u32) -> Recovery {
        if !error.is_recoverable() {
            return Recovery::Propagate;
        }

        if let Some(retrier) = self
            .retriers
            .iter()
            .find(|retrier| matches_any(&retrier.error_equals, error))
        {
            let attempt = retries_made.saturating_add(1);
            if attempt <= retrier.max_attempts {
                let delay = jittered(retrier, backoff_delay(retrier, attempt));
                return Recovery::Retry { delay, attempt };
            }
        }

        match self
            .catchers
            .iter()
            .find(|catcher| matches_any(&catcher.error_equals, error))
        {
            Some(catcher) => Recovery::Catch {
                next: catcher.next.clone(),
                result_path: catcher.result_path.clone(),
                error_output: error.error_output(),
            },
            None => Recovery::Propagate,
        }
    }
}
