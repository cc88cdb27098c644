//! Polling helpers for asynchronous state transitions.
//!
//! Cloud resources change state asynchronously and the platform offers no
//! push notification, so every wait in the suite polls. All waits route
//! through this module so timeout and cadence semantics are the same
//! everywhere:
//!
//! - the predicate is evaluated first, then the deadline is checked, then the
//!   waiter sleeps for one interval
//! - predicate errors propagate immediately; the waiter never suppresses them
//! - there is no attempt limit other than the deadline

use crate::config::ComputeConfig;
use common::error::CloudError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Timeout and interval for one polled wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Build timeout and interval from the compute configuration.
    #[must_use]
    pub fn from_compute(config: &ComputeConfig) -> Self {
        Self::new(config.build_timeout, config.build_interval)
    }

    /// Extend the timeout, e.g. by the configured shelve offload delay.
    #[must_use]
    pub fn with_extra_timeout(self, extra: Duration) -> Self {
        Self {
            timeout: self.timeout + extra,
            ..self
        }
    }
}

/// Poll `probe` until it yields a value or `timeout` elapses.
///
/// Returns `Ok(Some(value))` on the first `Some`, `Ok(None)` once the
/// deadline passes, and the probe's error as soon as it fails.
pub async fn poll_until_some<F, Fut, T, E>(
    mut probe: F,
    timeout: Duration,
    interval: Duration,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let start = Instant::now();
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        if let Some(value) = probe().await? {
            trace!(target: "cloudcheck.eventual", attempt, "Condition met");
            return Ok(Some(value));
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            trace!(target: "cloudcheck.eventual", attempt, ?elapsed, "Deadline reached");
            return Ok(None);
        }

        sleep(interval).await;
    }
}

/// Evaluate `predicate` every `interval` until it returns true or `timeout`
/// elapses.
///
/// Returns `Ok(false)` on timeout; callers that want an error instead use
/// [`wait_until`].
pub async fn call_until_true<F, Fut, E>(
    mut predicate: F,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let found = poll_until_some(
        || {
            let check = predicate();
            async move { Ok::<_, E>(check.await?.then_some(())) }
        },
        timeout,
        interval,
    )
    .await?;
    Ok(found.is_some())
}

/// Like [`call_until_true`] but fails with `CloudError::Timeout` naming
/// `condition` when the deadline passes.
pub async fn wait_until<F, Fut>(
    condition: &str,
    policy: PollPolicy,
    predicate: F,
) -> Result<(), CloudError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, CloudError>>,
{
    if call_until_true(predicate, policy.timeout, policy.interval).await? {
        Ok(())
    } else {
        Err(CloudError::Timeout {
            condition: condition.to_string(),
            waited: policy.timeout,
        })
    }
}
