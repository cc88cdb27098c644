//! Deferred teardown registered at allocation time.

use common::error::{CloudError, Result};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, warn};

type CleanupFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

struct CleanupAction {
    description: String,
    run: Box<dyn FnOnce() -> CleanupFuture + Send>,
}

/// A release action that failed during [`CleanupStack::run_all`].
#[derive(Debug)]
pub struct CleanupFailure {
    pub description: String,
    pub error: CloudError,
}

/// LIFO stack of release actions.
///
/// Every allocation pushes its release action immediately after it succeeds.
/// [`CleanupStack::run_all`] pops and runs them in reverse order, each
/// exactly once, continuing past failures. A `NotFound` answer counts as
/// already released.
#[derive(Default)]
pub struct CleanupStack {
    actions: Vec<CleanupAction>,
}

impl CleanupStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action.
    pub fn push<F, Fut>(&mut self, description: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let description = description.into();
        debug!(target: "cloudcheck.cleanup", action = %description, "Registered cleanup");
        self.actions.push(CleanupAction {
            description,
            run: Box::new(move || Box::pin(action())),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every registered action, most recent first.
    ///
    /// Returns the actions that failed; the stack is empty afterwards.
    pub async fn run_all(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();

        while let Some(action) = self.actions.pop() {
            match (action.run)().await {
                Ok(()) => {
                    info!(
                        target: "cloudcheck.cleanup",
                        action = %action.description,
                        "Cleanup done"
                    );
                }
                Err(e) if e.is_not_found() => {
                    debug!(
                        target: "cloudcheck.cleanup",
                        action = %action.description,
                        "Already released"
                    );
                }
                Err(error) => {
                    warn!(
                        target: "cloudcheck.cleanup",
                        action = %action.description,
                        error = %error,
                        "Cleanup failed"
                    );
                    failures.push(CleanupFailure {
                        description: action.description,
                        error,
                    });
                }
            }
        }

        failures
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            let pending: Vec<&str> = self
                .actions
                .iter()
                .map(|a| a.description.as_str())
                .collect();
            warn!(
                target: "cloudcheck.cleanup",
                ?pending,
                "Cleanup stack dropped with actions still registered; resources leaked"
            );
        }
    }
}

impl std::fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupStack")
            .field("pending", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push_recording(
        stack: &mut CleanupStack,
        log: &Arc<Mutex<Vec<String>>>,
        name: &'static str,
        outcome: fn() -> Result<()>,
    ) {
        let log = log.clone();
        stack.push(name, move || async move {
            log.lock().unwrap().push(name.to_string());
            outcome()
        });
    }

    #[tokio::test]
    async fn test_runs_in_reverse_order() {
        let log = recorder();
        let mut stack = CleanupStack::new();
        push_recording(&mut stack, &log, "keypair", || Ok(()));
        push_recording(&mut stack, &log, "security group", || Ok(()));
        push_recording(&mut stack, &log, "server", || Ok(()));

        let failures = stack.run_all().await;

        assert!(failures.is_empty());
        assert!(stack.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["server", "security group", "keypair"]
        );
    }

    #[tokio::test]
    async fn test_continues_past_failures_and_reports_them() {
        let log = recorder();
        let mut stack = CleanupStack::new();
        push_recording(&mut stack, &log, "first", || Ok(()));
        push_recording(&mut stack, &log, "broken", || {
            Err(CloudError::RequestFailed {
                status: 500,
                body: "boom".to_string(),
            })
        });
        push_recording(&mut stack, &log, "last", || Ok(()));

        let failures = stack.run_all().await;

        assert_eq!(*log.lock().unwrap(), vec!["last", "broken", "first"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].description, "broken");
    }

    #[tokio::test]
    async fn test_not_found_counts_as_released() {
        let log = recorder();
        let mut stack = CleanupStack::new();
        push_recording(&mut stack, &log, "server", || {
            Err(CloudError::NotFound("server".to_string()))
        });

        let failures = stack.run_all().await;
        assert!(failures.is_empty());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_each_action_runs_once() {
        let log = recorder();
        let mut stack = CleanupStack::new();
        push_recording(&mut stack, &log, "volume", || Ok(()));

        stack.run_all().await;
        stack.run_all().await;

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(stack.len(), 0);
    }
}
