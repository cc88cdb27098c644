//! Shared call recording and failure injection for the mocks.

use common::error::CloudError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Ordered record of mock calls, shareable across mocks.
///
/// Entries are `"operation"` or `"operation:resource"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries whose operation is `operation`.
    pub fn entries_for(&self, operation: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.split(':').next() == Some(operation))
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.entries_for(operation).len()
    }

    /// Entries starting with `delete_`, in call order.
    pub fn deletions(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with("delete_"))
            .collect()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Error a mock operation can be told to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    NotFound,
    Conflict,
    Forbidden,
    ServerError,
}

impl InjectedFailure {
    pub fn to_error(self, operation: &str) -> CloudError {
        let message = format!("injected failure in {operation}");
        match self {
            InjectedFailure::NotFound => CloudError::NotFound(message),
            InjectedFailure::Conflict => CloudError::Conflict(message),
            InjectedFailure::Forbidden => CloudError::Forbidden(message),
            InjectedFailure::ServerError => CloudError::RequestFailed {
                status: 500,
                body: message,
            },
        }
    }
}

/// Per-operation injected failures.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailurePlan {
    failures: HashMap<String, InjectedFailure>,
}

impl FailurePlan {
    pub(crate) fn insert(&mut self, operation: &str, failure: InjectedFailure) {
        self.failures.insert(operation.to_string(), failure);
    }

    pub(crate) fn check(&self, operation: &str) -> Result<(), CloudError> {
        match self.failures.get(operation) {
            Some(failure) => {
                debug!(target: "cloudcheck.mocks", operation, ?failure, "Injecting failure");
                Err(failure.to_error(operation))
            }
            None => Ok(()),
        }
    }
}
