//! Error taxonomy shared by the cloud API adapters and the scenario core.
//!
//! Adapters map HTTP failures onto these variants so the core can recover
//! from the few idempotency cases it knows about (duplicate role assignment,
//! already-deleted resources during cleanup, policy denials) and propagate
//! everything else unchanged.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving the cloud platform.
#[derive(Error, Debug)]
pub enum CloudError {
    /// Resource or role absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists or relation already established
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Action rejected by the platform's policy engine
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Configuration does not match the deployment
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A polled condition never converged
    #[error("Timed out after {waited:?} waiting for {condition}")]
    Timeout { condition: String, waited: Duration },

    /// A resource entered its terminal error state while being waited on
    #[error("{resource} entered status {status}")]
    BuildFailed { resource: String, status: String },

    /// A probe returned a value different from the one captured earlier
    #[error("Verification of {what} failed: expected {expected:?}, got {actual:?}")]
    VerificationFailed {
        what: String,
        expected: String,
        actual: String,
    },

    /// Non-success HTTP status not covered by a dedicated variant
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Payload did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Remote command exited with a non-zero status
    #[error("Remote command `{command}` exited with {status}: {stderr}")]
    RemoteCommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    /// Whether this error reports a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    /// Whether this error reports a conflicting resource state.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::Conflict(_))
    }

    /// Whether this error is a policy denial.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, CloudError::Forbidden(_))
    }
}

/// Result type alias using `CloudError`
pub type Result<T> = std::result::Result<T, CloudError>;
