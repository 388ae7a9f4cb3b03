//! Error types for the volume syncer
//!
//! Provides structured error types for translation, store access against
//! both control planes, and the remote exec helper.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the syncer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Translation Errors
    // =========================================================================
    #[error("Translation failed for {kind}/{name}: {reason}")]
    Translation {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Object {kind} is missing required field {field}")]
    MissingField { kind: String, field: String },

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    // =========================================================================
    // Remote Exec Errors
    // =========================================================================
    #[error("Exec in pod {namespace}/{pod} failed: {reason}")]
    Exec {
        namespace: String,
        pod: String,
        reason: String,
    },

    #[error("{operation}: timed out after {duration:?}: {last_error}")]
    Timeout {
        operation: String,
        duration: Duration,
        last_error: String,
    },
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff (write conflicts land here)
            Error::Kube(_) | Error::Exec { .. } | Error::Internal(_) => {
                ErrorAction::RequeueWithBackoff
            }

            // Timeout - longer retry
            Error::Timeout { .. } => ErrorAction::RequeueAfter(Duration::from_secs(300)),

            // Malformed input won't fix itself until the object changes
            Error::Translation { .. }
            | Error::MissingField { .. }
            | Error::Configuration(_)
            | Error::Kubeconfig(_) => ErrorAction::NoRequeue,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is a write conflict on either control plane
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(resp)) if resp.code == 409)
    }

    /// Short label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal",
            Error::Configuration(_) => "configuration",
            Error::Translation { .. } => "translation",
            Error::MissingField { .. } => "missing_field",
            Error::Kube(_) => "kube",
            Error::Kubeconfig(_) => "kubeconfig",
            Error::Exec { .. } => "exec",
            Error::Timeout { .. } => "timeout",
        }
    }
}

/// Result type alias for the syncer
pub type Result<T> = std::result::Result<T, Error>;
