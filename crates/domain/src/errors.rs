//! Error types used throughout a sync run

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of a sync run, used to locate fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Validate,
    Authorize,
    Read,
    Transform,
    Chunk,
    Submit,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validate => "validate",
            Self::Authorize => "authorize",
            Self::Read => "read",
            Self::Transform => "transform",
            Self::Chunk => "chunk",
            Self::Submit => "submit",
        };
        f.write_str(label)
    }
}

/// Main error type for FieldSync
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Protocol error from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    #[error("Transient failure{}: {message}", status_suffix(.status))]
    Transient { status: Option<u16>, message: String },

    #[error("Client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A fatal error that stopped a run part-way through.
    #[error(
        "sync against {endpoint} aborted during {stage} after {batches_submitted} batch(es): {cause}"
    )]
    Aborted {
        endpoint: String,
        stage: SyncStage,
        batches_submitted: usize,
        cause: Box<SyncError>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

impl SyncError {
    pub fn protocol(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol { endpoint: endpoint.into(), message: message.into() }
    }

    /// Wraps `self` with the context of the run it stopped.
    #[must_use]
    pub fn aborted(
        self,
        endpoint: impl Into<String>,
        stage: SyncStage,
        batches_submitted: usize,
    ) -> Self {
        Self::Aborted {
            endpoint: endpoint.into(),
            stage,
            batches_submitted,
            cause: Box::new(self),
        }
    }

    /// The innermost error, looking through `Aborted` wrappers.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Aborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            Self::Transient { status, .. } => *status,
            Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.root_cause() {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Authorization(_) => ErrorCategory::Authorization,
            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::Client { .. } => ErrorCategory::Client,
            Self::Storage(_) | Self::Internal(_) | Self::Aborted { .. } => ErrorCategory::Internal,
        }
    }

    /// Whether this error ends the run instead of failing a single batch.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Aborted { .. } => true,
            _ => !matches!(self.category(), ErrorCategory::Transient | ErrorCategory::Client),
        }
    }
}

/// Coarse classification recorded on failed batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Client,
    Authorization,
    Protocol,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Transient => "transient",
            Self::Client => "client",
            Self::Authorization => "authorization",
            Self::Protocol => "protocol",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Result type alias for FieldSync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_error_exposes_root_cause_and_context() {
        let err = SyncError::Client { status: 404, message: "gone".into() }.aborted(
            "https://api.example.com/users",
            SyncStage::Read,
            0,
        );

        assert_eq!(err.category(), ErrorCategory::Client);
        assert_eq!(err.status(), Some(404));
        assert!(err.is_fatal());
        let rendered = err.to_string();
        assert!(rendered.contains("during read"));
        assert!(rendered.contains("after 0 batch(es)"));
        assert!(rendered.contains("HTTP 404"));
    }

    #[test]
    fn only_transient_and_client_errors_are_batch_scoped() {
        assert!(!SyncError::Transient { status: Some(503), message: String::new() }.is_fatal());
        assert!(!SyncError::Client { status: 400, message: String::new() }.is_fatal());
        assert!(SyncError::Authorization("denied".into()).is_fatal());
        assert!(SyncError::protocol("x", "bad body").is_fatal());
        assert!(SyncError::Configuration("empty field".into()).is_fatal());
    }

    #[test]
    fn transient_display_includes_status_when_known() {
        let with = SyncError::Transient { status: Some(502), message: "bad gateway".into() };
        let without = SyncError::Transient { status: None, message: "connect refused".into() };
        assert_eq!(with.to_string(), "Transient failure (HTTP 502): bad gateway");
        assert_eq!(without.to_string(), "Transient failure: connect refused");
    }
}
