//! Error types shared across the export pipeline.

use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A configuration value that could not be used.
///
/// These never abort a run: the offending value is dropped (headers) or
/// replaced by the next layer's value (timeout, protocol, compression).
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A header entry without a `key=value` shape.
    #[error("malformed header entry '{0}' ignored")]
    MalformedHeader(String),

    /// An environment variable carried a value that could not be parsed.
    #[error("{name}: {reason}")]
    InvalidValue {
        /// The environment variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Coarse cause of a failed export, used to pick the diagnostic message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// TLS handshake or certificate problem.
    Ssl,
    /// Connection refused, reset, timed out, or a non-2xx response.
    Network,
    /// Anything else: encoding, request construction, client setup.
    Other,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Ssl => write!(f, "ssl"),
            FailureReason::Network => write!(f, "network"),
            FailureReason::Other => write!(f, "other"),
        }
    }
}

/// A failed export attempt.
///
/// The detail is meant for the diagnostic log only. It is implementation
/// specific and must not be shown as the primary status line.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("trace export failed ({reason}): {detail}")]
pub struct ExportError {
    /// Classified cause.
    pub reason: FailureReason,
    /// Underlying error text.
    pub detail: String,
}

impl ExportError {
    pub(crate) fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        ExportError {
            reason,
            detail: detail.into(),
        }
    }

    pub(crate) fn other(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Other, detail)
    }
}

/// Errors raised while executing the workflow.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The agent asked for a tool this workflow does not provide.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

impl WorkflowError {
    /// Stable identifier recorded as `error.type` on the failing span.
    pub fn error_type(&self) -> &'static str {
        match self {
            WorkflowError::UnknownTool(_) => "UnknownTool",
        }
    }
}

/// Errors from a delegated inference backend.
///
/// The agent step treats all of them as recoverable and falls back to the
/// synthetic response.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum InferenceError {
    /// The HTTP client could not be created.
    #[error("failed to build inference client: {0}")]
    ClientBuild(String),

    /// The request could not be sent or the response body not read.
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("inference backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response did not have the chat completion shape.
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),
}
