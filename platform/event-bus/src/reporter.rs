//! Error-reporting collaborator.
//!
//! Publish failures and malformed/unprocessable consumption failures are
//! handed to an [`ErrorReporter`] for observability. Control flow never
//! depends on it: a stuck event surfaces here, not to end users.

use async_trait::async_trait;
use uuid::Uuid;

/// Why an event failed, as reported to observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The outer envelope did not parse; transport dead-lettering applies.
    MalformedEnvelope(String),
    /// The envelope carried a version this process cannot parse; skipped.
    IncompatibleVersion { version: String },
    /// The broker rejected or timed out a publish.
    PublishFailure(String),
    /// A handler returned an error; the message will be redelivered.
    HandlerFailure(String),
    /// A handler exceeded its invocation bound; treated as failure.
    HandlerTimeout { timeout_ms: u64 },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedEnvelope(e) => write!(f, "malformed envelope: {e}"),
            Self::IncompatibleVersion { version } => {
                write!(f, "incompatible version: {version}")
            }
            Self::PublishFailure(e) => write!(f, "publish failure: {e}"),
            Self::HandlerFailure(e) => write!(f, "handler failure: {e}"),
            Self::HandlerTimeout { timeout_ms } => {
                write!(f, "handler exceeded {timeout_ms}ms")
            }
        }
    }
}

/// Observability sink for event failures.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// `event_id` is absent when the envelope itself could not be parsed.
    async fn report(&self, event_type: &str, event_id: Option<Uuid>, reason: &FailureReason);
}

/// Default reporter: structured error logs.
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

#[async_trait]
impl ErrorReporter for TracingReporter {
    async fn report(&self, event_type: &str, event_id: Option<Uuid>, reason: &FailureReason) {
        tracing::error!(
            event_type = %event_type,
            event_id = %event_id.map(|id| id.to_string()).unwrap_or_else(|| "unknown".into()),
            reason = %reason,
            "Event failure reported"
        );
    }
}
