//! Error types for the Doppel domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what a turn
//! returns to the caller.

use thiserror::Error;

/// Boxed error returned by caller-supplied hooks (stream callbacks, checkpoints).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The top-level error type for all Doppel operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator transport errors, propagated unchanged ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    // --- Skill errors (direct commands only; dispatch narrates them) ---
    #[error("Skill error: {0}")]
    Skill(#[from] SkillError),

    // --- Tool-call decoding ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Construction ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Response rejected by supervisor (verdict: {verdict:?})")]
    SupervisorRejected { verdict: String },

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[source] BoxError),

    #[error("Stream callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum VectorStoreError {
    #[error("Dimension mismatch in {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum SkillError {
    #[error("Skill not found: {0}")]
    NotFound(String),

    #[error("Invalid skill arguments: {0}")]
    InvalidArguments(String),

    #[error("Skill execution failed: {skill}: {reason}")]
    ExecutionFailed { skill: String, reason: String },

    #[error("Skill cancelled")]
    Cancelled,

    /// The output sink refused a result; the dispatcher reports the cause.
    #[error("Skill output rejected")]
    Aborted,
}

impl SkillError {
    pub fn failed(skill: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExecutionFailed {
            skill: skill.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed tool call #{index}: {reason}")]
    MalformedToolCall { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 503,
            message: "model is loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn skill_error_displays_correctly() {
        let err = SkillError::failed("search", "upstream returned nothing");
        assert_eq!(
            err.to_string(),
            "Skill execution failed: search: upstream returned nothing"
        );
    }

    #[test]
    fn supervisor_rejection_shows_verdict() {
        let err = Error::SupervisorRejected { verdict: "true".into() };
        assert!(err.to_string().contains("\"true\""));
    }

    #[test]
    fn callback_error_keeps_source() {
        let err = Error::Callback("client went away".into());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("client went away"));
    }
}
