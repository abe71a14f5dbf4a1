//! Error types for FeedForge

use thiserror::Error;

/// Main error type for stream enumeration.
///
/// Variants split into two classes. Fatal errors (malformed arguments, foreign
/// cursors, mismatched state kinds) must propagate to the caller. Everything
/// else is degradable: a fan-out operator may log it and substitute a safe
/// default for the failing branch.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A caller passed an argument outside the operation's contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A cursor produced by another operator kind was presented to `stream`.
    #[error("Inappropriate cursor for stream {stream}: got {found} cursor")]
    InappropriateCursor { stream: String, found: &'static str },

    /// Two cursors of different kinds were combined.
    #[error("Cannot combine {left} cursor with {right} cursor")]
    CursorTypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// Two filter states of different kinds were merged.
    #[error("Cannot merge {left} filter state with {right} filter state")]
    FilterStateMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// An operator was constructed with an unusable configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stream failed during its own enumeration.
    #[error("Stream {stream} failed: {message}")]
    Branch { stream: String, message: String },

    /// A filter implementation failed.
    #[error("Filter error: {0}")]
    Filter(String),

    /// A ranker implementation failed.
    #[error("Ranker error: {0}")]
    Ranker(String),

    /// An injector or one of its injections failed.
    #[error("Injector error: {0}")]
    Injector(String),

    /// The cache store rejected an operation.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A cursor, element or cached page could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StreamError {
    /// Creates a branch failure for the stream with the given identity.
    pub fn branch(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Branch {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Returns true if no operator may swallow this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::InappropriateCursor { .. }
                | Self::CursorTypeMismatch { .. }
                | Self::FilterStateMismatch { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_errors() {
        assert!(StreamError::InvalidArgument("count".into()).is_fatal());
        assert!(StreamError::InappropriateCursor {
            stream: "feed".into(),
            found: "offset",
        }
        .is_fatal());
        assert!(StreamError::CursorTypeMismatch {
            left: "offset",
            right: "multi",
        }
        .is_fatal());
    }

    #[test]
    fn classifies_degradable_errors() {
        assert!(!StreamError::branch("feed", "timeout").is_fatal());
        assert!(!StreamError::Ranker("model offline".into()).is_fatal());
        assert!(!StreamError::Injector("no inventory".into()).is_fatal());
        assert!(!StreamError::Cache("down".into()).is_fatal());
    }

    #[test]
    fn branch_error_message_names_stream() {
        let err = StreamError::branch("dashboard", "boom");
        assert_eq!(err.to_string(), "Stream dashboard failed: boom");
    }
}
