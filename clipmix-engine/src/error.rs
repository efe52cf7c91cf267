//! Error types for clipmix-engine
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! `Cancelled` is part of the taxonomy but is not a failure: the orchestrator
//! maps it back to `Idle` without surfacing a message.

use thiserror::Error;

/// Main error type for clipmix-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Merge request rejected before any work started
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unreadable, empty or corrupt input blob
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Internal failure while scheduling or mixing the timeline
    #[error("Render error: {0}")]
    Render(String),

    /// Failure reported by the encoder worker
    #[error("Encode error: {0}")]
    Encode(String),

    /// Operation stopped because its cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid argument to a library call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from clipmix-common
    #[error(transparent)]
    Common(#[from] clipmix_common::Error),
}

impl Error {
    /// True for the cancellation outcome, which callers treat as a normal exit
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Convenience Result type using clipmix-engine Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_distinguished() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(!Error::Decode("bad".into()).is_cancellation());
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = Error::Validation("need at least 2 clips, got 1".into());
        assert_eq!(err.to_string(), "Validation error: need at least 2 clips, got 1");

        let common = clipmix_common::Error::InvalidInput("gain".into());
        let err: Error = common.into();
        assert_eq!(err.to_string(), "Invalid input: gain");
    }
}
