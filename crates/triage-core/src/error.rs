//! Error types for the triage engine

use thiserror::Error;

/// Result type for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

/// Errors that can occur while driving a contact through triage
///
/// All variants are recoverable from the caller's point of view: the flow
/// surfaces a "try again" notice and the phase does not advance. There are
/// no automatic retries; retry is always a fresh user action.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The completion call failed (transport, auth, or provider error)
    #[error("completion call failed: {message}")]
    CompletionCallFailed {
        /// Underlying failure description
        message: String,
    },

    /// The completion call returned no content
    #[error("completion response was empty")]
    EmptyCompletion,

    /// A flow method was called in a state that does not permit it
    #[error("invalid state: {message}")]
    InvalidState {
        /// What was attempted and why it is not allowed
        message: String,
    },
}

impl TriageError {
    /// Create a completion failure from any displayable cause
    pub fn completion_failed(message: impl Into<String>) -> Self {
        Self::CompletionCallFailed {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TriageError {
    fn from(e: reqwest::Error) -> Self {
        Self::completion_failed(e.to_string())
    }
}
