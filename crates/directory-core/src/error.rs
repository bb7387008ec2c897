//! Error types for the contact directory

use thiserror::Error;

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur in the contact directory
///
/// These never propagate past the best-effort wrappers in
/// [`crate::directory`]; the raw trait methods expose them so tests and
/// administrative tooling can still observe storage failures.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing store could not be reached or rejected the operation
    #[error("directory unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// The backing store returned a row that cannot be interpreted
    #[error("malformed directory record for key {phone_key}")]
    MalformedRecord {
        /// Phone key of the offending record
        phone_key: String,
    },
}

impl DirectoryError {
    /// Create a malformed record error
    pub fn malformed_record(phone_key: impl Into<String>) -> Self {
        Self::MalformedRecord {
            phone_key: phone_key.into(),
        }
    }
}
