//! Error types for host API calls.

use thiserror::Error;

/// Result type for host API calls.
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by the host application's API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// No document is open.
    #[error("No active document")]
    NoActiveDocument,

    /// The active document is not a design (e.g. a drawing).
    #[error("Active document is not a design")]
    NotADesign,

    /// A named object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind ("Sketch", "Body", "Component", ...).
        kind: &'static str,
        /// The name that was looked up.
        name: String,
    },

    /// An argument is missing, has the wrong type, or is out of range.
    #[error("{0}")]
    InvalidArgument(String),

    /// The document has no cloud data file, so no version history.
    #[error("Document not saved to cloud (no version history)")]
    NotSavedToCloud,

    /// The host cannot perform this operation.
    #[error("{0}")]
    Unsupported(String),

    /// The host API call itself failed.
    #[error("{0}")]
    ApiFailure(String),
}

impl HostError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = HostError::not_found("Sketch", "Profile A");
        assert_eq!(err.to_string(), "Sketch 'Profile A' not found");
    }

    #[test]
    fn fixed_messages() {
        assert_eq!(HostError::NoActiveDocument.to_string(), "No active document");
        assert_eq!(
            HostError::NotSavedToCloud.to_string(),
            "Document not saved to cloud (no version history)"
        );
    }
}
