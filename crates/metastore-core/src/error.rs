//! Error types for entity transformation.

/// Errors raised while rewriting an entity for its target catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// The location has no branch segment to substitute.
    #[error("location '{location}' has no branch segment to replace with '{branch}'")]
    MissingBranch {
        /// Offending location.
        location: String,
        /// Branch that was to be substituted.
        branch: String,
    },

    /// The location is not a `scheme://host/path` URI.
    #[error("location '{0}' is not a valid storage URI")]
    InvalidLocation(String),

    /// A caller-supplied transformer rejected the location.
    #[error("failed to transform location '{location}': {message}")]
    Rejected {
        /// Offending location.
        location: String,
        /// Reason given by the transformer.
        message: String,
    },
}

impl TransformError {
    /// Builds a [`TransformError::Rejected`].
    #[must_use]
    pub fn rejected(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Result type for transformation.
pub type Result<T> = std::result::Result<T, TransformError>;
