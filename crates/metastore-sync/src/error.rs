//! Error types for catalog reconciliation.

use metastore_core::TransformError;

/// Errors returned by a catalog client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The requested object does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The object being created already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Any other backend failure (network, permissions, protocol).
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Result type for catalog client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Broad classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A catalog client call failed.
    Client,
    /// A location could not be transformed.
    Transform,
    /// The diff produced an entity of an unexpected kind.
    TypeMismatch,
    /// The target database already exists.
    SchemaExists,
    /// The operation was cancelled.
    Cancelled,
    /// Reading or writing a catalog snapshot failed.
    Storage,
}

/// Errors that can occur while reconciling catalogs.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A catalog client call failed.
    #[error("{operation} on '{target}' failed: {source}")]
    Client {
        /// Client operation name.
        operation: &'static str,
        /// Database, table or partition the call addressed.
        target: String,
        /// Underlying client error.
        source: ClientError,
    },

    /// A location transformer failed.
    #[error("failed to transform '{target}': {source}")]
    Transform {
        /// Entity being transformed.
        target: String,
        /// Underlying transform error.
        source: TransformError,
    },

    /// A partition diff delivered a non-partition entity.
    #[error("expected {expected} while diffing '{target}', got {found}")]
    TypeMismatch {
        /// Table being diffed.
        target: String,
        /// Expected entity kind.
        expected: &'static str,
        /// Entity kind received.
        found: &'static str,
    },

    /// The target database already exists.
    #[error("database '{0}' already exists")]
    SchemaExists(String),

    /// The operation was cancelled before completing.
    #[error("reconciliation of '{0}' cancelled")]
    Cancelled(String),

    /// IO error reading or writing a snapshot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client { .. } => ErrorKind::Client,
            Self::Transform { .. } => ErrorKind::Transform,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::SchemaExists(_) => ErrorKind::SchemaExists,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn client(
        operation: &'static str,
        target: impl Into<String>,
        source: ClientError,
    ) -> Self {
        Self::Client {
            operation,
            target: target.into(),
            source,
        }
    }

    pub(crate) fn transform(target: impl Into<String>, source: TransformError) -> Self {
        Self::Transform {
            target: target.into(),
            source,
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, SyncError>;
