use strata_types::{Key, KeyError};

/// Boxed cause carried by backend operational failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `get` on an absent key.
    #[error("not found: {0}")]
    NotFound(Key),

    /// The operation was cancelled through its cancellation token.
    #[error("operation aborted")]
    Aborted,

    /// The datastore was closed and has not been reopened.
    #[error("datastore is closed")]
    Closed,

    /// The backend could not be opened.
    #[error("cannot open datastore: {0}")]
    OpenFailed(#[source] BoxError),

    /// The backend failed to write a value.
    #[error("write failed: {0}")]
    WriteFailed(#[source] BoxError),

    /// The backend failed to delete a value.
    #[error("delete failed: {0}")]
    DeleteFailed(#[source] BoxError),

    /// A mount router has no entry covering the key.
    #[error("no datastore mounted for key {0}")]
    NoCoveringMount(Key),

    /// Two mount entries share the same prefix.
    #[error("duplicate mount prefix {0}")]
    DuplicateMount(Key),

    /// A persisted shard descriptor is malformed or unsupported.
    #[error("invalid shard encoding {encoding:?}: {reason}")]
    InvalidShardEncoding { encoding: String, reason: String },

    /// The shard function persisted in a store differs from the requested one.
    #[error("shard function mismatch: requested {requested}, store has {found}")]
    ShardMismatch { requested: String, found: String },

    /// A malformed key string.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A store layout could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    pub fn open_failed(cause: impl Into<BoxError>) -> Self {
        Self::OpenFailed(cause.into())
    }

    pub fn write_failed(cause: impl Into<BoxError>) -> Self {
        Self::WriteFailed(cause.into())
    }

    pub fn delete_failed(cause: impl Into<BoxError>) -> Self {
        Self::DeleteFailed(cause.into())
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`StoreError::Aborted`].
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Result alias for datastore operations.
pub type StoreResult<T> = Result<T, StoreError>;
