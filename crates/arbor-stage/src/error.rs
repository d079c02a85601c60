//! Error types for staging and commit assembly.

use arbor_store::EntryMode;
use arbor_types::ObjectId;
use thiserror::Error;

/// Errors that can occur while staging or committing.
#[derive(Debug, Error)]
pub enum StageError {
    /// A mutation or commit was attempted before a base revision was bound.
    #[error("no base revision")]
    NoBaseRevision,

    /// The session is already bound to a base revision.
    #[error("base revision already set")]
    BaseAlreadySet,

    /// The session was already committed (or failed while committing).
    #[error("staging session already committed")]
    AlreadyCommitted,

    /// A path component that must be a directory is a file in the base tree.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// The path does not exist in the base tree or among pending writes.
    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    /// The same path is staged both as a file and as a directory.
    #[error("path staged as both a file and a directory: {path}")]
    PathConflict { path: String },

    /// The path cannot be normalized into a staged path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Directories cannot be staged as file contents.
    #[error("invalid mode for staged content: {0:?}")]
    InvalidMode(EntryMode),

    /// The named revision does not resolve to a commit.
    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    /// The target ref moved since the session's base was read.
    #[error("ref {name} moved: expected {expected:?}, found {actual:?}")]
    Conflict {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// Configuration could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Object store operation failed.
    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),

    /// Ref store operation failed.
    #[error("ref error: {0}")]
    Ref(arbor_refs::RefError),
}

impl From<arbor_refs::RefError> for StageError {
    fn from(err: arbor_refs::RefError) -> Self {
        match err {
            arbor_refs::RefError::Conflict {
                name,
                expected,
                actual,
            } => StageError::Conflict {
                name,
                expected,
                actual,
            },
            other => StageError::Ref(other),
        }
    }
}

/// Convenience alias for staging results.
pub type StageResult<T> = Result<T, StageError>;
