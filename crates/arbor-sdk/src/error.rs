use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("staging error: {0}")]
    Stage(#[from] arbor_stage::StageError),

    #[error("store error: {0}")]
    Store(#[from] arbor_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] arbor_refs::RefError),

    #[error("diff error: {0}")]
    Diff(#[from] arbor_diff::DiffError),

    #[error("invalid identity: {0}")]
    Type(#[from] arbor_types::TypeError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
