//! High-level SDK for Arbor.
//!
//! A [`Repository`] wraps one object store and one ref store. It resolves
//! revision expressions, walks history, browses trees through [`Revision`]
//! and [`Node`], and opens an [`Index`] for staged commits.

pub mod error;
pub mod index;
pub mod repository;
pub mod revision;
pub mod revspec;

pub use error::{SdkError, SdkResult};
pub use index::Index;
pub use repository::{RefMap, Repository};
pub use revision::{Node, Revision};

// Re-export key types
pub use arbor_diff::{TreeChange, TreeDiff};
pub use arbor_stage::{CommitOutcome, CommitRequest, EmptyDirPolicy, StageConfig};
pub use arbor_store::{EntryKind, EntryMode};
pub use arbor_types::{ObjectId, Signature};
