//! Staged mutations over an immutable revision.
//!
//! A [`StagingSession`] is bound to one base revision, accumulates path-keyed
//! writes and removals, and on commit rebuilds only the directories those
//! paths touch. Untouched subtrees are reused by id.
//!
//! Trees are content-addressed, so a parent can only be written once every
//! child id is known. The commit therefore runs in phases:
//!
//! 1. Staged paths are drained deepest-first from a [`DepthQueue`] into the
//!    [`TreeBuilderGraph`]. This phase only reads from the store, so
//!    structural errors never leave written objects behind.
//! 2. Pending blob payloads are written.
//! 3. Directory builders are finalized deepest-first, each folding its new
//!    id into its parent, until the root id is known.
//! 4. The commit object is written and the target ref is moved with a
//!    compare-and-swap.
//!
//! # Modules
//!
//! - [`path`]: [`PathKey`] normalization
//! - [`ledger`]: last-write-wins [`StagingLedger`]
//! - [`queue`]: deepest-first [`DepthQueue`]
//! - [`graph`]: the [`TreeBuilderGraph`]
//! - [`assembler`]: [`CommitAssembler`]
//! - [`session`]: the caller-facing [`StagingSession`]
//! - [`config`]: [`StageConfig`]

pub mod assembler;
pub mod config;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod path;
pub mod queue;
pub mod session;

pub use assembler::{CommitAssembler, CommitOutcome, CommitRequest};
pub use config::{EmptyDirPolicy, StageConfig};
pub use error::{StageError, StageResult};
pub use graph::{BuilderState, FinalizedTree, TreeBuilderGraph};
pub use ledger::{StagedOp, StagingLedger};
pub use path::PathKey;
pub use queue::DepthQueue;
pub use session::{BaseRevision, SessionState, StagingSession};
