//! Reference management for Arbor.
//!
//! This crate provides named references (branches, tags, HEAD) that point to
//! commits in the object store. References are the human-readable entry
//! points into history, analogous to git refs.
//!
//! # Architecture
//!
//! - **Branches** are mutable pointers to commits. They advance as new
//!   commits are created, always through [`RefStore::compare_and_swap`] so
//!   two writers racing from the same base cannot both win.
//! - **Tags** are immutable pointers. Once created, a tag cannot be moved;
//!   delete and recreate if needed.
//! - **HEAD** is a symbolic ref that names the current branch, or a detached
//!   ref pointing directly to a commit.
//!
//! # Modules
//!
//! - [`error`] — Error types for ref operations
//! - [`types`] — Core ref types: [`Ref`], [`Head`]
//! - [`traits`] — The [`RefStore`] trait defining the storage interface
//! - [`names`] — Branch/tag name validation
//! - [`memory`] — In-memory [`InMemoryRefStore`]

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::InMemoryRefStore;
pub use names::{canonical_branch, validate_branch_name, validate_tag_name, HEAD};
pub use traits::RefStore;
pub use types::{Head, Ref};
