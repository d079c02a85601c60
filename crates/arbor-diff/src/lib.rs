//! Tree diffs for Arbor.
//!
//! Compares two root trees and reports file-level changes with full paths.
//! Subtrees with equal ids are skipped without being read, so the cost of a
//! diff follows the size of the change rather than the size of the trees.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- added/deleted/modified/mode-changed/renamed files

pub mod error;
pub mod tree_diff;

pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_trees, TreeChange, TreeDiff};
