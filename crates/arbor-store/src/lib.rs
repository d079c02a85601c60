//! Content-addressed object storage for Arbor.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Blobs, trees and commits are stored as
//! immutable objects identified by their BLAKE3 hash (domain-separated by
//! object kind).
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing mapping names to object references
//! - [`Commit`] -- root tree, parents, authorship and message
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write object, then update references to it.
//! 3. Concurrent reads are always safe (objects are immutable).
//! 4. The store never interprets object contents on write.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod traits;
pub mod walk;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use memory::InMemoryObjectStore;
pub use object::{
    Blob, Commit, EntryKind, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry,
};
pub use traits::ObjectStore;
pub use walk::entry_at_path;
