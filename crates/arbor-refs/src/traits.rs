//! The [`RefStore`] trait defining the reference storage interface.

use arbor_types::ObjectId;

use crate::error::Result;
use crate::names::{canonical_branch, HEAD};
use crate::types::{Head, Ref};

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`) and provide atomic
/// read/write/delete operations on named refs. The namespace follows a
/// hierarchical layout:
///
/// - `refs/heads/*` for branches
/// - `refs/tags/*` for tags
pub trait RefStore: Send + Sync {
    /// Read a ref by its canonical name (e.g. "refs/heads/main").
    ///
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<Ref>>;

    /// Write (create or update) a ref at the given canonical name.
    ///
    /// Fails if a tag already exists at `name` (tags are immutable).
    fn write_ref(&self, name: &str, reference: &Ref) -> Result<()>;

    /// Atomically replace the ref at `name` if it currently points at
    /// `expected` (`None` meaning "must not exist yet").
    ///
    /// Fails with [`RefError::Conflict`](crate::RefError::Conflict) and
    /// leaves the ref unchanged otherwise.
    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, reference: &Ref)
        -> Result<()>;

    /// Delete a ref by canonical name.
    ///
    /// Returns `Ok(true)` if the ref existed and was deleted.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// List all refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Ref)>>;

    /// Read the current HEAD state. `Ok(None)` if HEAD has not been set.
    fn head(&self) -> Result<Option<Head>>;

    /// Set HEAD to point at a branch (symbolic ref).
    fn set_head(&self, branch: &str) -> Result<()>;

    /// Set HEAD to a detached state pointing directly to a commit.
    fn set_head_detached(&self, target: ObjectId) -> Result<()>;

    /// Atomically move a detached HEAD from `expected` to `target`.
    fn compare_and_swap_head(&self, expected: Option<ObjectId>, target: ObjectId) -> Result<()>;

    /// List all branch refs.
    fn branches(&self) -> Result<Vec<(String, Ref)>> {
        self.list_refs("refs/heads/")
    }

    /// List all tag refs.
    fn tags(&self) -> Result<Vec<(String, Ref)>> {
        self.list_refs("refs/tags/")
    }

    /// Resolve `HEAD` or a canonical ref name to the commit it points at.
    ///
    /// An unborn branch (HEAD naming a branch with no ref) resolves to `None`.
    fn resolve(&self, name: &str) -> Result<Option<ObjectId>> {
        if name == HEAD {
            return match self.head()? {
                Some(Head::Symbolic(branch)) => {
                    Ok(self.read_ref(&canonical_branch(&branch))?.map(|r| r.target()))
                }
                Some(Head::Detached(target)) => Ok(Some(target)),
                None => Ok(None),
            };
        }
        Ok(self.read_ref(name)?.map(|r| r.target()))
    }
}
