//! Path lookup inside stored trees.

use arbor_types::ObjectId;

use crate::error::StoreResult;
use crate::object::TreeEntry;
use crate::traits::ObjectStore;

/// Find the entry at a slash-separated `path` below the tree `root`.
///
/// Returns `Ok(None)` when any component is missing, or when a component
/// other than the last one names a file. `root == None` is an empty tree.
/// The empty path has no entry (the root is not an entry of anything).
pub fn entry_at_path(
    store: &dyn ObjectStore,
    root: Option<&ObjectId>,
    path: &str,
) -> StoreResult<Option<TreeEntry>> {
    let Some(root) = root else {
        return Ok(None);
    };
    let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
    let mut tree_id = *root;
    while let Some(name) = components.next() {
        let tree = store.read_tree(&tree_id)?;
        let Some(entry) = tree.get(name) else {
            return Ok(None);
        };
        if components.peek().is_none() {
            return Ok(Some(entry.clone()));
        }
        if !entry.mode.is_dir() {
            return Ok(None);
        }
        tree_id = entry.object_id;
    }
    Ok(None)
}
