//! Recursive tree diff: compare two root trees and list the changed files.
//!
//! Directories never appear as changes themselves; an added or deleted
//! directory shows up as one change per file beneath it. A deleted file
//! and an added file with identical content are reported as a rename.

use std::collections::{BTreeMap, BTreeSet};

use arbor_store::{EntryMode, ObjectStore, Tree, TreeEntry};
use arbor_types::ObjectId;

use crate::error::{DiffError, DiffResult};

/// The result of comparing two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Changes in path order.
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The change touching `path`, if any. Renames match on either side.
    pub fn get(&self, path: &str) -> Option<&TreeChange> {
        self.changes.iter().find(|change| match change {
            TreeChange::Renamed {
                old_path, new_path, ..
            } => old_path == path || new_path == path,
            other => other.path() == path,
        })
    }
}

/// A single file-level change between two trees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    Added {
        path: String,
        new_id: ObjectId,
        mode: EntryMode,
    },
    Deleted {
        path: String,
        old_id: ObjectId,
        mode: EntryMode,
    },
    /// Same path, different content.
    Modified {
        path: String,
        old_id: ObjectId,
        new_id: ObjectId,
        mode: EntryMode,
    },
    /// Same path and content, different mode.
    ModeChanged {
        path: String,
        id: ObjectId,
        old_mode: EntryMode,
        new_mode: EntryMode,
    },
    /// Content moved unchanged from `old_path` to `new_path`.
    Renamed {
        old_path: String,
        new_path: String,
        id: ObjectId,
        mode: EntryMode,
    },
}

impl TreeChange {
    /// The path the change applies to (the new path for renames).
    pub fn path(&self) -> &str {
        match self {
            TreeChange::Added { path, .. }
            | TreeChange::Deleted { path, .. }
            | TreeChange::Modified { path, .. }
            | TreeChange::ModeChanged { path, .. } => path,
            TreeChange::Renamed { new_path, .. } => new_path,
        }
    }
}

/// Compare the trees `old` and `new`. `None` stands for an empty tree.
pub fn diff_trees(
    store: &dyn ObjectStore,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
) -> DiffResult<TreeDiff> {
    let mut walk = Walk {
        store,
        changes: Vec::new(),
        deleted: Vec::new(),
        added: Vec::new(),
    };
    walk.compare("", old.copied(), new.copied())?;
    Ok(walk.finish())
}

struct Walk<'s> {
    store: &'s dyn ObjectStore,
    changes: Vec<TreeChange>,
    deleted: Vec<(String, TreeEntry)>,
    added: Vec<(String, TreeEntry)>,
}

impl Walk<'_> {
    fn compare(&mut self, prefix: &str, old: Option<ObjectId>, new: Option<ObjectId>) -> DiffResult<()> {
        if old == new {
            return Ok(());
        }
        let old_entries = self.entries(old)?;
        let new_entries = self.entries(new)?;
        let names: BTreeSet<&String> = old_entries.keys().chain(new_entries.keys()).collect();

        for name in names {
            let path = join(prefix, name);
            match (old_entries.get(name), new_entries.get(name)) {
                (Some(o), Some(n)) if o == n => {}
                (Some(o), Some(n)) => match (o.mode.is_dir(), n.mode.is_dir()) {
                    (true, true) => self.compare(&path, Some(o.object_id), Some(n.object_id))?,
                    (false, false) if o.object_id != n.object_id => {
                        self.changes.push(TreeChange::Modified {
                            path,
                            old_id: o.object_id,
                            new_id: n.object_id,
                            mode: n.mode,
                        })
                    }
                    (false, false) => self.changes.push(TreeChange::ModeChanged {
                        path,
                        id: o.object_id,
                        old_mode: o.mode,
                        new_mode: n.mode,
                    }),
                    (true, false) => {
                        self.compare(&path, Some(o.object_id), None)?;
                        self.added.push((path, n.clone()));
                    }
                    (false, true) => {
                        self.deleted.push((path.clone(), o.clone()));
                        self.compare(&path, None, Some(n.object_id))?;
                    }
                },
                (Some(o), None) if o.mode.is_dir() => self.compare(&path, Some(o.object_id), None)?,
                (Some(o), None) => self.deleted.push((path, o.clone())),
                (None, Some(n)) if n.mode.is_dir() => self.compare(&path, None, Some(n.object_id))?,
                (None, Some(n)) => self.added.push((path, n.clone())),
                (None, None) => {}
            }
        }
        Ok(())
    }

    fn entries(&self, tree: Option<ObjectId>) -> DiffResult<BTreeMap<String, TreeEntry>> {
        let Some(id) = tree else {
            return Ok(BTreeMap::new());
        };
        let stored = self.store.read(&id)?.ok_or(DiffError::ObjectNotFound(id))?;
        let tree = Tree::from_stored_object(&stored)?;
        Ok(tree
            .entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect())
    }

    /// Pair deletions with additions of identical content, then sort.
    fn finish(mut self) -> TreeDiff {
        let mut added: Vec<Option<(String, TreeEntry)>> = self.added.into_iter().map(Some).collect();
        for (old_path, old) in self.deleted {
            let partner = added.iter_mut().find(|slot| {
                slot.as_ref()
                    .is_some_and(|(_, new)| new.object_id == old.object_id)
            });
            match partner.and_then(Option::take) {
                Some((new_path, new)) => self.changes.push(TreeChange::Renamed {
                    old_path,
                    new_path,
                    id: old.object_id,
                    mode: new.mode,
                }),
                None => self.changes.push(TreeChange::Deleted {
                    path: old_path,
                    old_id: old.object_id,
                    mode: old.mode,
                }),
            }
        }
        for (path, new) in added.into_iter().flatten() {
            self.changes.push(TreeChange::Added {
                path,
                new_id: new.object_id,
                mode: new.mode,
            });
        }
        self.changes.sort_by(|a, b| a.path().cmp(b.path()));
        TreeDiff {
            changes: self.changes,
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
