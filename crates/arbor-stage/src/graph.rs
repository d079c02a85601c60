//! Mutable directory builders over an immutable base tree.
//!
//! One builder exists per touched directory. Builders are created on first
//! use, root-down, each seeded from the entry its parent builder currently
//! holds for it. Staged operations mutate the builder of their parent
//! directory; [`TreeBuilderGraph::finalize`] then writes builders
//! deepest-first and folds each new id into the parent.

use std::collections::{BTreeMap, BTreeSet};

use arbor_store::{EntryMode, ObjectStore, Tree, TreeEntry};
use arbor_types::ObjectId;
use tracing::{debug, trace};

use crate::config::EmptyDirPolicy;
use crate::error::{StageError, StageResult};
use crate::ledger::{StagedOp, StagingLedger};
use crate::path::PathKey;
use crate::queue::DepthQueue;

/// Lifecycle of a single directory builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderState {
    /// No builder exists for the directory.
    Unmaterialized,
    /// Seeded and not changed since.
    Seeded,
    /// Entries differ from the seed.
    Mutated,
    /// Finalized under the given id.
    Written(ObjectId),
    /// Finalized empty and dropped from its parent.
    Pruned,
}

#[derive(Debug)]
struct DirBuilder {
    entries: BTreeMap<String, TreeEntry>,
    base: Option<ObjectId>,
    mutated: bool,
}

impl DirBuilder {
    fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            base: None,
            mutated: false,
        }
    }

    fn seeded(base: ObjectId, tree: Tree) -> Self {
        Self {
            entries: tree
                .entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
            base: Some(base),
            mutated: false,
        }
    }

    /// Replaces the entry named `entry.name`. Only counts as a mutation when
    /// the entry actually changes.
    fn upsert(&mut self, entry: TreeEntry) {
        if self.entries.get(&entry.name) != Some(&entry) {
            self.entries.insert(entry.name.clone(), entry);
            self.mutated = true;
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        self.mutated |= removed;
        removed
    }

    fn state(&self) -> BuilderState {
        if self.mutated {
            BuilderState::Mutated
        } else {
            BuilderState::Seeded
        }
    }
}

/// The result of finalizing a graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedTree {
    /// Id of the new root tree.
    pub root: ObjectId,
    /// Directories in the order they were finalized (root last).
    pub order: Vec<PathKey>,
    /// Tree objects actually written to the store.
    pub trees_written: usize,
}

/// Directory builders for one commit, keyed by path.
pub struct TreeBuilderGraph<'s> {
    store: &'s dyn ObjectStore,
    base_root: Option<ObjectId>,
    policy: EmptyDirPolicy,
    replaced: BTreeSet<PathKey>,
    builders: BTreeMap<PathKey, DirBuilder>,
    finished: BTreeMap<PathKey, BuilderState>,
    seeded: usize,
}

impl<'s> TreeBuilderGraph<'s> {
    /// A graph over the tree `base_root` (`None` for an empty repository).
    pub fn new(store: &'s dyn ObjectStore, base_root: Option<ObjectId>, policy: EmptyDirPolicy) -> Self {
        Self {
            store,
            base_root,
            policy,
            replaced: BTreeSet::new(),
            builders: BTreeMap::new(),
            finished: BTreeMap::new(),
            seeded: 0,
        }
    }

    /// Apply every staged operation in `ledger`, deepest path first.
    ///
    /// Only reads from the store. A directory staged for removal that also
    /// has staged content beneath it is rebuilt from empty instead of being
    /// dropped.
    pub fn apply_ledger(&mut self, ledger: &StagingLedger) -> StageResult<()> {
        self.replaced = ledger.removed_paths();
        let mut queue: DepthQueue = ledger.iter().map(|(path, _)| path.clone()).collect();
        while let Some(path) = queue.pop_deepest() {
            match ledger.get(&path) {
                Some(StagedOp::Write { blob, mode }) => self.apply_write(&path, *blob, *mode)?,
                Some(StagedOp::Remove) => self.apply_remove(&path)?,
                None => {}
            }
        }
        Ok(())
    }

    /// Place a file entry at `path`.
    ///
    /// Fails with [`StageError::PathConflict`] if `path` already has a
    /// builder, i.e. something was staged beneath it.
    pub fn apply_write(&mut self, path: &PathKey, blob: ObjectId, mode: EntryMode) -> StageResult<()> {
        if mode.is_dir() {
            return Err(StageError::InvalidMode(mode));
        }
        if self.builders.contains_key(path) {
            return Err(StageError::PathConflict {
                path: path.to_string(),
            });
        }
        let parent = self.get_or_create(&parent_of(path))?;
        parent.upsert(TreeEntry::new(mode, path.basename(), blob));
        trace!(path = %path, blob = %blob.short_hex(), "write applied");
        Ok(())
    }

    /// Drop the entry at `path` from its parent.
    ///
    /// If `path` already has a builder, content was staged beneath the
    /// removed directory and the builder replaces it wholesale, so there is
    /// nothing to drop. Fails with [`StageError::NodeNotFound`] when the
    /// parent has no such entry.
    pub fn apply_remove(&mut self, path: &PathKey) -> StageResult<()> {
        if self.builders.contains_key(path) {
            return Ok(());
        }
        let parent = self.get_or_create(&parent_of(path))?;
        if !parent.remove(path.basename()) {
            return Err(StageError::NodeNotFound {
                path: path.to_string(),
            });
        }
        trace!(path = %path, "remove applied");
        Ok(())
    }

    /// Write all builders deepest-first and return the new root.
    ///
    /// An unchanged builder reuses its base id without a store write. Under
    /// [`EmptyDirPolicy::Prune`] an empty non-root directory is dropped from
    /// its parent instead of written. The root is always produced.
    pub fn finalize(&mut self) -> StageResult<FinalizedTree> {
        self.get_or_create(&PathKey::root())?;

        let mut queue: DepthQueue = self.builders.keys().cloned().collect();
        let mut order = Vec::with_capacity(queue.len());
        let mut trees_written = 0;
        let mut root = None;

        while let Some(dir) = queue.pop_deepest() {
            let Some(builder) = self.builders.remove(&dir) else {
                continue;
            };
            let outcome = if let (false, Some(base)) = (builder.mutated, builder.base) {
                Some(base)
            } else if builder.entries.is_empty() && !dir.is_root() && self.policy == EmptyDirPolicy::Prune {
                None
            } else {
                let tree = Tree::new(builder.entries.into_values().collect());
                trees_written += 1;
                Some(self.store.write_tree(&tree)?)
            };
            debug!(dir = %dir, tree = ?outcome, "directory finalized");

            self.finished.insert(
                dir.clone(),
                outcome.map_or(BuilderState::Pruned, BuilderState::Written),
            );
            order.push(dir.clone());

            match (dir.parent(), outcome) {
                (None, id) => root = id,
                (Some(parent), Some(id)) => {
                    self.get_or_create(&parent)?
                        .upsert(TreeEntry::new(EntryMode::Directory, dir.basename(), id));
                }
                (Some(parent), None) => {
                    self.get_or_create(&parent)?.remove(dir.basename());
                }
            }
        }

        let root = match root {
            Some(root) => root,
            None => self.store.write_tree(&Tree::empty())?,
        };
        Ok(FinalizedTree {
            root,
            order,
            trees_written,
        })
    }

    /// Current state of the builder for `dir`.
    pub fn state(&self, dir: &PathKey) -> BuilderState {
        if let Some(builder) = self.builders.get(dir) {
            return builder.state();
        }
        self.finished
            .get(dir)
            .copied()
            .unwrap_or(BuilderState::Unmaterialized)
    }

    /// How many builders have been seeded so far.
    pub fn seeded_count(&self) -> usize {
        self.seeded
    }

    /// Directories with a live builder, in path order.
    pub fn materialized(&self) -> Vec<PathKey> {
        self.builders.keys().cloned().collect()
    }

    /// The builder for `dir`, seeding it (and any missing ancestors) first.
    fn get_or_create(&mut self, dir: &PathKey) -> StageResult<&mut DirBuilder> {
        let builder = match self.builders.remove(dir) {
            Some(builder) => builder,
            None => self.seed(dir)?,
        };
        Ok(self.builders.entry(dir.clone()).or_insert(builder))
    }

    fn seed(&mut self, dir: &PathKey) -> StageResult<DirBuilder> {
        let builder = match dir.parent() {
            None => match self.base_root {
                Some(id) => DirBuilder::seeded(id, self.store.read_tree(&id)?),
                None => DirBuilder::empty(),
            },
            Some(parent) => {
                let existing = self
                    .get_or_create(&parent)?
                    .entries
                    .get(dir.basename())
                    .map(|entry| (entry.mode, entry.object_id));
                match existing {
                    _ if self.replaced.contains(dir) => {
                        let mut builder = DirBuilder::empty();
                        builder.mutated = true;
                        builder
                    }
                    Some((mode, id)) if mode.is_dir() => {
                        DirBuilder::seeded(id, self.store.read_tree(&id)?)
                    }
                    Some(_) => {
                        return Err(StageError::NotADirectory {
                            path: dir.to_string(),
                        })
                    }
                    None => {
                        let mut builder = DirBuilder::empty();
                        builder.mutated = true;
                        builder
                    }
                }
            }
        };
        self.seeded += 1;
        trace!(dir = %dir, base = ?builder.base, "builder seeded");
        Ok(builder)
    }
}

fn parent_of(path: &PathKey) -> PathKey {
    path.parent().unwrap_or_else(PathKey::root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::{entry_at_path, InMemoryObjectStore};

    fn key(s: &str) -> PathKey {
        PathKey::parse(s).unwrap()
    }

    /// Base tree:
    ///
    /// ```text
    /// test           "test"
    /// woot/bar       "bar"
    /// woot/foo/baz   "baz"
    /// ```
    fn base(store: &InMemoryObjectStore) -> ObjectId {
        let blob = |data: &[u8]| store.write_blob(data).unwrap();
        let foo = store
            .write_tree(&Tree::new(vec![TreeEntry::new(EntryMode::Regular, "baz", blob(b"baz"))]))
            .unwrap();
        let woot = store
            .write_tree(&Tree::new(vec![
                TreeEntry::new(EntryMode::Regular, "bar", blob(b"bar")),
                TreeEntry::new(EntryMode::Directory, "foo", foo),
            ]))
            .unwrap();
        store
            .write_tree(&Tree::new(vec![
                TreeEntry::new(EntryMode::Regular, "test", blob(b"test")),
                TreeEntry::new(EntryMode::Directory, "woot", woot),
            ]))
            .unwrap()
    }

    fn lookup(store: &InMemoryObjectStore, root: &ObjectId, path: &str) -> Option<TreeEntry> {
        entry_at_path(store, Some(root), path).unwrap()
    }

    #[test]
    fn no_ops_reuses_base_root() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let before = store.len();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        let tree = graph.finalize().unwrap();
        assert_eq!(tree.root, root);
        assert_eq!(tree.trees_written, 0);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn empty_repository_gets_an_empty_root() {
        let store = InMemoryObjectStore::new();
        let mut graph = TreeBuilderGraph::new(&store, None, EmptyDirPolicy::Keep);
        let tree = graph.finalize().unwrap();
        assert!(store.read_tree(&tree.root).unwrap().is_empty());
    }

    #[test]
    fn nested_write_rebuilds_only_its_chain() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let blob = store.write_blob(b"new").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_write(&key("woot/foo/qux"), blob, EntryMode::Regular).unwrap();
        assert_eq!(graph.seeded_count(), 3);
        assert_eq!(graph.state(&key("woot/foo")), BuilderState::Mutated);
        assert_eq!(graph.state(&key("woot")), BuilderState::Seeded);

        let tree = graph.finalize().unwrap();
        assert_eq!(tree.order, vec![key("woot/foo"), key("woot"), PathKey::root()]);
        assert_eq!(tree.trees_written, 3);
        assert_eq!(lookup(&store, &tree.root, "woot/foo/qux").unwrap().object_id, blob);
        assert!(lookup(&store, &tree.root, "woot/foo/baz").is_some());
        assert!(lookup(&store, &tree.root, "woot/bar").is_some());
        assert_eq!(
            lookup(&store, &tree.root, "test"),
            lookup(&store, &root, "test")
        );
        assert!(matches!(
            graph.state(&key("woot")),
            BuilderState::Written(_)
        ));
    }

    #[test]
    fn builders_are_seeded_once_per_directory() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let blob = store.write_blob(b"x").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        for name in ["a", "b", "c"] {
            graph
                .apply_write(&key(&format!("woot/foo/{name}")), blob, EntryMode::Regular)
                .unwrap();
        }
        graph.apply_write(&key("woot/z"), blob, EntryMode::Regular).unwrap();
        assert_eq!(graph.seeded_count(), 3);
        assert_eq!(
            graph.materialized(),
            vec![PathKey::root(), key("woot"), key("woot/foo")]
        );
    }

    #[test]
    fn writing_beneath_a_file_fails() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let blob = store.write_blob(b"x").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        let err = graph
            .apply_write(&key("test/inner"), blob, EntryMode::Regular)
            .unwrap_err();
        assert!(matches!(err, StageError::NotADirectory { path } if path == "test"));
    }

    #[test]
    fn file_over_pending_directory_conflicts() {
        let store = InMemoryObjectStore::new();
        let blob = store.write_blob(b"x").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, None, EmptyDirPolicy::Keep);
        graph.apply_write(&key("a/b"), blob, EntryMode::Regular).unwrap();
        let err = graph.apply_write(&key("a"), blob, EntryMode::Regular).unwrap_err();
        assert!(matches!(err, StageError::PathConflict { path } if path == "a"));
    }

    #[test]
    fn removing_a_missing_entry_fails() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        assert!(matches!(
            graph.apply_remove(&key("woot/nope")),
            Err(StageError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn keep_policy_writes_empty_directories() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_remove(&key("woot/foo/baz")).unwrap();
        let tree = graph.finalize().unwrap();

        let foo = lookup(&store, &tree.root, "woot/foo").unwrap();
        assert!(foo.mode.is_dir());
        assert!(store.read_tree(&foo.object_id).unwrap().is_empty());
    }

    #[test]
    fn prune_policy_cascades_to_emptied_parents() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Prune);
        graph.apply_remove(&key("woot/foo/baz")).unwrap();
        graph.apply_remove(&key("woot/bar")).unwrap();
        let tree = graph.finalize().unwrap();

        assert!(lookup(&store, &tree.root, "woot").is_none());
        assert!(lookup(&store, &tree.root, "test").is_some());
        assert_eq!(graph.state(&key("woot/foo")), BuilderState::Pruned);
        assert_eq!(graph.state(&key("woot")), BuilderState::Pruned);
    }

    #[test]
    fn prune_policy_still_writes_an_empty_root() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Prune);
        graph.apply_remove(&key("test")).unwrap();
        graph.apply_remove(&key("woot")).unwrap();
        let tree = graph.finalize().unwrap();
        assert!(store.read_tree(&tree.root).unwrap().is_empty());
    }

    #[test]
    fn rewriting_identical_content_reuses_base() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let same = store.write_blob(b"bar").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_write(&key("woot/bar"), same, EntryMode::Regular).unwrap();
        let tree = graph.finalize().unwrap();
        assert_eq!(tree.root, root);
        assert_eq!(tree.trees_written, 0);
    }

    #[test]
    fn removed_directory_with_new_content_is_replaced() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let blob = store.write_blob(b"fresh").unwrap();

        let mut ledger = StagingLedger::new();
        ledger.stage_remove(key("woot"));
        ledger.stage_write(key("woot/fresh"), b"fresh".to_vec(), EntryMode::Regular);

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_ledger(&ledger).unwrap();
        let tree = graph.finalize().unwrap();

        assert_eq!(lookup(&store, &tree.root, "woot/fresh").unwrap().object_id, blob);
        assert!(lookup(&store, &tree.root, "woot/bar").is_none());
        assert!(lookup(&store, &tree.root, "woot/foo").is_none());
    }

    #[test]
    fn removed_file_can_become_a_directory() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);

        let mut ledger = StagingLedger::new();
        ledger.stage_remove(key("test"));
        ledger.stage_write(key("test/inner"), b"inner".to_vec(), EntryMode::Regular);

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_ledger(&ledger).unwrap();
        let tree = graph.finalize().unwrap();
        assert!(lookup(&store, &tree.root, "test").unwrap().mode.is_dir());
        assert!(lookup(&store, &tree.root, "test/inner").is_some());
    }

    #[test]
    fn file_can_replace_a_directory() {
        let store = InMemoryObjectStore::new();
        let root = base(&store);
        let blob = store.write_blob(b"flat").unwrap();

        let mut graph = TreeBuilderGraph::new(&store, Some(root), EmptyDirPolicy::Keep);
        graph.apply_write(&key("woot"), blob, EntryMode::Regular).unwrap();
        let tree = graph.finalize().unwrap();
        let woot = lookup(&store, &tree.root, "woot").unwrap();
        assert_eq!(woot.mode, EntryMode::Regular);
        assert_eq!(woot.object_id, blob);
    }

    #[test]
    fn directory_mode_is_rejected() {
        let store = InMemoryObjectStore::new();
        let mut graph = TreeBuilderGraph::new(&store, None, EmptyDirPolicy::Keep);
        assert!(matches!(
            graph.apply_write(&key("a"), ObjectId::null(), EntryMode::Directory),
            Err(StageError::InvalidMode(EntryMode::Directory))
        ));
    }
}
