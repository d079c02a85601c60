//! Read-only views of a committed revision and the files inside it.

use std::fmt;

use arbor_diff::{diff_trees, TreeChange, TreeDiff};
use arbor_stage::PathKey;
use arbor_store::{entry_at_path, Commit, EntryKind, EntryMode, ObjectStore, TreeEntry};
use arbor_types::{ObjectId, Signature};

use crate::error::{SdkError, SdkResult};
use crate::repository::Repository;

/// One commit, with the branches and tags that pointed at it when it was
/// looked up.
pub struct Revision<'r> {
    repo: &'r Repository,
    id: ObjectId,
    commit: Commit,
    branches: Vec<String>,
    tags: Vec<String>,
}

impl<'r> Revision<'r> {
    pub(crate) fn new(
        repo: &'r Repository,
        id: ObjectId,
        commit: Commit,
        branches: Vec<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            repo,
            id,
            commit,
            branches,
            tags,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn short_id(&self) -> String {
        self.id.short_hex()
    }

    pub fn author(&self) -> &Signature {
        &self.commit.author
    }

    pub fn committer(&self) -> &Signature {
        &self.commit.committer
    }

    pub fn message(&self) -> &str {
        &self.commit.message
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.commit.summary()
    }

    pub fn tree_id(&self) -> ObjectId {
        self.commit.tree
    }

    pub fn parent_ids(&self) -> &[ObjectId] {
        &self.commit.parents
    }

    pub fn parents(&self) -> SdkResult<Vec<Revision<'r>>> {
        self.commit
            .parents
            .iter()
            .map(|id| self.repo.revision(*id))
            .collect()
    }

    /// Short names of branches whose tip is this commit.
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// Short names of tags pointing at this commit.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The file or directory at `path`. `""`, `"."` and `"/"` name the root.
    pub fn node(&self, path: &str) -> SdkResult<Node<'r>> {
        let root_like = path.split(['/', '\\']).all(|s| matches!(s, "" | "."));
        if root_like {
            return Ok(Node {
                repo: self.repo,
                commit: self.id,
                path: PathKey::root(),
                mode: EntryMode::Directory,
                id: self.commit.tree,
            });
        }

        let not_found = || SdkError::NodeNotFound(path.to_string());
        let key = PathKey::parse(path).map_err(|_| not_found())?;
        let entry = entry_at_path(self.repo.store(), Some(&self.commit.tree), key.as_str())?
            .ok_or_else(not_found)?;
        Ok(Node::from_entry(self.repo, self.id, key, &entry))
    }
}

impl fmt::Debug for Revision<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("id", &self.short_id())
            .field("summary", &self.summary())
            .finish()
    }
}

/// A file or directory inside one revision.
#[derive(Clone)]
pub struct Node<'r> {
    repo: &'r Repository,
    commit: ObjectId,
    path: PathKey,
    mode: EntryMode,
    id: ObjectId,
}

impl<'r> Node<'r> {
    fn from_entry(repo: &'r Repository, commit: ObjectId, path: PathKey, entry: &TreeEntry) -> Self {
        Self {
            repo,
            commit,
            path,
            mode: entry.mode,
            id: entry.object_id,
        }
    }

    /// Path from the root, `""` for the root itself.
    pub fn name(&self) -> &str {
        self.path.as_str()
    }

    pub fn basename(&self) -> &str {
        self.path.basename()
    }

    /// Path of the containing directory, `""` at the top level.
    pub fn dirname(&self) -> &str {
        let name = self.path.as_str();
        name.rfind('/').map_or("", |idx| &name[..idx])
    }

    pub fn kind(&self) -> EntryKind {
        self.mode.kind()
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    /// Blob id for files, tree id for directories.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// Entries of a directory in name order, depth-first when `recursive`.
    /// Files have no children.
    pub fn children(&self, recursive: bool) -> SdkResult<Vec<Node<'r>>> {
        if self.is_file() {
            return Ok(Vec::new());
        }
        let tree = self.repo.store().read_tree(&self.id)?;
        let mut out = Vec::with_capacity(tree.len());
        for entry in &tree.entries {
            let child = Node::from_entry(self.repo, self.commit, self.path.join(&entry.name), entry);
            let nested = if recursive && child.is_dir() {
                child.children(true)?
            } else {
                Vec::new()
            };
            out.push(child);
            out.extend(nested);
        }
        Ok(out)
    }

    /// File contents.
    pub fn read(&self) -> SdkResult<Vec<u8>> {
        if self.is_dir() {
            return Err(SdkError::NotAFile(self.path.to_string()));
        }
        Ok(self.repo.store().read_blob(&self.id)?.data)
    }

    /// Changes at or below this node between revision `since` and the
    /// revision this node belongs to.
    pub fn diff(&self, since: &str) -> SdkResult<TreeDiff> {
        let old = self.repo.get_revision(since)?.tree_id();
        let new = self.repo.store().read_commit(&self.commit)?.tree;
        let full = diff_trees(self.repo.store(), Some(&old), Some(&new))?;
        if self.is_root() {
            return Ok(full);
        }
        let changes = full
            .changes
            .into_iter()
            .filter(|change| match change {
                TreeChange::Renamed {
                    old_path, new_path, ..
                } => self.covers(old_path) || self.covers(new_path),
                other => self.covers(other.path()),
            })
            .collect();
        Ok(TreeDiff { changes })
    }

    /// Revisions, newest first, whose content at this path differs from
    /// their first parent's.
    pub fn history(&self) -> SdkResult<Vec<Revision<'r>>> {
        let store = self.repo.store();
        let mut out = Vec::new();
        for revision in self.repo.history(&self.commit.to_hex(), false)? {
            let here = self.entry_in(store, revision.tree_id())?;
            let before = match revision.parent_ids().first() {
                Some(parent) => self.entry_in(store, store.read_commit(parent)?.tree)?,
                None => None,
            };
            if here != before {
                out.push(revision);
            }
        }
        Ok(out)
    }

    fn entry_in(&self, store: &dyn ObjectStore, tree: ObjectId) -> SdkResult<Option<(EntryMode, ObjectId)>> {
        if self.is_root() {
            return Ok(Some((EntryMode::Directory, tree)));
        }
        Ok(entry_at_path(store, Some(&tree), self.path.as_str())?.map(|e| (e.mode, e.object_id)))
    }

    fn covers(&self, path: &str) -> bool {
        let name = self.path.as_str();
        path == name || (path.starts_with(name) && path.as_bytes().get(name.len()) == Some(&b'/'))
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.is_dir() { "/" } else { "" };
        write!(f, "Node({}{suffix})", self.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_refs::HEAD;

    fn sig(step: i64) -> Signature {
        Signature::from_unix("Jane Roe", "jane@example.net", 1_700_000_000 + step, 0).unwrap()
    }

    fn repo_with(files: &[(&str, &str)]) -> Repository {
        let repo = Repository::in_memory().unwrap();
        let mut index = repo.index(HEAD).unwrap();
        for (path, contents) in files {
            index.add(path, *contents).unwrap();
        }
        index.commit("Initial import\n\nWith a body.", sig(0)).unwrap();
        repo
    }

    fn names(nodes: &[Node<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn revision_metadata() {
        let repo = repo_with(&[("README", "hi")]);
        let head = repo.head().unwrap();
        assert_eq!(head.summary(), "Initial import");
        assert_eq!(head.author().name, "Jane Roe");
        assert_eq!(head.committer(), head.author());
        assert_eq!(head.short_id(), head.id().short_hex());
        assert!(head.parent_ids().is_empty());
        assert!(head.parents().unwrap().is_empty());
    }

    #[test]
    fn parents_resolve_to_revisions() {
        let repo = repo_with(&[("a", "1")]);
        let first = repo.head().unwrap().id();
        let mut index = repo.index(HEAD).unwrap();
        index.add("a", "2").unwrap();
        index.commit("second", sig(1)).unwrap();

        let parents = repo.head().unwrap().parents().unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id(), first);
        assert!(parents[0].branches().is_empty());
    }

    #[test]
    fn root_node_variants() {
        let repo = repo_with(&[("a", "1")]);
        let head = repo.head().unwrap();
        for spelling in ["", ".", "/", "./"] {
            let root = head.node(spelling).unwrap();
            assert!(root.is_root() && root.is_dir(), "{spelling:?}");
            assert_eq!(root.id(), head.tree_id());
            assert_eq!(root.name(), "");
        }
    }

    #[test]
    fn node_lookup_and_names() {
        let repo = repo_with(&[("docs/guide/intro.md", "intro"), ("top", "t")]);
        let head = repo.head().unwrap();

        let intro = head.node("docs/guide/intro.md").unwrap();
        assert!(intro.is_file());
        assert_eq!(intro.kind(), EntryKind::File);
        assert_eq!(intro.basename(), "intro.md");
        assert_eq!(intro.dirname(), "docs/guide");
        assert_eq!(intro.mode(), EntryMode::Regular);
        assert_eq!(intro.read().unwrap(), b"intro");

        assert_eq!(head.node("/docs/./guide//intro.md").unwrap().name(), "docs/guide/intro.md");
        assert_eq!(head.node("top").unwrap().dirname(), "");

        let docs = head.node("docs").unwrap();
        assert_eq!(docs.kind(), EntryKind::Directory);
        assert!(matches!(docs.read(), Err(SdkError::NotAFile(p)) if p == "docs"));

        for missing in ["nope", "top/inner", "../top", "docs/guide/intro.md/x"] {
            assert!(
                matches!(head.node(missing), Err(SdkError::NodeNotFound(_))),
                "{missing}"
            );
        }
    }

    #[test]
    fn children_flat_and_recursive() {
        let repo = repo_with(&[("a", "1"), ("d/b", "2"), ("d/e/c", "3")]);
        let root = repo.head().unwrap().node("").unwrap();

        assert_eq!(names(&root.children(false).unwrap()), vec!["a", "d"]);
        assert_eq!(
            names(&root.children(true).unwrap()),
            vec!["a", "d", "d/b", "d/e", "d/e/c"]
        );
        let d = repo.head().unwrap().node("d").unwrap();
        assert_eq!(names(&d.children(false).unwrap()), vec!["d/b", "d/e"]);
        assert!(repo.head().unwrap().node("a").unwrap().children(true).unwrap().is_empty());
    }

    #[test]
    fn node_diff_is_scoped_to_the_node() {
        let repo = repo_with(&[("src/lib.rs", "v1"), ("README", "r1")]);
        let mut index = repo.index(HEAD).unwrap();
        index.add("src/lib.rs", "v2").unwrap();
        index.add("README", "r2").unwrap();
        index.commit("touch both", sig(1)).unwrap();

        let head = repo.head().unwrap();
        let scoped = head.node("src").unwrap().diff("HEAD~1").unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(matches!(scoped.get("src/lib.rs"), Some(TreeChange::Modified { .. })));
        assert_eq!(head.node("").unwrap().diff("HEAD~1").unwrap().len(), 2);
        assert!(head.node("src/lib.rs").unwrap().diff("HEAD").unwrap().is_empty());
    }

    #[test]
    fn node_history_lists_revisions_that_touched_it() {
        let repo = repo_with(&[("a", "1"), ("b", "1")]);
        let first = repo.head().unwrap().id();

        let mut index = repo.index(HEAD).unwrap();
        index.add("b", "2").unwrap();
        index.commit("only b", sig(1)).unwrap();

        let mut index = repo.index(HEAD).unwrap();
        index.add("a", "3").unwrap();
        let third = index.commit("a again", sig(2)).unwrap().commit_id;

        let head = repo.head().unwrap();
        let touched: Vec<ObjectId> = head
            .node("a")
            .unwrap()
            .history()
            .unwrap()
            .iter()
            .map(Revision::id)
            .collect();
        assert_eq!(touched, vec![third, first]);
        assert_eq!(head.node("").unwrap().history().unwrap().len(), 3);
    }
}
