use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use arbor_diff::{diff_trees, TreeDiff};
use arbor_refs::{
    canonical_branch, validate_branch_name, validate_tag_name, Head, InMemoryRefStore, Ref,
    RefStore, HEAD,
};
use arbor_stage::{BaseRevision, StageConfig, StageError};
use arbor_store::{InMemoryObjectStore, ObjectStore, StoreError};
use arbor_types::{ObjectId, Signature};
use tracing::{debug, info};

use crate::error::{SdkError, SdkResult};
use crate::index::Index;
use crate::revision::Revision;
use crate::revspec::{self, Step};

/// Branch and tag names pointing at each commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefMap {
    branches: BTreeMap<ObjectId, Vec<String>>,
    tags: BTreeMap<ObjectId, Vec<String>>,
}

impl RefMap {
    fn build(refs: &dyn RefStore) -> SdkResult<Self> {
        let mut map = Self::default();
        for (_, reference) in refs.list_refs("refs/")? {
            let bucket = match &reference {
                Ref::Branch { .. } => &mut map.branches,
                Ref::Tag { .. } => &mut map.tags,
            };
            bucket
                .entry(reference.target())
                .or_default()
                .push(reference.short_name().to_string());
        }
        Ok(map)
    }

    /// Short names of the branches whose tip is `commit`.
    pub fn branches_at(&self, commit: &ObjectId) -> &[String] {
        self.branches.get(commit).map(Vec::as_slice).unwrap_or_default()
    }

    /// Short names of the tags pointing at `commit`.
    pub fn tags_at(&self, commit: &ObjectId) -> &[String] {
        self.tags.get(commit).map(Vec::as_slice).unwrap_or_default()
    }
}

/// High-level handle over one object store and one ref store.
///
/// Keeps a snapshot of which refs point at which commits. The snapshot is
/// rebuilt from the ref store after every successful commit or ref change
/// made through this handle; readers get a cheap `Arc` clone.
pub struct Repository {
    store: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    config: StageConfig,
    ref_map: RwLock<Arc<RefMap>>,
}

impl Repository {
    pub fn open(store: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>) -> SdkResult<Self> {
        Self::with_config(store, refs, StageConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        config: StageConfig,
    ) -> SdkResult<Self> {
        config.validate()?;
        let ref_map = RefMap::build(refs.as_ref())?;
        Ok(Self {
            store,
            refs,
            config,
            ref_map: RwLock::new(Arc::new(ref_map)),
        })
    }

    /// An empty in-memory repository with `HEAD` on an unborn `main`.
    pub fn in_memory() -> SdkResult<Self> {
        let refs = InMemoryRefStore::new();
        refs.set_head("main")?;
        Self::open(Arc::new(InMemoryObjectStore::new()), Arc::new(refs))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// `true` while `HEAD` does not resolve to a commit.
    pub fn is_empty(&self) -> SdkResult<bool> {
        Ok(self.refs.resolve(HEAD)?.is_none())
    }

    /// Current snapshot of the reference map.
    pub fn ref_map(&self) -> SdkResult<Arc<RefMap>> {
        self.ref_map
            .read()
            .map(|map| Arc::clone(&map))
            .map_err(|_| SdkError::Internal("reference map lock poisoned".into()))
    }

    /// Rebuild the reference map from the ref store.
    pub fn refresh_refs(&self) -> SdkResult<()> {
        let fresh = Arc::new(RefMap::build(self.refs.as_ref())?);
        let mut guard = self
            .ref_map
            .write()
            .map_err(|_| SdkError::Internal("reference map lock poisoned".into()))?;
        *guard = fresh;
        debug!("reference map rebuilt");
        Ok(())
    }

    // ---- Revisions ----

    /// Resolve a revision expression such as `HEAD`, `main~2` or a hex id.
    pub fn get_revision(&self, spec: &str) -> SdkResult<Revision<'_>> {
        let id = self.resolve(spec)?;
        self.revision(id)
    }

    /// The revision `HEAD` points at.
    pub fn head(&self) -> SdkResult<Revision<'_>> {
        self.get_revision(HEAD)
    }

    pub(crate) fn revision(&self, id: ObjectId) -> SdkResult<Revision<'_>> {
        let commit = self.store.read_commit(&id)?;
        let map = self.ref_map()?;
        Ok(Revision::new(
            self,
            id,
            commit,
            map.branches_at(&id).to_vec(),
            map.tags_at(&id).to_vec(),
        ))
    }

    /// Resolve a revision expression to a commit id.
    pub fn resolve(&self, spec: &str) -> SdkResult<ObjectId> {
        let not_found = || SdkError::RevisionNotFound(spec.to_string());
        let parsed = revspec::parse(spec).ok_or_else(not_found)?;
        let mut id = self.resolve_base(parsed.base)?.ok_or_else(not_found)?;

        for step in parsed.steps {
            let (hops, index) = match step {
                Step::Ancestor(n) => (n, 1),
                Step::Parent(0) => continue,
                Step::Parent(n) => (1, n),
            };
            for _ in 0..hops {
                let commit = self.read_commit_or(&id, not_found)?;
                id = *commit.parents.get(index - 1).ok_or_else(not_found)?;
            }
        }
        self.read_commit_or(&id, not_found)?;
        Ok(id)
    }

    fn resolve_base(&self, base: &str) -> SdkResult<Option<ObjectId>> {
        if base == HEAD || base.starts_with("refs/") {
            return Ok(self.refs.resolve(base)?);
        }
        for candidate in [canonical_branch(base), format!("refs/tags/{base}")] {
            if let Some(id) = self.refs.resolve(&candidate)? {
                return Ok(Some(id));
            }
        }
        if base.len() == ObjectId::HEX_LEN {
            if let Ok(id) = ObjectId::from_hex(base) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    fn read_commit_or(
        &self,
        id: &ObjectId,
        not_found: impl Fn() -> SdkError,
    ) -> SdkResult<arbor_store::Commit> {
        match self.store.read_commit(id) {
            Ok(commit) => Ok(commit),
            Err(StoreError::NotFound(_) | StoreError::CorruptObject { .. }) => Err(not_found()),
            Err(err) => Err(err.into()),
        }
    }

    /// Every ancestor of `spec` (inclusive), newest first by committer
    /// time, ties broken by id. `reverse` yields oldest first.
    pub fn history(&self, spec: &str, reverse: bool) -> SdkResult<Vec<Revision<'_>>> {
        let start = self.resolve(spec)?;
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut revisions = Vec::new();
        while let Some(id) = queue.pop_front() {
            let revision = self.revision(id)?;
            for parent in revision.parent_ids() {
                if seen.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
            revisions.push(revision);
        }
        revisions.sort_by(|a, b| {
            b.committer()
                .when
                .cmp(&a.committer().when)
                .then_with(|| a.id().cmp(&b.id()))
        });
        if reverse {
            revisions.reverse();
        }
        Ok(revisions)
    }

    /// Changes that turn revision `from` into revision `to`.
    pub fn diff(&self, from: &str, to: &str) -> SdkResult<TreeDiff> {
        let old = self.get_revision(from)?.tree_id();
        let new = self.get_revision(to)?.tree_id();
        Ok(diff_trees(self.store.as_ref(), Some(&old), Some(&new))?)
    }

    // ---- Refs ----

    /// Short branch names, sorted.
    pub fn branches(&self) -> SdkResult<Vec<String>> {
        Ok(self
            .refs
            .branches()?
            .into_iter()
            .map(|(_, r)| r.short_name().to_string())
            .collect())
    }

    /// Short tag names, sorted.
    pub fn tags(&self) -> SdkResult<Vec<String>> {
        Ok(self
            .refs
            .tags()?
            .into_iter()
            .map(|(_, r)| r.short_name().to_string())
            .collect())
    }

    /// The branch `HEAD` names, or `None` when detached or unset.
    pub fn current_branch(&self) -> SdkResult<Option<String>> {
        Ok(match self.refs.head()? {
            Some(Head::Symbolic(branch)) => Some(branch),
            _ => None,
        })
    }

    /// Create branch `name` at `spec`. Fails if the branch exists.
    pub fn create_branch(&self, name: &str, spec: &str) -> SdkResult<ObjectId> {
        validate_branch_name(name)?;
        let target = self.resolve(spec)?;
        self.refs
            .compare_and_swap(&canonical_branch(name), None, &Ref::branch(name, target))?;
        self.refresh_refs()?;
        info!(branch = name, commit = %target.short_hex(), "branch created");
        Ok(target)
    }

    /// Create tag `name` at `spec`, annotated when `tagger` is given.
    pub fn create_tag(
        &self,
        name: &str,
        spec: &str,
        tagger: Option<Signature>,
        message: Option<String>,
    ) -> SdkResult<ObjectId> {
        validate_tag_name(name)?;
        let target = self.resolve(spec)?;
        let tag = Ref::Tag {
            name: name.to_string(),
            target,
            tagger,
            message,
        };
        self.refs.write_ref(&tag.canonical_name(), &tag)?;
        self.refresh_refs()?;
        info!(tag = name, commit = %target.short_hex(), "tag created");
        Ok(target)
    }

    // ---- Staging ----

    /// A staging index on top of `spec`.
    ///
    /// Ref names (including an unborn `HEAD`) bind the index to the ref, so
    /// the commit moves it; other expressions bind to the commit only.
    pub fn index(&self, spec: &str) -> SdkResult<Index<'_>> {
        let base = match BaseRevision::from_ref(self.store.as_ref(), self.refs.as_ref(), spec) {
            Ok(base) => base,
            Err(StageError::RevisionNotFound(_)) => {
                BaseRevision::from_commit(self.store.as_ref(), self.resolve(spec)?, None)?
            }
            Err(err) => return Err(err.into()),
        };
        Index::new(self, base)
    }

    /// A staging index for the first commit on `HEAD`'s branch.
    pub fn index_unborn(&self) -> SdkResult<Index<'_>> {
        Index::new(self, BaseRevision::unborn(HEAD))
    }

    pub(crate) fn shared_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub(crate) fn shared_refs(&self) -> Arc<dyn RefStore> {
        Arc::clone(&self.refs)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
