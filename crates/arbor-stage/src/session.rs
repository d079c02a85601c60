//! The caller-facing staging handle.

use std::sync::Arc;

use arbor_refs::{canonical_branch, Head, RefStore, HEAD};
use arbor_store::{entry_at_path, EntryMode, ObjectStore};
use arbor_types::ObjectId;
use tracing::debug;

use crate::assembler::{CommitAssembler, CommitOutcome, CommitRequest};
use crate::config::StageConfig;
use crate::error::{StageError, StageResult};
use crate::ledger::{StagedOp, StagingLedger};
use crate::path::PathKey;

/// The revision a session stages on top of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseRevision {
    /// `None` for the first commit of a branch.
    pub commit: Option<ObjectId>,
    /// Root tree of `commit`; `None` means an empty tree.
    pub tree: Option<ObjectId>,
    /// The ref the base was resolved from, if any: `HEAD` or a canonical
    /// `refs/heads/...` / `refs/tags/...` name.
    pub source_ref: Option<String>,
}

impl BaseRevision {
    /// An empty base for a branch that has no commits yet.
    pub fn unborn(source_ref: impl Into<String>) -> Self {
        Self {
            commit: None,
            tree: None,
            source_ref: Some(source_ref.into()),
        }
    }

    /// The base at `commit`, reading its root tree from `store`.
    pub fn from_commit(
        store: &dyn ObjectStore,
        commit: ObjectId,
        source_ref: Option<String>,
    ) -> StageResult<Self> {
        let tree = store.read_commit(&commit)?.tree;
        Ok(Self {
            commit: Some(commit),
            tree: Some(tree),
            source_ref,
        })
    }

    /// Resolve `HEAD`, a branch or tag name, or a full `refs/...` name.
    ///
    /// `HEAD` (or the branch it names) with no commits yet resolves to an
    /// unborn base. Any other missing ref is [`StageError::RevisionNotFound`].
    pub fn from_ref(
        store: &dyn ObjectStore,
        refs: &dyn RefStore,
        name: &str,
    ) -> StageResult<Self> {
        let candidates = if name == HEAD || name.starts_with("refs/") {
            vec![name.to_string()]
        } else {
            vec![canonical_branch(name), format!("refs/tags/{name}")]
        };
        for candidate in &candidates {
            if let Some(commit) = refs.resolve(candidate)? {
                return Self::from_commit(store, commit, Some(candidate.clone()));
            }
        }

        let unborn_head = match refs.head()? {
            Some(Head::Symbolic(branch)) => {
                name == HEAD || candidates.contains(&canonical_branch(&branch))
            }
            _ => false,
        };
        if unborn_head {
            return Ok(Self::unborn(candidates[0].clone()));
        }
        Err(StageError::RevisionNotFound(name.to_string()))
    }

    pub fn is_unborn(&self) -> bool {
        self.commit.is_none()
    }
}

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting mutations (bound or not).
    Open,
    /// Committed as the given commit.
    Committed(ObjectId),
    /// A commit attempt failed. Start a new session to retry.
    Failed,
}

/// Accumulates adds and removals against one base revision and commits them
/// exactly once.
///
/// Nothing touches the object store until [`commit`](Self::commit). Staging
/// the same path twice replaces the earlier operation.
pub struct StagingSession {
    store: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    config: StageConfig,
    base: Option<BaseRevision>,
    ledger: StagingLedger,
    state: SessionState,
}

impl StagingSession {
    pub fn new(store: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>) -> Self {
        Self::with_config(store, refs, StageConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        config: StageConfig,
    ) -> Self {
        Self {
            store,
            refs,
            config,
            base: None,
            ledger: StagingLedger::new(),
            state: SessionState::Open,
        }
    }

    /// Bind the session to its base. Allowed once.
    pub fn set_base_revision(&mut self, base: BaseRevision) -> StageResult<()> {
        self.ensure_open()?;
        if self.base.is_some() {
            return Err(StageError::BaseAlreadySet);
        }
        debug!(commit = ?base.commit, source = ?base.source_ref, "base revision bound");
        self.base = Some(base);
        Ok(())
    }

    /// Bind the session to whatever `name` resolves to right now.
    pub fn set_base_ref(&mut self, name: &str) -> StageResult<()> {
        let base = BaseRevision::from_ref(self.store.as_ref(), self.refs.as_ref(), name)?;
        self.set_base_revision(base)
    }

    /// Stage `contents` at `path` with the configured default mode.
    pub fn add(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> StageResult<ObjectId> {
        let mode = self.config.default_mode;
        self.add_with_mode(path, contents, mode)
    }

    /// Stage `contents` at `path`. Returns the blob id of the content.
    pub fn add_with_mode(
        &mut self,
        path: &str,
        contents: impl Into<Vec<u8>>,
        mode: EntryMode,
    ) -> StageResult<ObjectId> {
        self.bound()?;
        if mode.is_dir() {
            return Err(StageError::InvalidMode(mode));
        }
        let path = PathKey::parse(path)?;
        debug!(path = %path, %mode, "staged write");
        Ok(self.ledger.stage_write(path, contents.into(), mode))
    }

    /// Stage removal of `path`.
    ///
    /// The path must exist in the staged view: in the base tree (unless a
    /// staged ancestor hides it), as a pending write, or as a directory of
    /// pending writes. Pending-only content is simply unstaged. Removing a
    /// directory also drops every staged operation beneath it.
    pub fn remove(&mut self, path: &str) -> StageResult<()> {
        let tree = self.bound()?.tree;
        let path = PathKey::parse(path)?;

        let in_base = !self.ledger.is_shadowed(&path)
            && entry_at_path(self.store.as_ref(), tree.as_ref(), path.as_str())?.is_some();
        let pending = self.ledger.get(&path).is_some_and(StagedOp::is_write)
            || self.ledger.has_writes_beneath(&path);
        if !in_base && !pending {
            return Err(StageError::NodeNotFound {
                path: path.to_string(),
            });
        }

        let dropped = self.ledger.cancel_beneath(&path);
        if in_base {
            self.ledger.stage_remove(path.clone());
        } else {
            self.ledger.cancel(&path);
        }
        debug!(path = %path, in_base, dropped, "staged remove");
        Ok(())
    }

    /// Write the staged changes as a new commit and move the target ref.
    ///
    /// Consumes the session whether or not it succeeds; later calls fail
    /// with [`StageError::AlreadyCommitted`].
    pub fn commit(&mut self, request: CommitRequest) -> StageResult<CommitOutcome> {
        let base = self.bound()?.clone();
        let result = CommitAssembler::new(self.store.as_ref(), self.refs.as_ref(), &self.config)
            .assemble(&base, &self.ledger, request);
        self.state = match &result {
            Ok(outcome) => SessionState::Committed(outcome.commit_id),
            Err(err) => {
                debug!(error = %err, "commit failed, session closed");
                SessionState::Failed
            }
        };
        result
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn base(&self) -> Option<&BaseRevision> {
        self.base.as_ref()
    }

    pub fn ledger(&self) -> &StagingLedger {
        &self.ledger
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    fn ensure_open(&self) -> StageResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Committed(_) | SessionState::Failed => Err(StageError::AlreadyCommitted),
        }
    }

    fn bound(&self) -> StageResult<&BaseRevision> {
        self.ensure_open()?;
        self.base.as_ref().ok_or(StageError::NoBaseRevision)
    }
}

impl std::fmt::Debug for StagingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingSession")
            .field("base", &self.base)
            .field("staged", &self.ledger.len())
            .field("state", &self.state)
            .finish()
    }
}
