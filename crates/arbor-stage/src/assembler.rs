//! Turning a staged ledger into a commit.

use arbor_refs::{canonical_branch, Head, Ref, RefError, RefStore, HEAD};
use arbor_store::{Commit, ObjectStore};
use arbor_types::{ObjectId, Signature};
use tracing::{info, warn};

use crate::config::StageConfig;
use crate::error::{StageError, StageResult};
use crate::graph::TreeBuilderGraph;
use crate::ledger::StagingLedger;
use crate::path::PathKey;
use crate::session::BaseRevision;

/// Metadata for a new commit.
#[derive(Clone, Debug)]
pub struct CommitRequest {
    pub message: String,
    pub author: Signature,
    /// Defaults to the author.
    pub committer: Option<Signature>,
    /// Defaults to the base commit, or no parents for an unborn base.
    pub parents: Option<Vec<ObjectId>>,
    /// Ref to move. Defaults to the configured ref (normally `HEAD`).
    pub target_ref: Option<String>,
}

impl CommitRequest {
    pub fn new(message: impl Into<String>, author: Signature) -> Self {
        Self {
            message: message.into(),
            author,
            committer: None,
            parents: None,
            target_ref: None,
        }
    }

    pub fn with_committer(mut self, committer: Signature) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn with_parents(mut self, parents: Vec<ObjectId>) -> Self {
        self.parents = Some(parents);
        self
    }

    pub fn with_target_ref(mut self, name: impl Into<String>) -> Self {
        self.target_ref = Some(name.into());
        self
    }
}

/// What a successful commit produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_id: ObjectId,
    pub tree_id: ObjectId,
    pub parents: Vec<ObjectId>,
    /// Canonical name of the ref that was moved, or `HEAD` when detached.
    pub ref_name: String,
    /// Directories finalized, deepest first.
    pub finalized: Vec<PathKey>,
    pub blobs_written: usize,
    pub trees_written: usize,
}

/// Where the new commit gets published.
#[derive(Clone, Debug, PartialEq, Eq)]
enum RefTarget {
    Branch { short: String, canonical: String },
    DetachedHead,
}

impl RefTarget {
    fn name(&self) -> &str {
        match self {
            RefTarget::Branch { canonical, .. } => canonical,
            RefTarget::DetachedHead => HEAD,
        }
    }
}

/// Runs the commit phases against a store and a ref store.
pub struct CommitAssembler<'a> {
    store: &'a dyn ObjectStore,
    refs: &'a dyn RefStore,
    config: &'a StageConfig,
}

impl<'a> CommitAssembler<'a> {
    pub fn new(store: &'a dyn ObjectStore, refs: &'a dyn RefStore, config: &'a StageConfig) -> Self {
        Self {
            store,
            refs,
            config,
        }
    }

    /// Commit `ledger` on top of `base`.
    ///
    /// All structural checks happen before the first store write. The ref
    /// only moves if it still holds the value [`Self::expected_tip`] picks;
    /// otherwise the commit fails with [`StageError::Conflict`] and the
    /// objects already written are left unreferenced.
    pub fn assemble(
        &self,
        base: &BaseRevision,
        ledger: &StagingLedger,
        request: CommitRequest,
    ) -> StageResult<CommitOutcome> {
        let requested = request
            .target_ref
            .clone()
            .unwrap_or_else(|| self.config.default_ref.clone());
        let target = self.resolve_target(&requested)?;
        let current = self.current(&target)?;
        let expected = self.expected_tip(base, &target, current, request.parents.is_none());

        let mut graph = TreeBuilderGraph::new(self.store, base.tree, self.config.empty_dirs);
        graph.apply_ledger(ledger)?;

        let blobs = ledger.pending_blobs();
        self.store.write_batch(&blobs)?;

        let tree = graph.finalize()?;

        let parents = request
            .parents
            .unwrap_or_else(|| base.commit.into_iter().collect());
        let committer = request.committer.unwrap_or_else(|| request.author.clone());
        let commit = Commit {
            tree: tree.root,
            parents: parents.clone(),
            author: request.author,
            committer,
            message: request.message,
        };
        let commit_id = self.store.write_commit(&commit)?;

        self.publish(&target, expected, commit_id)?;
        info!(
            commit = %commit_id.short_hex(),
            tree = %tree.root.short_hex(),
            ref_name = target.name(),
            ops = ledger.len(),
            "commit created"
        );

        Ok(CommitOutcome {
            commit_id,
            tree_id: tree.root,
            parents,
            ref_name: target.name().to_string(),
            finalized: tree.order,
            blobs_written: blobs.len(),
            trees_written: tree.trees_written,
        })
    }

    fn resolve_target(&self, name: &str) -> StageResult<RefTarget> {
        if name == HEAD {
            return match self.refs.head()? {
                Some(Head::Symbolic(branch)) => Ok(branch_target(&branch)),
                Some(Head::Detached(_)) => Ok(RefTarget::DetachedHead),
                None => Err(RefError::NotFound {
                    name: HEAD.to_string(),
                }
                .into()),
            };
        }
        if let Some(tag) = name.strip_prefix("refs/tags/") {
            return Err(RefError::TagImmutable {
                name: tag.to_string(),
            }
            .into());
        }
        let short = name.strip_prefix("refs/heads/").unwrap_or(name);
        arbor_refs::validate_branch_name(short)?;
        Ok(branch_target(short))
    }

    /// The value `target` must still hold when the commit is published.
    ///
    /// Targets naming the ref the base was read from, however spelled, must
    /// still be at the base commit. So must any existing ref when the
    /// parents default to the base. A missing branch is created from
    /// nothing, and explicit parents only require the ref not to move
    /// while the commit is written.
    fn expected_tip(
        &self,
        base: &BaseRevision,
        target: &RefTarget,
        current: Option<ObjectId>,
        default_parents: bool,
    ) -> Option<ObjectId> {
        let from_source = base
            .source_ref
            .as_deref()
            .filter(|source| !source.starts_with("refs/tags/"))
            .and_then(|source| self.resolve_target(source).ok())
            .is_some_and(|source| &source == target);
        if from_source || (default_parents && current.is_some()) {
            base.commit
        } else {
            current
        }
    }

    fn current(&self, target: &RefTarget) -> StageResult<Option<ObjectId>> {
        Ok(match target {
            RefTarget::Branch { canonical, .. } => self.refs.resolve(canonical)?,
            RefTarget::DetachedHead => self.refs.resolve(HEAD)?,
        })
    }

    fn publish(
        &self,
        target: &RefTarget,
        expected: Option<ObjectId>,
        commit_id: ObjectId,
    ) -> StageResult<()> {
        let result = match target {
            RefTarget::Branch { short, canonical } => {
                self.refs
                    .compare_and_swap(canonical, expected, &Ref::branch(short.as_str(), commit_id))
            }
            RefTarget::DetachedHead => self.refs.compare_and_swap_head(expected, commit_id),
        };
        result.map_err(|err| {
            if matches!(err, RefError::Conflict { .. }) {
                warn!(ref_name = target.name(), commit = %commit_id.short_hex(), "ref moved during commit");
            }
            StageError::from(err)
        })
    }
}

fn branch_target(short: &str) -> RefTarget {
    RefTarget::Branch {
        short: short.to_string(),
        canonical: canonical_branch(short),
    }
}
