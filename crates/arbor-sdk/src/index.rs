use arbor_stage::{BaseRevision, CommitOutcome, CommitRequest, StagingSession};
use arbor_store::EntryMode;
use arbor_types::{ObjectId, Signature};

use crate::error::SdkResult;
use crate::repository::Repository;

/// Staged changes on top of one revision of a [`Repository`].
///
/// Commits go to the branch the index was opened on, or to the configured
/// default ref when it was opened on a tag or a bare commit. The repository's
/// reference map is refreshed after every successful commit.
pub struct Index<'r> {
    repo: &'r Repository,
    session: StagingSession,
    target: Option<String>,
}

impl<'r> Index<'r> {
    pub(crate) fn new(repo: &'r Repository, base: BaseRevision) -> SdkResult<Self> {
        let mut session =
            StagingSession::with_config(repo.shared_store(), repo.shared_refs(), repo.config().clone());
        let target = base
            .source_ref
            .clone()
            .filter(|name| !name.starts_with("refs/tags/"));
        session.set_base_revision(base)?;
        Ok(Self {
            repo,
            session,
            target,
        })
    }

    pub fn add(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> SdkResult<ObjectId> {
        Ok(self.session.add(path, contents)?)
    }

    pub fn add_with_mode(
        &mut self,
        path: &str,
        contents: impl Into<Vec<u8>>,
        mode: EntryMode,
    ) -> SdkResult<ObjectId> {
        Ok(self.session.add_with_mode(path, contents, mode)?)
    }

    pub fn remove(&mut self, path: &str) -> SdkResult<()> {
        Ok(self.session.remove(path)?)
    }

    /// Commit with `author` as both author and committer.
    pub fn commit(&mut self, message: &str, author: Signature) -> SdkResult<CommitOutcome> {
        self.commit_request(CommitRequest::new(message, author))
    }

    pub fn commit_request(&mut self, mut request: CommitRequest) -> SdkResult<CommitOutcome> {
        if request.target_ref.is_none() {
            request.target_ref = self.target.clone();
        }
        let outcome = self.session.commit(request)?;
        self.repo.refresh_refs()?;
        Ok(outcome)
    }

    pub fn base(&self) -> Option<&BaseRevision> {
        self.session.base()
    }

    pub fn session(&self) -> &StagingSession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use arbor_refs::HEAD;
    use arbor_stage::{SessionState, StageError};

    fn sig() -> Signature {
        Signature::from_unix("Jane Roe", "jane@example.net", 1_700_000_000, 0).unwrap()
    }

    #[test]
    fn commit_closes_the_index() {
        let repo = Repository::in_memory().unwrap();
        let mut index = repo.index(HEAD).unwrap();
        index.add("a", "1").unwrap();
        let outcome = index.commit("one", sig()).unwrap();

        assert_eq!(index.session().state(), SessionState::Committed(outcome.commit_id));
        assert!(matches!(
            index.add("b", "2"),
            Err(SdkError::Stage(StageError::AlreadyCommitted))
        ));
    }

    #[test]
    fn executable_mode_is_kept() {
        let repo = Repository::in_memory().unwrap();
        let mut index = repo.index(HEAD).unwrap();
        index.add_with_mode("bin/run", "#!/bin/sh", EntryMode::Executable).unwrap();
        index.commit("tool", sig()).unwrap();
        assert_eq!(
            repo.head().unwrap().node("bin/run").unwrap().mode(),
            EntryMode::Executable
        );
    }

    #[test]
    fn removing_unknown_path_keeps_index_usable() {
        let repo = Repository::in_memory().unwrap();
        let mut index = repo.index(HEAD).unwrap();
        index.add("kept", "k").unwrap();
        assert!(matches!(
            index.remove("ghost"),
            Err(SdkError::Stage(StageError::NodeNotFound { .. }))
        ));
        index.commit("still fine", sig()).unwrap();
        assert!(repo.head().unwrap().node("kept").is_ok());
    }

    #[test]
    fn stale_index_conflicts_and_leaves_ref() {
        let repo = Repository::in_memory().unwrap();
        let mut first = repo.index(HEAD).unwrap();
        let mut second = repo.index(HEAD).unwrap();
        first.add("a", "1").unwrap();
        second.add("b", "2").unwrap();

        let winner = first.commit("first", sig()).unwrap().commit_id;
        assert!(matches!(
            second.commit("second", sig()),
            Err(SdkError::Stage(StageError::Conflict { .. }))
        ));
        assert_eq!(repo.head().unwrap().id(), winner);
        assert_eq!(second.session().state(), SessionState::Failed);
    }
}
