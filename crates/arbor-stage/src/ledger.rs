//! Pending operations keyed by path.

use std::collections::{BTreeMap, BTreeSet};

use arbor_store::{Blob, EntryMode, StoredObject};
use arbor_types::ObjectId;

use crate::path::PathKey;

/// A staged change to a single path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagedOp {
    /// Place a file with the given content and mode at the path.
    Write { blob: ObjectId, mode: EntryMode },
    /// Drop whatever the base tree has at the path.
    Remove,
}

impl StagedOp {
    pub fn is_write(&self) -> bool {
        matches!(self, StagedOp::Write { .. })
    }
}

/// At most one pending operation per path; later staging replaces earlier.
///
/// Blob payloads are held here, hashed but unwritten, until the commit
/// flushes the ones still referenced.
#[derive(Clone, Debug, Default)]
pub struct StagingLedger {
    ops: BTreeMap<PathKey, StagedOp>,
    payloads: BTreeMap<ObjectId, Vec<u8>>,
}

impl StagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `contents` at `path`, replacing any earlier operation there.
    /// Returns the blob id the content will be stored under.
    pub fn stage_write(&mut self, path: PathKey, contents: Vec<u8>, mode: EntryMode) -> ObjectId {
        let blob = Blob::id_for(&contents);
        self.payloads.entry(blob).or_insert(contents);
        self.ops.insert(path, StagedOp::Write { blob, mode });
        blob
    }

    /// Stage removal of `path`, replacing any earlier operation there.
    pub fn stage_remove(&mut self, path: PathKey) {
        self.ops.insert(path, StagedOp::Remove);
    }

    /// Forget the pending operation at `path`.
    pub fn cancel(&mut self, path: &PathKey) -> Option<StagedOp> {
        self.ops.remove(path)
    }

    /// Forget every pending operation strictly below `dir`. Returns how many
    /// were dropped.
    pub fn cancel_beneath(&mut self, dir: &PathKey) -> usize {
        let doomed: Vec<PathKey> = self.beneath(dir).map(|(path, _)| path.clone()).collect();
        for path in &doomed {
            self.ops.remove(path);
        }
        doomed.len()
    }

    pub fn get(&self, path: &PathKey) -> Option<&StagedOp> {
        self.ops.get(path)
    }

    /// Whether any pending write lies strictly below `dir`.
    pub fn has_writes_beneath(&self, dir: &PathKey) -> bool {
        self.beneath(dir).any(|(_, op)| op.is_write())
    }

    /// Whether a proper ancestor of `path` has a pending operation, which
    /// hides whatever the base tree holds at `path`.
    pub fn is_shadowed(&self, path: &PathKey) -> bool {
        path.ancestors().iter().any(|dir| self.ops.contains_key(dir))
    }

    /// Paths staged for removal.
    pub fn removed_paths(&self) -> BTreeSet<PathKey> {
        self.ops
            .iter()
            .filter(|(_, op)| **op == StagedOp::Remove)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Blob objects still referenced by a pending write, each once, in id
    /// order. Payloads orphaned by a later write or a cancel are skipped.
    pub fn pending_blobs(&self) -> Vec<StoredObject> {
        let referenced: BTreeSet<ObjectId> = self
            .ops
            .values()
            .filter_map(|op| match op {
                StagedOp::Write { blob, .. } => Some(*blob),
                StagedOp::Remove => None,
            })
            .collect();
        referenced
            .iter()
            .filter_map(|id| self.payloads.get(id))
            .map(|data| Blob::new(data.clone()).to_stored_object())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &StagedOp)> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn beneath<'a>(
        &'a self,
        dir: &'a PathKey,
    ) -> impl Iterator<Item = (&'a PathKey, &'a StagedOp)> + 'a {
        self.ops.iter().filter(move |(path, _)| path.is_beneath(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PathKey {
        PathKey::parse(s).unwrap()
    }

    #[test]
    fn last_write_wins() {
        let mut ledger = StagingLedger::new();
        ledger.stage_write(key("a"), b"one".to_vec(), EntryMode::Regular);
        let second = ledger.stage_write(key("a"), b"two".to_vec(), EntryMode::Executable);
        assert_eq!(ledger.len(), 1);
        assert_eq!(
            ledger.get(&key("a")),
            Some(&StagedOp::Write {
                blob: second,
                mode: EntryMode::Executable
            })
        );
    }

    #[test]
    fn remove_replaces_write() {
        let mut ledger = StagingLedger::new();
        ledger.stage_write(key("a"), b"one".to_vec(), EntryMode::Regular);
        ledger.stage_remove(key("a"));
        assert_eq!(ledger.get(&key("a")), Some(&StagedOp::Remove));
        assert_eq!(ledger.removed_paths().len(), 1);
    }

    #[test]
    fn orphaned_payloads_are_not_flushed() {
        let mut ledger = StagingLedger::new();
        ledger.stage_write(key("a"), b"stale".to_vec(), EntryMode::Regular);
        let fresh = ledger.stage_write(key("a"), b"fresh".to_vec(), EntryMode::Regular);
        ledger.stage_write(key("b"), b"gone".to_vec(), EntryMode::Regular);
        ledger.cancel(&key("b"));

        let blobs = ledger.pending_blobs();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].compute_id(), fresh);
    }

    #[test]
    fn shared_content_is_flushed_once() {
        let mut ledger = StagingLedger::new();
        ledger.stage_write(key("a"), b"same".to_vec(), EntryMode::Regular);
        ledger.stage_write(key("b/c"), b"same".to_vec(), EntryMode::Regular);
        assert_eq!(ledger.pending_blobs().len(), 1);
    }

    #[test]
    fn beneath_stops_at_segment_boundaries() {
        let mut ledger = StagingLedger::new();
        for path in ["a", "a-b", "a/x", "a/y/z", "a0", "ab", "b"] {
            ledger.stage_write(key(path), path.as_bytes().to_vec(), EntryMode::Regular);
        }
        assert!(ledger.has_writes_beneath(&key("a")));
        assert!(!ledger.has_writes_beneath(&key("ab")));
        assert_eq!(ledger.cancel_beneath(&key("a")), 2);
        let left: Vec<&str> = ledger.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(left, vec!["a", "a-b", "a0", "ab", "b"]);
    }

    #[test]
    fn beneath_root_covers_everything() {
        let mut ledger = StagingLedger::new();
        ledger.stage_write(key("a"), b"1".to_vec(), EntryMode::Regular);
        ledger.stage_remove(key("z/y"));
        assert_eq!(ledger.cancel_beneath(&PathKey::root()), 2);
        assert!(ledger.is_empty());
    }

    #[test]
    fn staged_ancestors_shadow_descendants() {
        let mut ledger = StagingLedger::new();
        ledger.stage_remove(key("woot"));
        ledger.stage_write(key("test"), b"flat".to_vec(), EntryMode::Regular);
        assert!(ledger.is_shadowed(&key("woot/bar")));
        assert!(ledger.is_shadowed(&key("test/inner/deep")));
        assert!(!ledger.is_shadowed(&key("woot")));
        assert!(!ledger.is_shadowed(&key("wootbar")));
    }
}
