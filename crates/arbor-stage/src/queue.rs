//! Deepest-first ordering of paths.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::path::PathKey;

#[derive(Debug, PartialEq, Eq)]
struct Ranked {
    depth: usize,
    path: PathKey,
}

impl Ord for Ranked {
    // Max-heap: more segments first, then lexically smaller paths first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of paths that yields the deepest path first.
///
/// Every path is popped before any of its ancestors, and the root (depth 0)
/// always comes out last. Paths of equal depth come out in ascending
/// lexical order so the drain sequence is the same for every insertion
/// order. A path already waiting in the queue is not queued twice.
#[derive(Debug, Default)]
pub struct DepthQueue {
    heap: BinaryHeap<Ranked>,
    queued: HashSet<PathKey>,
}

impl DepthQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `path`. Returns `false` if it was already waiting.
    pub fn push(&mut self, path: PathKey) -> bool {
        if !self.queued.insert(path.clone()) {
            return false;
        }
        self.heap.push(Ranked {
            depth: path.depth(),
            path,
        });
        true
    }

    pub fn pop_deepest(&mut self) -> Option<PathKey> {
        let Ranked { path, .. } = self.heap.pop()?;
        self.queued.remove(&path);
        Some(path)
    }

    pub fn peek(&self) -> Option<&PathKey> {
        self.heap.peek().map(|ranked| &ranked.path)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl FromIterator<PathKey> for DepthQueue {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        let mut queue = Self::new();
        for path in iter {
            queue.push(path);
        }
        queue
    }
}

impl Iterator for DepthQueue {
    type Item = PathKey;

    fn next(&mut self) -> Option<PathKey> {
        self.pop_deepest()
    }
}
