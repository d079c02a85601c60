//! Normalized repository paths.

use std::fmt;

use crate::error::{StageError, StageResult};

/// A normalized, slash-separated path relative to the repository root.
///
/// Normalization treats `\` as a separator, drops empty and `.` segments and
/// resolves `..` against the segments before it. Two spellings of the same
/// location therefore produce equal keys. The empty key is the root
/// directory; it is never produced by [`PathKey::parse`], since the root
/// cannot be the target of a staged operation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// The root directory.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize a caller-supplied path.
    ///
    /// Fails with [`StageError::InvalidPath`] when the path names the root,
    /// climbs above it with `..`, or contains a NUL byte.
    pub fn parse(raw: &str) -> StageResult<Self> {
        let invalid = |reason: &str| StageError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(invalid("escapes the repository root"));
                    }
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(invalid("names the repository root"));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments. The root has depth 0.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count() + 1
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The containing directory. `None` for the root.
    pub fn parent(&self) -> Option<PathKey> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        })
    }

    /// The last segment. Empty for the root.
    pub fn basename(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Append a single entry name.
    pub fn join(&self, name: &str) -> PathKey {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    /// Returns `true` if `self` lies strictly below `ancestor`.
    pub fn is_beneath(&self, ancestor: &PathKey) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// Proper ancestors, nearest first, ending with the root.
    pub fn ancestors(&self) -> Vec<PathKey> {
        let mut out = Vec::with_capacity(self.depth());
        let mut current = self.parent();
        while let Some(dir) = current {
            current = dir.parent();
            out.push(dir);
        }
        out
    }
}

impl fmt::Debug for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathKey({:?})", self.0)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}
