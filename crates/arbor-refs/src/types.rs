//! Core reference types.
//!
//! References are named pointers to commits. They come in two flavors:
//! branches (mutable tips) and tags (immutable snapshots).

use arbor_types::{ObjectId, Signature};
use serde::{Deserialize, Serialize};

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ref {
    /// A branch is a mutable pointer to a commit.
    Branch {
        /// Human-readable branch name (e.g. "main", "feature/auth").
        name: String,
        /// The commit at the tip of this branch.
        target: ObjectId,
    },

    /// A tag is an immutable pointer to a specific commit.
    Tag {
        /// Tag name (e.g. "v1.0.0").
        name: String,
        /// The tagged commit.
        target: ObjectId,
        /// Identity of the tagger, for annotated tags.
        tagger: Option<Signature>,
        /// Tag message, for annotated tags.
        message: Option<String>,
    },
}

impl Ref {
    pub fn branch(name: impl Into<String>, target: ObjectId) -> Self {
        Ref::Branch {
            name: name.into(),
            target,
        }
    }

    /// A lightweight tag (no tagger, no message).
    pub fn tag(name: impl Into<String>, target: ObjectId) -> Self {
        Ref::Tag {
            name: name.into(),
            target,
            tagger: None,
            message: None,
        }
    }

    /// Returns the canonical name for this ref (e.g. "refs/heads/main").
    pub fn canonical_name(&self) -> String {
        match self {
            Ref::Branch { name, .. } => format!("refs/heads/{name}"),
            Ref::Tag { name, .. } => format!("refs/tags/{name}"),
        }
    }

    /// Returns the short name of this ref (without the refs/ prefix).
    pub fn short_name(&self) -> &str {
        match self {
            Ref::Branch { name, .. } | Ref::Tag { name, .. } => name,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Ref::Branch { .. })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Ref::Tag { .. })
    }

    /// The commit this ref points to.
    pub fn target(&self) -> ObjectId {
        match self {
            Ref::Branch { target, .. } | Ref::Tag { target, .. } => *target,
        }
    }
}

/// The state of HEAD: either symbolic (pointing to a branch) or detached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Head {
    /// HEAD points to a branch by short name. The branch may not exist yet
    /// (an unborn branch in an empty repository).
    Symbolic(String),
    /// HEAD is detached, pointing directly to a commit.
    Detached(ObjectId),
}
