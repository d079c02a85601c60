//! In-memory reference store for testing and ephemeral use.
//!
//! [`InMemoryRefStore`] stores all refs in a `HashMap` protected by a
//! `RwLock`. It implements the full [`RefStore`] trait.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::{canonical_branch, validate_branch_name, validate_tag_name, HEAD};
use crate::traits::RefStore;
use crate::types::{Head, Ref};

/// An in-memory implementation of [`RefStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<HashMap<String, Ref>>,
    head: RwLock<Option<Head>>,
}

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| RefError::Poisoned(e.to_string()))
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| RefError::Poisoned(e.to_string()))
}

/// Check the ref's own name and that it is stored under its canonical name.
fn validate_ref(name: &str, reference: &Ref) -> Result<()> {
    match reference {
        Ref::Branch { name: bname, .. } => validate_branch_name(bname)?,
        Ref::Tag { name: tname, .. } => validate_tag_name(tname)?,
    }
    let canonical = reference.canonical_name();
    if name != canonical {
        return Err(RefError::InvalidName {
            name: name.to_string(),
            reason: format!("ref must be stored under {canonical}"),
        });
    }
    Ok(())
}

fn reject_tag_overwrite(refs: &HashMap<String, Ref>, name: &str) -> Result<()> {
    if refs.get(name).is_some_and(Ref::is_tag) {
        return Err(RefError::TagImmutable {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<Ref>> {
        Ok(read_lock(&self.refs)?.get(name).cloned())
    }

    fn write_ref(&self, name: &str, reference: &Ref) -> Result<()> {
        validate_ref(name, reference)?;
        let mut refs = write_lock(&self.refs)?;
        reject_tag_overwrite(&refs, name)?;
        refs.insert(name.to_string(), reference.clone());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        reference: &Ref,
    ) -> Result<()> {
        validate_ref(name, reference)?;
        let mut refs = write_lock(&self.refs)?;
        reject_tag_overwrite(&refs, name)?;
        let actual = refs.get(name).map(Ref::target);
        if actual != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        debug!(ref_name = name, commit = %reference.target().short_hex(), "ref updated");
        refs.insert(name.to_string(), reference.clone());
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        if let Some(Head::Symbolic(current)) = read_lock(&self.head)?.as_ref() {
            if name == canonical_branch(current) {
                return Err(RefError::DeleteCurrentBranch {
                    name: current.clone(),
                });
            }
        }
        Ok(write_lock(&self.refs)?.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Ref)>> {
        let refs = read_lock(&self.refs)?;
        let mut result: Vec<(String, Ref)> = refs
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }

    fn head(&self) -> Result<Option<Head>> {
        Ok(read_lock(&self.head)?.clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        *write_lock(&self.head)? = Some(Head::Symbolic(branch.to_string()));
        Ok(())
    }

    fn set_head_detached(&self, target: ObjectId) -> Result<()> {
        *write_lock(&self.head)? = Some(Head::Detached(target));
        Ok(())
    }

    fn compare_and_swap_head(&self, expected: Option<ObjectId>, target: ObjectId) -> Result<()> {
        let mut head = write_lock(&self.head)?;
        let actual = match head.as_ref() {
            Some(Head::Detached(id)) => Some(*id),
            _ => None,
        };
        let detached_or_unset = !matches!(head.as_ref(), Some(Head::Symbolic(_)));
        if !detached_or_unset || actual != expected {
            return Err(RefError::Conflict {
                name: HEAD.to_string(),
                expected,
                actual,
            });
        }
        debug!(commit = %target.short_hex(), "detached HEAD updated");
        *head = Some(Head::Detached(target));
        Ok(())
    }
}
