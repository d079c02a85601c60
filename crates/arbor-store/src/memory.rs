use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// Object store backed by a `HashMap` behind a `RwLock`.
///
/// Used by tests and by embedders that do not need persistence. Objects are
/// cloned on the way in and on the way out.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<ObjectId, StoredObject>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn exclusive(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<ObjectId, StoredObject>>> {
        self.objects
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored id, sorted.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<ObjectId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn checked_id(object: &StoredObject) -> StoreResult<ObjectId> {
    let id = object.compute_id();
    if id.is_null() {
        return Err(StoreError::NullObjectId);
    }
    Ok(id)
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.shared()?.get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = checked_id(object)?;
        self.exclusive()?
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.shared()?.contains_key(id))
    }

    /// Hashes everything first, then inserts under a single write lock.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        let ids = objects.iter().map(checked_id).collect::<StoreResult<Vec<_>>>()?;
        let mut map = self.exclusive()?;
        for (id, object) in ids.iter().zip(objects) {
            map.entry(*id).or_insert_with(|| object.clone());
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::object::*;
    use arbor_types::Signature;

    #[test]
    fn blob_tree_and_commit_through_typed_helpers() {
        let store = InMemoryObjectStore::new();
        let blob = store.write_blob(b"hello").unwrap();
        let tree = store
            .write_tree(&Tree::new(vec![TreeEntry::new(EntryMode::Regular, "hello.txt", blob)]))
            .unwrap();
        let sig = Signature::from_unix("A", "a@example.net", 10, 0).unwrap();
        let commit = Commit {
            tree,
            parents: vec![],
            author: sig.clone(),
            committer: sig,
            message: "init".into(),
        };
        let id = store.write_commit(&commit).unwrap();

        assert_eq!(store.read_blob(&blob).unwrap().data, b"hello");
        assert_eq!(store.read_tree(&tree).unwrap().get("hello.txt").unwrap().object_id, blob);
        assert_eq!(store.read_commit(&id).unwrap(), commit);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn typed_read_of_wrong_kind_is_corrupt() {
        let store = InMemoryObjectStore::new();
        let id = store.write_blob(b"not a tree").unwrap();
        assert!(matches!(
            store.read_tree(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn typed_read_of_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"missing");
        assert!(matches!(store.read_blob(&id), Err(StoreError::NotFound(x)) if x == id));
        assert!(store.read(&id).unwrap().is_none());
    }

    #[test]
    fn rewriting_content_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let first = store.write_blob(b"identical content").unwrap();
        let again = store.write_blob(b"identical content").unwrap();
        assert_eq!(first, again);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn exists_tracks_writes() {
        let store = InMemoryObjectStore::new();
        let id = Blob::id_for(b"present");
        assert!(!store.exists(&id).unwrap());
        store.write_blob(b"present").unwrap();
        assert!(store.exists(&id).unwrap());
    }

    #[test]
    fn batch_ids_follow_input_order_and_dedupe() {
        let store = InMemoryObjectStore::new();
        let objects: Vec<StoredObject> = [&b"one"[..], b"two", b"one"]
            .iter()
            .map(|data| Blob::new(data.to_vec()).to_stored_object())
            .collect();
        let ids = store.write_batch(&objects).unwrap();
        assert_eq!(ids, vec![Blob::id_for(b"one"), Blob::id_for(b"two"), Blob::id_for(b"one")]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn all_ids_is_sorted() {
        let store = InMemoryObjectStore::new();
        for data in [b"aaa", b"bbb", b"ccc"] {
            store.write_blob(data).unwrap();
        }
        let ids = store.all_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn parallel_writers_of_the_same_tree_agree() {
        let store = Arc::new(InMemoryObjectStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let blob = store.write_blob(b"shared").unwrap();
                    store
                        .write_tree(&Tree::new(vec![TreeEntry::new(EntryMode::Regular, "f", blob)]))
                        .unwrap()
                })
            })
            .collect();
        let ids: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let store = Arc::new(InMemoryObjectStore::new());
        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.objects.write().unwrap();
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.write_blob(b"x"), Err(StoreError::Poisoned(_))));
        assert!(matches!(store.exists(&Blob::id_for(b"x")), Err(StoreError::Poisoned(_))));
        assert_eq!(store.len(), 0);
    }
}
