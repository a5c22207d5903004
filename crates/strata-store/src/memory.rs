use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use strata_types::{Entry, Key};

use crate::error::{StoreError, StoreResult};
use crate::iter::StoreIter;
use crate::options::Options;
use crate::query::{self, Query};
use crate::traits::Datastore;

/// In-memory, HashMap-based datastore.
///
/// Intended for tests and embedding. Values are held behind a `RwLock`;
/// a stored [`Bytes`] is shared with the caller that wrote it, which is
/// safe because `Bytes` is immutable. Queries snapshot the map when they
/// are issued, so concurrent writes never block an in-flight query.
pub struct MemoryDatastore {
    data: RwLock<HashMap<Key, Bytes>>,
    open: AtomicBool,
}

impl MemoryDatastore {
    /// Create a new empty, open store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            open: AtomicBool::new(true),
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or_default()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries from the store.
    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    /// Return a sorted list of all keys in the store.
    pub fn keys(&self) -> StoreResult<Vec<Key>> {
        let map = self.read()?;
        let mut keys: Vec<Key> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Returns `true` unless the store has been closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Key, Bytes>>> {
        self.data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Key, Bytes>>> {
        self.data
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for MemoryDatastore {
    fn open(&self) -> StoreResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.ensure_open()?;
        self.write()?.insert(key.clone(), value);
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.ensure_open()?;
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.read()?.contains_key(key))
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.ensure_open()?;
        self.write()?.remove(key);
        Ok(())
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        if let Err(e) = self.ensure_open() {
            return Box::new(std::iter::once(Err(e)));
        }
        let snapshot: Vec<Entry> = match self.read() {
            Ok(map) => map
                .iter()
                .filter(|(key, _)| query.matches_prefix(key))
                .map(|(key, value)| Entry::new(key.clone(), value.clone()))
                .collect(),
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        query::execute(Box::new(snapshot.into_iter().map(Ok)), query, options)
    }
}

impl std::fmt::Debug for MemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatastore")
            .field("entry_count", &self.len())
            .field("open", &self.is_open())
            .finish()
    }
}
