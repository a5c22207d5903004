use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use strata_store::{Datastore, MemoryDatastore, Options, Query, StoreError, StoreIter, StoreResult};
use strata_types::{Entry, Key};

/// A [`MemoryDatastore`] whose lifecycle calls, writes and deletes can be
/// made to fail.
///
/// Failures surface as [`StoreError::OpenFailed`],
/// [`StoreError::WriteFailed`] and [`StoreError::DeleteFailed`] wrapping an
/// injected I/O error. A failed `close` is a write failure, as if the final
/// flush did not go through, and leaves the store open.
#[derive(Debug, Default)]
pub struct FaultyDatastore {
    inner: MemoryDatastore,
    fail_opens: AtomicBool,
    fail_closes: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FaultyDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::Release);
    }

    pub fn fail_closes(&self, fail: bool) {
        self.fail_closes.store(fail, Ordering::Release);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Release);
    }

    /// The backing store, bypassing fault injection.
    pub fn inner(&self) -> &MemoryDatastore {
        &self.inner
    }
}

impl Datastore for FaultyDatastore {
    fn open(&self) -> StoreResult<()> {
        if self.fail_opens.load(Ordering::Acquire) {
            return Err(StoreError::open_failed(io::Error::other("injected open failure")));
        }
        self.inner.open()
    }

    fn close(&self) -> StoreResult<()> {
        if self.fail_closes.load(Ordering::Acquire) {
            return Err(StoreError::write_failed(io::Error::other("injected close failure")));
        }
        self.inner.close()
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StoreError::write_failed(io::Error::other(format!(
                "injected write failure for {key}"
            ))));
        }
        self.inner.put(key, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.inner.get(key)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.inner.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::Acquire) {
            return Err(StoreError::delete_failed(io::Error::other(format!(
                "injected delete failure for {key}"
            ))));
        }
        self.inner.delete(key)
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        self.inner.query(query, options)
    }
}
