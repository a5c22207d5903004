use std::sync::Arc;

use bytes::Bytes;
use strata_types::{Entry, Key, Pair};

use crate::error::StoreResult;
use crate::iter::{Source, StoreIter, StoreIterExt};
use crate::options::Options;
use crate::query::Query;

/// Key-value datastore.
///
/// All implementations must satisfy these invariants:
/// - `put` is an unconditional upsert.
/// - `get` on an absent key fails with `StoreError::NotFound`.
/// - `has` and `delete` never fail because a key is absent.
/// - After `close`, data operations fail until `open` is called again.
/// - Every operation may be invoked concurrently. Single-key operations are
///   individually safe; there is no cross-key atomicity and a `query` may
///   observe a mixture of states of concurrent writes.
///
/// The trait is object-safe so decorators can hold `Box<dyn Datastore>`.
pub trait Datastore: Send + Sync {
    /// Acquire backend resources. Reopening a closed store must succeed.
    fn open(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Release backend resources. Safe to call more than once.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()>;

    /// Read the value stored under `key`.
    fn get(&self, key: &Key) -> StoreResult<Bytes>;

    /// Check whether a value is stored under `key`.
    fn has(&self, key: &Key) -> StoreResult<bool>;

    /// Remove the value stored under `key`, if any.
    fn delete(&self, key: &Key) -> StoreResult<()>;

    /// Store every pair from `source`, yielding each pair once written.
    ///
    /// Default implementation calls `put()` for each pair.
    fn put_many<'a>(&'a self, source: Source<'a, Pair>, options: &Options) -> StoreIter<'a, Pair> {
        Box::new(
            source
                .map(move |pair| -> StoreResult<Pair> {
                    self.put(&pair.key, pair.value.clone())?;
                    Ok(pair)
                })
                .abortable(options)
                .stop_on_error(),
        )
    }

    /// Read the value of every key from `source`, in order.
    ///
    /// Default implementation calls `get()` for each key.
    fn get_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Bytes> {
        Box::new(
            source
                .map(move |key| self.get(&key))
                .abortable(options)
                .stop_on_error(),
        )
    }

    /// Delete every key from `source`, yielding each key once deleted.
    ///
    /// Default implementation calls `delete()` for each key.
    fn delete_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Key> {
        Box::new(
            source
                .map(move |key| -> StoreResult<Key> {
                    self.delete(&key)?;
                    Ok(key)
                })
                .abortable(options)
                .stop_on_error(),
        )
    }

    /// Start a write batch.
    ///
    /// Default implementation stages in memory and commits through
    /// `put_many()` then `delete_many()`.
    fn batch(&self) -> Box<dyn Batch + '_> {
        Box::new(BasicBatch::new(self))
    }

    /// Run `query` over the store's entries.
    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry>;
}

/// Staged writes, invisible to readers until [`Batch::commit`] succeeds.
pub trait Batch: Send {
    /// Stage a put.
    fn put(&mut self, key: Key, value: Bytes);

    /// Stage a delete.
    fn delete(&mut self, key: Key);

    /// Apply all staged puts, then all staged deletes.
    ///
    /// A put followed by a delete of the same key nets to "deleted". On
    /// failure, writes already applied stay applied.
    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()>;
}

/// A batch that stages writes in memory and replays them against a store.
pub struct BasicBatch<'a, D: ?Sized> {
    store: &'a D,
    puts: Vec<Pair>,
    deletes: Vec<Key>,
}

impl<'a, D: ?Sized> BasicBatch<'a, D> {
    pub fn new(store: &'a D) -> Self {
        Self {
            store,
            puts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: Datastore + ?Sized> Batch for BasicBatch<'_, D> {
    fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push(Pair { key, value });
    }

    fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()> {
        let BasicBatch {
            store,
            puts,
            deletes,
        } = *self;
        options.check()?;
        for written in store.put_many(Box::new(puts.into_iter()), options) {
            written?;
        }
        for deleted in store.delete_many(Box::new(deletes.into_iter()), options) {
            deleted?;
        }
        Ok(())
    }
}

macro_rules! forward_datastore {
    ($wrapper:ty) => {
        impl<D: Datastore + ?Sized> Datastore for $wrapper {
            fn open(&self) -> StoreResult<()> {
                (**self).open()
            }

            fn close(&self) -> StoreResult<()> {
                (**self).close()
            }

            fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
                (**self).put(key, value)
            }

            fn get(&self, key: &Key) -> StoreResult<Bytes> {
                (**self).get(key)
            }

            fn has(&self, key: &Key) -> StoreResult<bool> {
                (**self).has(key)
            }

            fn delete(&self, key: &Key) -> StoreResult<()> {
                (**self).delete(key)
            }

            fn put_many<'a>(
                &'a self,
                source: Source<'a, Pair>,
                options: &Options,
            ) -> StoreIter<'a, Pair> {
                (**self).put_many(source, options)
            }

            fn get_many<'a>(
                &'a self,
                source: Source<'a, Key>,
                options: &Options,
            ) -> StoreIter<'a, Bytes> {
                (**self).get_many(source, options)
            }

            fn delete_many<'a>(
                &'a self,
                source: Source<'a, Key>,
                options: &Options,
            ) -> StoreIter<'a, Key> {
                (**self).delete_many(source, options)
            }

            fn batch(&self) -> Box<dyn Batch + '_> {
                (**self).batch()
            }

            fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
                (**self).query(query, options)
            }
        }
    };
}

forward_datastore!(Arc<D>);
forward_datastore!(Box<D>);
