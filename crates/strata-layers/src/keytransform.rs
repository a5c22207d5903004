//! A datastore shim that rewrites keys on the way in and out.
//!
//! [`KeyTransformStore`] applies [`KeyTransform::convert`] to every key a
//! caller passes in and [`KeyTransform::invert`] to every key read back
//! from the child's query results, so callers never observe child-internal
//! keys.
//!
//! Queries are forwarded unchanged: prefix, filters, and orders see
//! *child-space* keys. Callers that need caller-space query semantics over
//! a prefix should use [`NamespaceStore`](crate::NamespaceStore).

use bytes::Bytes;
use strata_store::{Batch, Datastore, Options, Query, Source, StoreIter, StoreResult};
use strata_types::{Entry, Key, Pair};

/// A pair of mutually inverse key mappings.
///
/// Implementations must guarantee `invert(convert(k)) == k` for every key
/// and `convert(invert(k)) == k` for every child key they accept through
/// [`Self::contains`]. Breaking this is a bug, not a recoverable error.
pub trait KeyTransform: Send + Sync {
    /// Map a caller key to the key stored in the child.
    fn convert(&self, key: &Key) -> Key;

    /// Map a child key back to the caller key.
    fn invert(&self, key: &Key) -> Key;

    /// Returns `true` if `child_key` is in the image of [`Self::convert`].
    ///
    /// Child keys outside the image are dropped from query results.
    fn contains(&self, _child_key: &Key) -> bool {
        true
    }
}

/// A transform built from two closures.
pub struct FnTransform<C, I> {
    convert: C,
    invert: I,
}

impl<C, I> FnTransform<C, I>
where
    C: Fn(&Key) -> Key + Send + Sync,
    I: Fn(&Key) -> Key + Send + Sync,
{
    pub fn new(convert: C, invert: I) -> Self {
        Self { convert, invert }
    }
}

impl<C, I> KeyTransform for FnTransform<C, I>
where
    C: Fn(&Key) -> Key + Send + Sync,
    I: Fn(&Key) -> Key + Send + Sync,
{
    fn convert(&self, key: &Key) -> Key {
        (self.convert)(key)
    }

    fn invert(&self, key: &Key) -> Key {
        (self.invert)(key)
    }
}

/// Places keys under a fixed prefix: `convert = prefix.child(key)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixTransform {
    prefix: Key,
}

impl PrefixTransform {
    pub fn new(prefix: Key) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> &Key {
        &self.prefix
    }
}

impl KeyTransform for PrefixTransform {
    fn convert(&self, key: &Key) -> Key {
        self.prefix.child(key)
    }

    /// Strip the prefix. Keys outside the prefix come back unchanged.
    fn invert(&self, key: &Key) -> Key {
        key.relative_to(&self.prefix)
            .unwrap_or_else(|| key.clone())
    }

    fn contains(&self, child_key: &Key) -> bool {
        child_key.relative_to(&self.prefix).is_some()
    }
}

/// Wraps a child datastore and rewrites keys through a [`KeyTransform`].
pub struct KeyTransformStore<D, T> {
    child: D,
    transform: T,
}

impl<D: Datastore, T: KeyTransform> KeyTransformStore<D, T> {
    pub fn new(child: D, transform: T) -> Self {
        Self { child, transform }
    }

    pub fn child(&self) -> &D {
        &self.child
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Query the child with `query` as given and map results to caller keys.
    pub(crate) fn query_child<'a>(&'a self, query: &Query, options: &Options) -> StoreIter<'a, Entry> {
        Box::new(
            self.child
                .query(query, options)
                .filter(move |item| match item {
                    Ok(entry) => self.transform.contains(&entry.key),
                    Err(_) => true,
                })
                .map(move |item| {
                    item.map(|entry| {
                        let key = self.transform.invert(&entry.key);
                        entry.with_key(key)
                    })
                }),
        )
    }
}

impl<D: Datastore, T: KeyTransform> Datastore for KeyTransformStore<D, T> {
    fn open(&self) -> StoreResult<()> {
        self.child.open()
    }

    fn close(&self) -> StoreResult<()> {
        self.child.close()
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.child.put(&self.transform.convert(key), value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.child.get(&self.transform.convert(key))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.child.has(&self.transform.convert(key))
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.child.delete(&self.transform.convert(key))
    }

    fn put_many<'a>(&'a self, source: Source<'a, Pair>, options: &Options) -> StoreIter<'a, Pair> {
        let converted = source.map(move |pair| Pair {
            key: self.transform.convert(&pair.key),
            value: pair.value,
        });
        Box::new(
            self.child
                .put_many(Box::new(converted), options)
                .map(move |item| {
                    item.map(|pair| Pair {
                        key: self.transform.invert(&pair.key),
                        value: pair.value,
                    })
                }),
        )
    }

    fn get_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Bytes> {
        let converted = source.map(move |key| self.transform.convert(&key));
        self.child.get_many(Box::new(converted), options)
    }

    fn delete_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Key> {
        let converted = source.map(move |key| self.transform.convert(&key));
        Box::new(
            self.child
                .delete_many(Box::new(converted), options)
                .map(move |item| item.map(|key| self.transform.invert(&key))),
        )
    }

    fn batch(&self) -> Box<dyn Batch + '_> {
        Box::new(TransformBatch {
            inner: self.child.batch(),
            transform: &self.transform,
        })
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        self.query_child(query, options)
    }
}

/// Converts keys as they are staged into the child's batch.
struct TransformBatch<'a, T> {
    inner: Box<dyn Batch + 'a>,
    transform: &'a T,
}

impl<T: KeyTransform> Batch for TransformBatch<'_, T> {
    fn put(&mut self, key: Key, value: Bytes) {
        self.inner.put(self.transform.convert(&key), value);
    }

    fn delete(&mut self, key: Key) {
        self.inner.delete(self.transform.convert(&key));
    }

    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()> {
        self.inner.commit(options)
    }
}

impl<D, T> std::fmt::Debug for KeyTransformStore<D, T>
where
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTransformStore")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}
