//! Prefix every key with a fixed namespace.

use bytes::Bytes;
use strata_store::{query, Batch, Datastore, Options, Query, Source, StoreIter, StoreResult};
use strata_types::{Entry, Key, Pair};

use crate::keytransform::{KeyTransformStore, PrefixTransform};

/// Stores every caller key `k` at `prefix.child(k)` in the child.
///
/// Point, bulk and batch operations behave exactly like a
/// [`KeyTransformStore`] with a [`PrefixTransform`]. Queries differ: they
/// run in caller space, so a query for prefix `/z` on a namespace `/abc`
/// sees the child's `/abc/z/...` entries as `/z/...`, and child keys
/// outside the namespace are never returned.
pub struct NamespaceStore<D> {
    inner: KeyTransformStore<D, PrefixTransform>,
}

impl<D: Datastore> NamespaceStore<D> {
    pub fn new(prefix: Key, child: D) -> Self {
        Self {
            inner: KeyTransformStore::new(child, PrefixTransform::new(prefix)),
        }
    }

    pub fn prefix(&self) -> &Key {
        self.inner.transform().prefix()
    }

    pub fn child(&self) -> &D {
        self.inner.child()
    }

    /// The child-space prefix covering every caller key matching `prefix`.
    fn child_prefix(&self, prefix: Option<&str>) -> Option<String> {
        let namespace = self.prefix();
        if namespace.is_root() {
            return prefix.map(str::to_string);
        }
        match prefix {
            Some(p) if p.len() > 1 => Some(format!("{namespace}{p}")),
            _ => Some(namespace.to_string()),
        }
    }
}

impl<D: Datastore> Datastore for NamespaceStore<D> {
    fn open(&self) -> StoreResult<()> {
        self.inner.open()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.inner.put(key, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.inner.get(key)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.inner.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn put_many<'a>(&'a self, source: Source<'a, Pair>, options: &Options) -> StoreIter<'a, Pair> {
        self.inner.put_many(source, options)
    }

    fn get_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Bytes> {
        self.inner.get_many(source, options)
    }

    fn delete_many<'a>(&'a self, source: Source<'a, Key>, options: &Options) -> StoreIter<'a, Key> {
        self.inner.delete_many(source, options)
    }

    fn batch(&self) -> Box<dyn Batch + '_> {
        self.inner.batch()
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        let raw = Query::only_prefix(self.child_prefix(query.prefix.as_deref()));
        query::execute(self.inner.query_child(&raw, options), query, options)
    }
}

impl<D: Datastore + std::fmt::Debug> std::fmt::Debug for NamespaceStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceStore")
            .field("prefix", &self.inner.transform().prefix())
            .field("child", self.inner.child())
            .finish()
    }
}
