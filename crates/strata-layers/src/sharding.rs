//! A datastore that buckets keys by a persisted shard function.

use bytes::Bytes;
use strata_store::{query, Batch, Datastore, Options, Query, StoreError, StoreIter, StoreResult};
use strata_types::{Entry, Key};

use crate::shard::{ShardFunction, MAX_SHARD_PARAM, README, README_KEY, SHARDING_KEY};

/// Stores caller key `k` at `/<shard(leaf of k)>/k` in the child.
///
/// The shard function is written to the child under reserved keys by
/// [`ShardingStore::create`] and read back by [`ShardingStore::open`], so
/// data is always looked up with the function it was written with.
/// Queries run in caller space; the reserved keys never show up in them.
pub struct ShardingStore<D> {
    child: D,
    shard: ShardFunction,
}

impl<D: Datastore> ShardingStore<D> {
    /// Persist `shard` into `child` and wrap it.
    ///
    /// Succeeds if `child` already carries the same function and fails with
    /// [`StoreError::ShardMismatch`] if it carries a different one. A width
    /// above [`MAX_SHARD_PARAM`] fails with
    /// [`StoreError::InvalidShardEncoding`] before anything is written.
    pub fn create(child: D, shard: ShardFunction) -> StoreResult<Self> {
        shard.validate()?;
        match read_marker(&child)? {
            Some(found) => check_match(shard, found)?,
            None => write_marker(&child, shard)?,
        }
        Ok(Self { child, shard })
    }

    /// Wrap a child that was previously sharded.
    ///
    /// Fails with [`StoreError::NotFound`] if the child has no shard marker
    /// and with [`StoreError::InvalidShardEncoding`] if the marker is
    /// malformed.
    pub fn open(child: D) -> StoreResult<Self> {
        match read_marker(&child)? {
            Some(shard) => {
                tracing::debug!(shard = %shard, "opened sharded store");
                Ok(Self { child, shard })
            }
            None => Err(StoreError::NotFound(Key::new(SHARDING_KEY))),
        }
    }

    /// [`Self::open`], falling back to [`Self::create`] when the child has
    /// never been sharded. An existing marker must match `shard`.
    ///
    /// This is exactly what [`Self::create`] does on a marked child.
    pub fn create_or_open(child: D, shard: ShardFunction) -> StoreResult<Self> {
        Self::create(child, shard)
    }

    pub fn shard(&self) -> ShardFunction {
        self.shard
    }

    pub fn child(&self) -> &D {
        &self.child
    }

    /// The child key for `key`.
    fn convert(&self, key: &Key) -> StoreResult<Key> {
        convert(self.shard, key)
    }

    /// The caller key for `child_key`, or `None` if it is not a sharded key.
    fn invert(&self, child_key: &Key) -> Option<Key> {
        if child_key.depth() < 2 {
            return None;
        }
        let key = Key::with_namespaces(child_key.segments().skip(1));
        let bucket = child_key.segments().next()?;
        (bucket == self.shard.apply(key.base_namespace())).then_some(key)
    }
}

fn convert(shard: ShardFunction, key: &Key) -> StoreResult<Key> {
    let bucket = shard.apply(key.base_namespace());
    Ok(Key::try_canonical(&format!("/{bucket}{key}"))?)
}

fn read_marker<D: Datastore>(child: &D) -> StoreResult<Option<ShardFunction>> {
    match child.get(&Key::new(SHARDING_KEY)) {
        Ok(raw) => {
            let encoding = std::str::from_utf8(&raw).map_err(|_| StoreError::InvalidShardEncoding {
                encoding: String::from_utf8_lossy(&raw).into_owned(),
                reason: "not valid UTF-8".to_string(),
            })?;
            ShardFunction::parse(encoding).map(Some)
        }
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_marker<D: Datastore>(child: &D, shard: ShardFunction) -> StoreResult<()> {
    child.put(&Key::new(SHARDING_KEY), Bytes::from(format!("{shard}\n")))?;
    child.put(&Key::new(README_KEY), Bytes::from_static(README.as_bytes()))?;
    tracing::debug!(shard = %shard, "wrote shard marker");
    Ok(())
}

fn check_match(requested: ShardFunction, found: ShardFunction) -> StoreResult<()> {
    if requested == found {
        Ok(())
    } else {
        Err(StoreError::ShardMismatch {
            requested: requested.encoding(),
            found: found.encoding(),
        })
    }
}

impl<D: Datastore> Datastore for ShardingStore<D> {
    fn open(&self) -> StoreResult<()> {
        self.child.open()
    }

    fn close(&self) -> StoreResult<()> {
        self.child.close()
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.child.put(&self.convert(key)?, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        match self.child.get(&self.convert(key)?) {
            Err(StoreError::NotFound(_)) => Err(StoreError::NotFound(key.clone())),
            other => other,
        }
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.child.has(&self.convert(key)?)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.child.delete(&self.convert(key)?)
    }

    fn batch(&self) -> Box<dyn Batch + '_> {
        Box::new(ShardBatch {
            inner: self.child.batch(),
            shard: self.shard,
            failed: None,
        })
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        let raw = self
            .child
            .query(&Query::new(), options)
            .filter_map(move |item| match item {
                Ok(entry) => {
                    let key = self.invert(&entry.key)?;
                    Some(Ok(entry.with_key(key)))
                }
                Err(e) => Some(Err(e)),
            });
        query::execute(Box::new(raw), query, options)
    }
}

/// Converts keys while staging; the first conversion failure is reported
/// by `commit` before anything is written.
struct ShardBatch<'a> {
    inner: Box<dyn Batch + 'a>,
    shard: ShardFunction,
    failed: Option<StoreError>,
}

impl ShardBatch<'_> {
    fn stage(&mut self, key: &Key) -> Option<Key> {
        match convert(self.shard, key) {
            Ok(converted) => Some(converted),
            Err(e) => {
                self.failed.get_or_insert(e);
                None
            }
        }
    }
}

impl Batch for ShardBatch<'_> {
    fn put(&mut self, key: Key, value: Bytes) {
        if let Some(converted) = self.stage(&key) {
            self.inner.put(converted, value);
        }
    }

    fn delete(&mut self, key: Key) {
        if let Some(converted) = self.stage(&key) {
            self.inner.delete(converted);
        }
    }

    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()> {
        match self.failed {
            Some(e) => Err(e),
            None => self.inner.commit(options),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for ShardingStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardingStore")
            .field("shard", &self.shard.encoding())
            .field("child", &self.child)
            .finish()
    }
}
