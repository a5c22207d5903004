//! Write-through-all, read-from-first tiering.

use bytes::Bytes;
use strata_store::{Batch, Datastore, Options, Query, StoreError, StoreIter, StoreResult};
use strata_types::{Entry, Key, Pair};

/// An ordered list of datastores, fastest first.
///
/// Writes go to every tier in order; a failing tier ends the operation
/// and tiers already written keep their data. Reads return the answer of
/// the first tier that has the key. Queries are served by the last tier,
/// which is expected to be the source of truth.
pub struct TieredStore {
    tiers: Vec<Box<dyn Datastore>>,
}

impl TieredStore {
    /// Fails with [`StoreError::Config`] when `tiers` is empty.
    pub fn new(tiers: Vec<Box<dyn Datastore>>) -> StoreResult<Self> {
        if tiers.is_empty() {
            return Err(StoreError::Config("tiered store needs at least one tier".into()));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Box<dyn Datastore>] {
        &self.tiers
    }

    fn last(&self) -> &dyn Datastore {
        // `new` guarantees at least one tier.
        self.tiers[self.tiers.len() - 1].as_ref()
    }

    fn each_tier(&self, op: &str, f: impl Fn(&dyn Datastore) -> StoreResult<()>) -> StoreResult<()> {
        for (tier, store) in self.tiers.iter().enumerate() {
            if let Err(e) = f(store.as_ref()) {
                tracing::warn!(tier, error = %e, "{op} failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run `f` on every tier, even after a failure. Each failure is logged
    /// and the first one is returned.
    fn every_tier(&self, op: &str, f: impl Fn(&dyn Datastore) -> StoreResult<()>) -> StoreResult<()> {
        let mut first = None;
        for (tier, store) in self.tiers.iter().enumerate() {
            if let Err(e) = f(store.as_ref()) {
                tracing::warn!(tier, error = %e, "{op} failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Datastore for TieredStore {
    fn open(&self) -> StoreResult<()> {
        self.every_tier("open", |store| store.open())
    }

    fn close(&self) -> StoreResult<()> {
        self.every_tier("close", |store| store.close())
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        self.each_tier("put", |store| store.put(key, value.clone()))
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        for (tier, store) in self.tiers.iter().enumerate() {
            match store.get(key) {
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(tier, key = %key, "tier miss");
                }
                found => return found,
            }
        }
        Err(StoreError::NotFound(key.clone()))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        for store in &self.tiers {
            if store.has(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.each_tier("delete", |store| store.delete(key))
    }

    fn batch(&self) -> Box<dyn Batch + '_> {
        Box::new(TieredBatch {
            tiers: &self.tiers,
            puts: Vec::new(),
            deletes: Vec::new(),
        })
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        self.last().query(query, options)
    }
}

impl std::fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore")
            .field("tiers", &self.tiers.len())
            .finish()
    }
}

/// Stages once, then commits one child batch per tier.
struct TieredBatch<'a> {
    tiers: &'a [Box<dyn Datastore>],
    puts: Vec<Pair>,
    deletes: Vec<Key>,
}

impl Batch for TieredBatch<'_> {
    fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push(Pair { key, value });
    }

    fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()> {
        for (tier, store) in self.tiers.iter().enumerate() {
            options.check()?;
            let mut batch = store.batch();
            for pair in &self.puts {
                batch.put(pair.key.clone(), pair.value.clone());
            }
            for key in &self.deletes {
                batch.delete(key.clone());
            }
            if let Err(e) = batch.commit(options) {
                tracing::warn!(tier, error = %e, "tier batch commit failed");
                return Err(e);
            }
        }
        Ok(())
    }
}
