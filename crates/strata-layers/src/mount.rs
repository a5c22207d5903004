//! Prefix-based routing across several child datastores.

use std::collections::HashSet;

use bytes::Bytes;
use strata_store::{query, Batch, Datastore, Options, Query, StoreError, StoreIter, StoreResult};
use strata_types::{Entry, Key, Pair};

/// A child datastore mounted at a key prefix.
pub struct Mount {
    pub prefix: Key,
    pub store: Box<dyn Datastore>,
}

impl Mount {
    pub fn new<D: Datastore + 'static>(prefix: Key, store: D) -> Self {
        Self {
            prefix,
            store: Box::new(store),
        }
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Routes each key to the mount with the longest prefix covering it.
///
/// The mount prefix is stripped before a key reaches the child: with a
/// mount at `/a`, the caller key `/a/b` is stored as `/b`. Keys that no
/// mount covers make `put`, `get` and `delete` fail with
/// [`StoreError::NoCoveringMount`]; `has` reports them as absent.
///
/// Queries fan out to every mount whose keys can match the query prefix,
/// merge the child streams, and only then apply filters, orders, offset
/// and limit.
pub struct MountStore {
    /// Sorted by descending prefix length; ties keep insertion order.
    mounts: Vec<Mount>,
}

impl MountStore {
    /// Build a router. Fails with [`StoreError::DuplicateMount`] if two
    /// mounts share a prefix.
    pub fn new(mut mounts: Vec<Mount>) -> StoreResult<Self> {
        let mut seen = HashSet::new();
        for mount in &mounts {
            if !seen.insert(mount.prefix.clone()) {
                return Err(StoreError::DuplicateMount(mount.prefix.clone()));
            }
        }
        mounts.sort_by(|a, b| b.prefix.as_str().len().cmp(&a.prefix.as_str().len()));

        tracing::debug!(
            mounts = ?mounts.iter().map(|m| m.prefix.as_str()).collect::<Vec<_>>(),
            "mount table built"
        );
        Ok(Self { mounts })
    }

    /// Mounts in routing order.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Index of the covering mount and the key relative to its prefix.
    fn lookup(&self, key: &Key) -> Option<(usize, Key)> {
        self.mounts
            .iter()
            .enumerate()
            .find_map(|(idx, mount)| key.relative_to(&mount.prefix).map(|rest| (idx, rest)))
    }

    fn route(&self, key: &Key) -> StoreResult<(&Mount, Key)> {
        match self.lookup(key) {
            Some((idx, rest)) => {
                let mount = &self.mounts[idx];
                tracing::debug!(key = %key, mount = %mount.prefix, "resolved mount");
                Ok((mount, rest))
            }
            None => {
                tracing::debug!(key = %key, "no mount covers key");
                Err(StoreError::NoCoveringMount(key.clone()))
            }
        }
    }

    /// Run `f` on every mount, even after a failure. Each failure is
    /// logged and the first one is returned.
    fn for_each_mount(&self, op: &str, f: impl Fn(&dyn Datastore) -> StoreResult<()>) -> StoreResult<()> {
        let mut first = None;
        for mount in &self.mounts {
            if let Err(e) = f(mount.store.as_ref()) {
                tracing::warn!(mount = %mount.prefix, error = %e, "{op} failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

/// The prefix to send to a child mounted at `mount`, or `None` if no key
/// under `mount` can match the caller's `prefix`.
fn child_prefix(mount: &Key, prefix: Option<&str>) -> Option<Option<String>> {
    let Some(prefix) = prefix else {
        return Some(None);
    };
    if mount.is_root() {
        return Some(Some(prefix.to_string()));
    }
    let mount = mount.as_str();
    if let Some(rest) = prefix.strip_prefix(mount) {
        if rest.is_empty() {
            Some(None)
        } else if rest.starts_with('/') {
            Some(Some(rest.to_string()))
        } else {
            None
        }
    } else if mount.starts_with(prefix) {
        Some(None)
    } else {
        None
    }
}

impl Datastore for MountStore {
    fn open(&self) -> StoreResult<()> {
        self.for_each_mount("open", |store| store.open())
    }

    fn close(&self) -> StoreResult<()> {
        self.for_each_mount("close", |store| store.close())
    }

    fn put(&self, key: &Key, value: Bytes) -> StoreResult<()> {
        let (mount, rest) = self.route(key)?;
        mount.store.put(&rest, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        let (mount, rest) = self.route(key)?;
        mount.store.get(&rest)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        match self.lookup(key) {
            Some((idx, rest)) => self.mounts[idx].store.has(&rest),
            None => Ok(false),
        }
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let (mount, rest) = self.route(key)?;
        mount.store.delete(&rest)
    }

    fn batch(&self) -> Box<dyn Batch + '_> {
        Box::new(MountBatch {
            router: self,
            puts: Vec::new(),
            deletes: Vec::new(),
        })
    }

    fn query(&self, query: &Query, options: &Options) -> StoreIter<'_, Entry> {
        let plan: Vec<(usize, Option<String>)> = self
            .mounts
            .iter()
            .enumerate()
            .filter_map(|(idx, mount)| {
                child_prefix(&mount.prefix, query.prefix.as_deref()).map(|p| (idx, p))
            })
            .collect();
        tracing::debug!(prefix = ?query.prefix, children = plan.len(), "mount query fan-out");

        let child_options = options.clone();
        let merged = plan.into_iter().flat_map(move |(idx, prefix)| {
            let mount = &self.mounts[idx];
            mount
                .store
                .query(&Query::only_prefix(prefix), &child_options)
                .map(move |item| {
                    if let Err(e) = &item {
                        tracing::warn!(mount = %mount.prefix, error = %e, "child query failed");
                    }
                    item.map(|entry| {
                        let key = mount.prefix.child(&entry.key);
                        entry.with_key(key)
                    })
                })
                // A longer mount shadows keys a shorter one holds under it.
                .filter(move |item| match item {
                    Ok(entry) => self.lookup(&entry.key).map(|(owner, _)| owner) == Some(idx),
                    Err(_) => true,
                })
        });

        query::execute(Box::new(merged), query, options)
    }
}

impl std::fmt::Debug for MountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountStore")
            .field("mounts", &self.mounts)
            .finish()
    }
}

/// Stages raw caller keys and splits them per mount at commit.
struct MountBatch<'a> {
    router: &'a MountStore,
    puts: Vec<Pair>,
    deletes: Vec<Key>,
}

impl Batch for MountBatch<'_> {
    fn put(&mut self, key: Key, value: Bytes) {
        self.puts.push(Pair { key, value });
    }

    fn delete(&mut self, key: Key) {
        self.deletes.push(key);
    }

    /// Every key is resolved before any child batch is committed, so an
    /// uncovered key fails the commit without writing anything.
    fn commit(self: Box<Self>, options: &Options) -> StoreResult<()> {
        let MountBatch {
            router,
            puts,
            deletes,
        } = *self;

        let mut per_mount: Vec<(Vec<Pair>, Vec<Key>)> =
            router.mounts.iter().map(|_| (Vec::new(), Vec::new())).collect();
        for pair in puts {
            let (idx, rest) = router
                .lookup(&pair.key)
                .ok_or_else(|| StoreError::NoCoveringMount(pair.key.clone()))?;
            per_mount[idx].0.push(Pair::new(rest, pair.value));
        }
        for key in deletes {
            let (idx, rest) = router
                .lookup(&key)
                .ok_or_else(|| StoreError::NoCoveringMount(key.clone()))?;
            per_mount[idx].1.push(rest);
        }

        for (mount, (puts, deletes)) in router.mounts.iter().zip(per_mount) {
            if puts.is_empty() && deletes.is_empty() {
                continue;
            }
            options.check()?;
            let mut batch = mount.store.batch();
            for pair in puts {
                batch.put(pair.key, pair.value);
            }
            for key in deletes {
                batch.delete(key);
            }
            if let Err(e) = batch.commit(options) {
                tracing::warn!(mount = %mount.prefix, error = %e, "mount batch commit failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use strata_conformance::FaultyDatastore;
    use strata_store::{CancellationToken, MemoryDatastore};

    fn three_mounts() -> (Vec<Arc<MemoryDatastore>>, MountStore) {
        let children: Vec<Arc<MemoryDatastore>> =
            (0..3).map(|_| Arc::new(MemoryDatastore::new())).collect();
        let store = MountStore::new(vec![
            Mount::new(Key::new("/a"), Arc::clone(&children[0])),
            Mount::new(Key::new("/z"), Arc::clone(&children[1])),
            Mount::new(Key::new("/q"), Arc::clone(&children[2])),
        ])
        .unwrap();
        (children, store)
    }

    fn keys_of(it: StoreIter<'_, Entry>) -> Vec<Key> {
        it.map(|item| item.map(|e| e.key))
            .collect::<StoreResult<_>>()
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_prefix_is_rejected() {
        let err = MountStore::new(vec![
            Mount::new(Key::new("/a"), MemoryDatastore::new()),
            Mount::new(Key::new("/a"), MemoryDatastore::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMount(k) if k == Key::new("/a")));
    }

    #[test]
    fn mounts_sorted_longest_first() {
        let store = MountStore::new(vec![
            Mount::new(Key::new("/a"), MemoryDatastore::new()),
            Mount::new(Key::new("/a/b/c"), MemoryDatastore::new()),
            Mount::new(Key::new("/a/b"), MemoryDatastore::new()),
        ])
        .unwrap();
        let prefixes: Vec<&str> = store.mounts().iter().map(|m| m.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["/a/b/c", "/a/b", "/a"]);
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[test]
    fn no_mounts_means_no_coverage() {
        let store = MountStore::new(Vec::new()).unwrap();
        let key = Key::new("/foo");

        assert!(matches!(store.put(&key, Bytes::from_static(b"x")), Err(StoreError::NoCoveringMount(_))));
        assert!(matches!(store.get(&key), Err(StoreError::NoCoveringMount(_))));
        assert!(matches!(store.delete(&key), Err(StoreError::NoCoveringMount(_))));
        assert!(!store.has(&key).unwrap());
    }

    #[test]
    fn wrong_mount_does_not_cover() {
        let store = MountStore::new(vec![Mount::new(Key::new("/cool"), MemoryDatastore::new())]).unwrap();
        let err = store.put(&Key::new("/fail/hello"), Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, StoreError::NoCoveringMount(k) if k == Key::new("/fail/hello")));
        assert!(!store.has(&Key::new("/coolish")).unwrap());
    }

    #[test]
    fn keys_are_stripped_before_reaching_the_child() {
        let (children, store) = three_mounts();
        store.put(&Key::new("/a/hello"), Bytes::from_static(b"1")).unwrap();
        store.put(&Key::new("/z/deep/key"), Bytes::from_static(b"2")).unwrap();

        assert!(children[0].has(&Key::new("/hello")).unwrap());
        assert!(children[1].has(&Key::new("/deep/key")).unwrap());
        assert!(children[2].is_empty());

        assert_eq!(store.get(&Key::new("/a/hello")).unwrap(), Bytes::from_static(b"1"));
        assert!(store.has(&Key::new("/z/deep/key")).unwrap());

        store.delete(&Key::new("/a/hello")).unwrap();
        assert!(children[0].is_empty());
    }

    #[test]
    fn longest_prefix_wins() {
        let outer = Arc::new(MemoryDatastore::new());
        let inner = Arc::new(MemoryDatastore::new());
        let store = MountStore::new(vec![
            Mount::new(Key::root(), Arc::clone(&outer)),
            Mount::new(Key::new("/inner"), Arc::clone(&inner)),
        ])
        .unwrap();

        store.put(&Key::new("/inner/x"), Bytes::from_static(b"1")).unwrap();
        store.put(&Key::new("/other/y"), Bytes::from_static(b"2")).unwrap();

        assert!(inner.has(&Key::new("/x")).unwrap());
        assert!(outer.has(&Key::new("/other/y")).unwrap());
        assert!(!outer.has(&Key::new("/inner/x")).unwrap());
    }

    #[test]
    fn child_errors_are_not_recoded() {
        let (_children, store) = three_mounts();
        match store.get(&Key::new("/a/missing")) {
            Err(StoreError::NotFound(key)) => assert_eq!(key, Key::new("/missing")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn query_merges_before_limit_and_order() {
        let (_children, store) = three_mounts();
        for k in ["/a/3", "/z/1", "/q/2", "/a/4"] {
            store.put(&Key::new(k), Bytes::from(k.to_string())).unwrap();
        }

        let q = Query::new().order(|a, b| a.key.name().cmp(b.key.name())).limit(2);
        assert_eq!(keys_of(store.query(&q, &Options::new())), vec![Key::new("/z/1"), Key::new("/q/2")]);

        let q = Query::new().offset(3);
        assert_eq!(store.query(&q, &Options::new()).count(), 1);
    }

    #[test]
    fn query_prefix_selects_mounts() {
        let (_children, store) = three_mounts();
        for k in ["/a/x", "/a/y/1", "/z/x"] {
            store.put(&Key::new(k), Bytes::from_static(b"v")).unwrap();
        }

        let mut keys = keys_of(store.query(&Query::new().prefix("/a"), &Options::new()));
        keys.sort();
        assert_eq!(keys, vec![Key::new("/a/x"), Key::new("/a/y/1")]);

        assert_eq!(keys_of(store.query(&Query::new().prefix("/a/y"), &Options::new())), vec![Key::new("/a/y/1")]);
        assert!(keys_of(store.query(&Query::new().prefix("/b"), &Options::new())).is_empty());
    }

    #[test]
    fn query_hides_shadowed_keys() {
        let outer = Arc::new(MemoryDatastore::new());
        let store = MountStore::new(vec![
            Mount::new(Key::root(), Arc::clone(&outer)),
            Mount::new(Key::new("/inner"), MemoryDatastore::new()),
        ])
        .unwrap();
        outer.put(&Key::new("/inner/stale"), Bytes::from_static(b"old")).unwrap();
        store.put(&Key::new("/inner/fresh"), Bytes::from_static(b"new")).unwrap();

        assert_eq!(keys_of(store.query(&Query::new(), &Options::new())), vec![Key::new("/inner/fresh")]);
    }

    #[test]
    fn query_reports_child_failure_unchanged() {
        let (children, store) = three_mounts();
        store.put(&Key::new("/a/x"), Bytes::from_static(b"v")).unwrap();
        children[1].close().unwrap();

        let out: StoreResult<Vec<Entry>> = store.query(&Query::new(), &Options::new()).collect();
        assert!(matches!(out, Err(StoreError::Closed)), "got {out:?}");
    }

    #[test]
    fn child_prefix_plans() {
        let a = Key::new("/a");
        assert_eq!(child_prefix(&a, None), Some(None));
        assert_eq!(child_prefix(&a, Some("/a")), Some(None));
        assert_eq!(child_prefix(&a, Some("/a/b")), Some(Some("/b".to_string())));
        assert_eq!(child_prefix(&a, Some("/ab")), None);
        assert_eq!(child_prefix(&a, Some("/")), Some(None));
        assert_eq!(child_prefix(&a, Some("/b")), None);
        assert_eq!(child_prefix(&Key::root(), Some("/x")), Some(Some("/x".to_string())));
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    #[test]
    fn batch_is_split_per_mount() {
        let (children, store) = three_mounts();
        store.put(&Key::new("/z/old"), Bytes::from_static(b"old")).unwrap();

        let mut batch = store.batch();
        batch.put(Key::new("/a/one"), Bytes::from_static(b"1"));
        batch.put(Key::new("/q/two"), Bytes::from_static(b"2"));
        batch.delete(Key::new("/z/old"));
        batch.commit(&Options::new()).unwrap();

        assert!(children[0].has(&Key::new("/one")).unwrap());
        assert!(children[2].has(&Key::new("/two")).unwrap());
        assert!(children[1].is_empty());
    }

    #[test]
    fn uncovered_batch_key_fails_at_commit_without_writes() {
        let (children, store) = three_mounts();
        let mut batch = store.batch();
        batch.put(Key::new("/a/one"), Bytes::from_static(b"1"));
        batch.put(Key::new("/nowhere/two"), Bytes::from_static(b"2"));

        let err = batch.commit(&Options::new()).unwrap_err();
        assert!(matches!(err, StoreError::NoCoveringMount(k) if k == Key::new("/nowhere/two")));
        assert!(children[0].is_empty());
    }

    #[test]
    fn cancelled_batch_commits_no_mount() {
        let (children, store) = three_mounts();
        let token = CancellationToken::new();
        token.cancel();

        let mut batch = store.batch();
        batch.put(Key::new("/a/one"), Bytes::from_static(b"1"));
        batch.put(Key::new("/q/two"), Bytes::from_static(b"2"));
        let err = batch.commit(&Options::with_signal(token)).unwrap_err();

        assert!(err.is_aborted());
        assert!(children.iter().all(|c| c.is_empty()));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn close_reaches_every_mount_past_a_failure() {
        let children: Vec<Arc<FaultyDatastore>> = (0..3).map(|_| Arc::new(FaultyDatastore::new())).collect();
        let store = MountStore::new(vec![
            Mount::new(Key::new("/a"), Arc::clone(&children[0])),
            Mount::new(Key::new("/z"), Arc::clone(&children[1])),
            Mount::new(Key::new("/q"), Arc::clone(&children[2])),
        ])
        .unwrap();
        children[0].fail_closes(true);

        assert!(matches!(store.close(), Err(StoreError::WriteFailed(_))));
        assert!(children[0].inner().is_open());
        assert!(!children[1].inner().is_open());
        assert!(!children[2].inner().is_open());
    }

    #[test]
    fn open_reports_the_first_failure_and_opens_the_rest() {
        let children: Vec<Arc<FaultyDatastore>> = (0..2).map(|_| Arc::new(FaultyDatastore::new())).collect();
        let store = MountStore::new(vec![
            Mount::new(Key::new("/a"), Arc::clone(&children[0])),
            Mount::new(Key::new("/z"), Arc::clone(&children[1])),
        ])
        .unwrap();
        store.close().unwrap();
        children[0].fail_opens(true);

        assert!(matches!(store.open(), Err(StoreError::OpenFailed(_))));
        assert!(!children[0].inner().is_open());
        assert!(children[1].inner().is_open());
    }

    // -----------------------------------------------------------------------
    // Conformance
    // -----------------------------------------------------------------------

    #[test]
    fn conforms_with_three_mounts() {
        strata_conformance::run_all(|| {
            MountStore::new(vec![
                Mount::new(Key::new("/a"), MemoryDatastore::new()),
                Mount::new(Key::new("/z"), MemoryDatastore::new()),
                Mount::new(Key::new("/q"), MemoryDatastore::new()),
            ])
            .unwrap()
        });
    }

    #[test]
    fn conforms_with_root_mount() {
        strata_conformance::run_all(|| {
            MountStore::new(vec![Mount::new(Key::root(), MemoryDatastore::new())]).unwrap()
        });
    }
}
