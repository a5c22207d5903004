//! The checks run by [`run_all`].
//!
//! Each check takes a freshly set-up store. Keys live under `/a`, `/q` and
//! `/z` so the same suite runs unchanged against a mount router with one
//! child per prefix.

use std::cmp::Ordering;
use std::thread;

use bytes::Bytes;
use strata_store::{CancellationToken, Datastore, Options, Query, StoreError, StoreResult};
use strata_types::{Entry, Key, Pair};

use crate::init_tracing;

/// Run every check, each against a fresh store from `setup`.
pub fn run_all<D, F>(setup: F)
where
    D: Datastore,
    F: Fn() -> D,
{
    init_tracing();
    check(&setup, "put_simple", put_simple);
    check(&setup, "put_parallel", put_parallel);
    check(&setup, "get_simple", get_simple);
    check(&setup, "get_missing", get_missing);
    check(&setup, "delete_simple", delete_simple);
    check(&setup, "delete_parallel", delete_parallel);
    check(&setup, "batch_simple", batch_simple);
    check(&setup, "batch_put_then_delete", batch_put_then_delete);
    check(&setup, "batch_many", batch_many);
    check(&setup, "bulk_round_trip", bulk_round_trip);
    check(&setup, "bulk_stops_at_first_failure", bulk_stops_at_first_failure);
    check(&setup, "query_pipeline", query_pipeline);
    check(&setup, "cancellation", cancellation);
    check(&setup, "cancelled_batch", cancelled_batch);
    check(&setup, "lifecycle", lifecycle);
}

fn check<D, F>(setup: &F, name: &str, run: fn(&D))
where
    D: Datastore,
    F: Fn() -> D,
{
    let store = setup();
    run(&store);
    store
        .close()
        .unwrap_or_else(|e| panic!("{name}: close failed: {e}"));
}

fn bytes(s: impl Into<String>) -> Bytes {
    Bytes::from(s.into())
}

fn collect<T>(it: impl Iterator<Item = StoreResult<T>>) -> Vec<T> {
    it.collect::<StoreResult<Vec<T>>>()
        .unwrap_or_else(|e| panic!("sequence failed: {e}"))
}

// ---------------------------------------------------------------------------
// Point operations
// ---------------------------------------------------------------------------

pub fn put_simple<D: Datastore>(store: &D) {
    store.put(&Key::new("/z/one"), bytes("one")).expect("put");
}

pub fn put_parallel<D: Datastore>(store: &D) {
    let data: Vec<Pair> = (0..100)
        .map(|i| Pair::new(Key::new(format!("/z/key{i}")), bytes(format!("data{i}"))))
        .collect();

    thread::scope(|s| {
        for chunk in data.chunks(25) {
            s.spawn(move || {
                for pair in chunk {
                    store.put(&pair.key, pair.value.clone()).expect("put");
                }
            });
        }
    });

    for pair in &data {
        assert_eq!(store.get(&pair.key).expect("get"), pair.value);
    }
}

pub fn get_simple<D: Datastore>(store: &D) {
    let k = Key::new("/z/one");
    store.put(&k, bytes("hello")).expect("put");
    assert_eq!(store.get(&k).expect("get"), bytes("hello"));
}

pub fn get_missing<D: Datastore>(store: &D) {
    match store.get(&Key::new("/z/does/not/exist")) {
        Err(e) => assert!(e.is_not_found(), "expected NotFound, got {e:?}"),
        Ok(v) => panic!("expected NotFound, got value {v:?}"),
    }
    assert!(!store.has(&Key::new("/z/does/not/exist")).expect("has"));
}

pub fn delete_simple<D: Datastore>(store: &D) {
    let k = Key::new("/z/one");
    store.put(&k, bytes("hello")).expect("put");
    store.get(&k).expect("get");
    store.delete(&k).expect("delete");
    assert!(!store.has(&k).expect("has"));
    store.delete(&k).expect("deleting an absent key");
}

pub fn delete_parallel<D: Datastore>(store: &D) {
    let keys: Vec<Key> = (0..100).map(|i| Key::new(format!("/a/key{i}"))).collect();
    for (i, k) in keys.iter().enumerate() {
        store.put(k, bytes(format!("data{i}"))).expect("put");
    }
    assert!(keys.iter().all(|k| store.has(k).expect("has")));

    thread::scope(|s| {
        for chunk in keys.chunks(25) {
            s.spawn(move || {
                for k in chunk {
                    store.delete(k).expect("delete");
                }
            });
        }
    });

    assert!(keys.iter().all(|k| !store.has(k).expect("has")));
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

pub fn batch_simple<D: Datastore>(store: &D) {
    let mut b = store.batch();
    store.put(&Key::new("/z/old"), bytes("old")).expect("put");

    b.put(Key::new("/a/one"), bytes("1"));
    b.put(Key::new("/q/two"), bytes("2"));
    b.put(Key::new("/q/three"), bytes("3"));
    b.delete(Key::new("/z/old"));
    b.commit(&Options::new()).expect("commit");

    let res: Vec<bool> = ["/a/one", "/q/two", "/q/three", "/z/old"]
        .iter()
        .map(|k| store.has(&Key::new(k)).expect("has"))
        .collect();
    assert_eq!(res, vec![true, true, true, false]);
}

pub fn batch_put_then_delete<D: Datastore>(store: &D) {
    let k = Key::new("/q/transient");
    let mut b = store.batch();
    b.put(k.clone(), bytes("x"));
    b.delete(k.clone());
    b.commit(&Options::new()).expect("commit");
    assert!(!store.has(&k).expect("has"));
}

pub fn batch_many<D: Datastore>(store: &D) {
    let count = 400;
    let mut b = store.batch();
    for i in 0..count {
        b.put(Key::new(format!("/a/hello{i}")), Bytes::from(vec![i as u8; 32]));
        b.put(Key::new(format!("/q/hello{i}")), Bytes::from(vec![i as u8; 64]));
        b.put(Key::new(format!("/z/hello{i}")), Bytes::from(vec![i as u8; 128]));
    }
    b.commit(&Options::new()).expect("commit");

    for prefix in ["/a", "/z", "/q"] {
        let total = collect(store.query(&Query::new().prefix(prefix), &Options::new())).len();
        assert_eq!(total, count, "entries under {prefix}");
    }
}

// ---------------------------------------------------------------------------
// Bulk operations
// ---------------------------------------------------------------------------

pub fn bulk_round_trip<D: Datastore>(store: &D) {
    let pairs: Vec<Pair> = (0..10)
        .map(|i| Pair::new(Key::new(format!("/q/bulk{i}")), bytes(format!("v{i}"))))
        .collect();
    let keys: Vec<Key> = pairs.iter().map(|p| p.key.clone()).collect();

    let written = collect(store.put_many(Box::new(pairs.clone().into_iter()), &Options::new()));
    assert_eq!(written, pairs);

    let values = collect(store.get_many(Box::new(keys.clone().into_iter()), &Options::new()));
    let expected: Vec<Bytes> = pairs.iter().map(|p| p.value.clone()).collect();
    assert_eq!(values, expected);

    let deleted = collect(store.delete_many(Box::new(keys.clone().into_iter()), &Options::new()));
    assert_eq!(deleted, keys);
    assert!(keys.iter().all(|k| !store.has(k).expect("has")));
}

pub fn bulk_stops_at_first_failure<D: Datastore>(store: &D) {
    store.put(&Key::new("/a/first"), bytes("1")).expect("put");
    store.put(&Key::new("/a/third"), bytes("3")).expect("put");

    let source = vec![Key::new("/a/first"), Key::new("/a/second"), Key::new("/a/third")];
    let out: Vec<StoreResult<Bytes>> = store
        .get_many(Box::new(source.into_iter()), &Options::new())
        .collect();

    assert_eq!(out.len(), 2, "sequence must end after the failure");
    assert_eq!(out[0].as_ref().expect("first value"), &bytes("1"));
    match &out[1] {
        Err(e) => assert!(e.is_not_found(), "expected NotFound, got {e:?}"),
        Ok(v) => panic!("expected NotFound, got {v:?}"),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn query_fixture() -> [Entry; 3] {
    [
        Entry::new(Key::new("/q/1hello"), "1"),
        Entry::new(Key::new("/z/2world"), "2"),
        Entry::new(Key::new("/z/3hello2"), "3"),
    ]
}

fn sorted_by_key(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

pub fn query_pipeline<D: Datastore>(store: &D) {
    let [hello, world, hello2] = query_fixture();
    let mut b = store.batch();
    for e in [&hello, &world, &hello2] {
        b.put(e.key.clone(), e.value.clone().unwrap_or_default());
    }
    b.commit(&Options::new()).expect("commit");

    let run = |q: Query| collect(store.query(&q, &Options::new()));
    let not_hello = |e: &Entry| !e.key.as_str().ends_with("hello");
    let by_value = |a: &Entry, b: &Entry| a.value.cmp(&b.value);
    let by_value_desc = |a: &Entry, b: &Entry| -> Ordering { b.value.cmp(&a.value) };

    let unordered: Vec<(&str, Query, Vec<Entry>)> = vec![
        ("empty", Query::new(), vec![hello.clone(), world.clone(), hello2.clone()]),
        ("prefix", Query::new().prefix("/z"), vec![world.clone(), hello2.clone()]),
        ("1 filter", Query::new().filter(not_hello), vec![world.clone(), hello2.clone()]),
        (
            "2 filters",
            Query::new()
                .filter(not_hello)
                .filter(|e| e.key.as_str().ends_with("hello2")),
            vec![hello2.clone()],
        ),
        (
            "keys only",
            Query::new().keys_only(),
            vec![
                Entry::key_only(hello.key.clone()),
                Entry::key_only(world.key.clone()),
                Entry::key_only(hello2.key.clone()),
            ],
        ),
    ];
    for (name, q, expected) in unordered {
        assert_eq!(sorted_by_key(run(q)), sorted_by_key(expected), "query {name}");
    }

    assert_eq!(run(Query::new().limit(1)).len(), 1, "query limit");
    assert_eq!(run(Query::new().offset(1)).len(), 2, "query offset");

    assert_eq!(
        run(Query::new().order(by_value)),
        vec![hello.clone(), world.clone(), hello2.clone()],
        "query order"
    );
    assert_eq!(
        run(Query::new().order(by_value_desc)),
        vec![hello2, world, hello],
        "query reverse order"
    );
}

// ---------------------------------------------------------------------------
// Cancellation and lifecycle
// ---------------------------------------------------------------------------

pub fn cancellation<D: Datastore>(store: &D) {
    let token = CancellationToken::new();
    token.cancel();
    let options = Options::with_signal(token);

    store.put(&Key::new("/z/present"), bytes("x")).expect("put");

    let out: Vec<StoreResult<Entry>> = store.query(&Query::new(), &options).collect();
    assert!(
        matches!(out.as_slice(), [Err(StoreError::Aborted)]),
        "cancelled query must yield only Aborted, got {out:?}"
    );

    let source = vec![Pair::new(Key::new("/z/never"), bytes("x"))];
    let out: Vec<StoreResult<Pair>> = store.put_many(Box::new(source.into_iter()), &options).collect();
    assert!(matches!(out.as_slice(), [Err(StoreError::Aborted)]), "got {out:?}");
    assert!(!store.has(&Key::new("/z/never")).expect("has"));
}

pub fn cancelled_batch<D: Datastore>(store: &D) {
    let token = CancellationToken::new();
    token.cancel();

    store.put(&Key::new("/q/kept"), bytes("v")).expect("put");
    let mut b = store.batch();
    b.put(Key::new("/a/never"), bytes("x"));
    b.put(Key::new("/z/never"), bytes("x"));
    b.delete(Key::new("/q/kept"));

    match b.commit(&Options::with_signal(token)) {
        Err(e) => assert!(e.is_aborted(), "expected Aborted, got {e:?}"),
        Ok(()) => panic!("cancelled commit succeeded"),
    }
    assert!(!store.has(&Key::new("/a/never")).expect("has"));
    assert!(!store.has(&Key::new("/z/never")).expect("has"));
    assert!(store.has(&Key::new("/q/kept")).expect("has"));
}

pub fn lifecycle<D: Datastore>(store: &D) {
    store.put(&Key::new("/a/kept"), bytes("v")).expect("put");
    store.close().expect("close");
    store.open().expect("open");
    store.close().expect("close");
    store.open().expect("open");
    assert_eq!(store.get(&Key::new("/a/kept")).expect("get after reopen"), bytes("v"));
}
