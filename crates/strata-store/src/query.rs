//! Declarative queries and the stage chain that evaluates them.
//!
//! A [`Query`] is a pure descriptor. [`execute`] turns a raw enumeration of
//! entries into the query's result sequence by applying, in this fixed
//! order, only the stages the query specifies:
//!
//! 1. prefix: raw string prefix test on the key's canonical form
//! 2. filters: each predicate in list order (logical AND)
//! 3. orders: each comparator in list order, each a full re-sort
//! 4. offset: skip leading entries
//! 5. limit: cap the number of entries
//! 6. keys-only: drop values
//!
//! Every stage is lazy except the order stage, which materialises
//! everything upstream of it the first time it is polled.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use strata_types::{Entry, Key};

use crate::error::{StoreError, StoreResult};
use crate::iter::{StoreIter, StoreIterExt};
use crate::options::Options;

/// Predicate over an entry; entries for which it returns `false` are dropped.
pub type Filter = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// Total order over entries used to re-sort a result sequence.
pub type Order = Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>;

/// A declarative request over the full key space.
#[derive(Clone, Default)]
pub struct Query {
    /// Keep only entries whose canonical key string starts with this.
    pub prefix: Option<String>,
    /// Predicates applied in order.
    pub filters: Vec<Filter>,
    /// Comparators applied in order, each re-sorting the full sequence.
    pub orders: Vec<Order>,
    /// Number of leading entries to skip.
    pub offset: Option<usize>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
    /// Return keys without values.
    pub keys_only: bool,
}

impl Query {
    /// A query matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn order<F>(mut self, order: F) -> Self
    where
        F: Fn(&Entry, &Entry) -> Ordering + Send + Sync + 'static,
    {
        self.orders.push(Arc::new(order));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Returns `true` if `key` passes the prefix stage.
    pub fn matches_prefix(&self, key: &Key) -> bool {
        self.prefix
            .as_deref()
            .map_or(true, |prefix| key.as_str().starts_with(prefix))
    }

    /// A copy of this query with the prefix replaced and every other stage removed.
    ///
    /// Decorators use this to fetch raw entries from a child before running
    /// the remaining stages themselves.
    pub fn only_prefix(prefix: Option<String>) -> Self {
        Self {
            prefix,
            ..Self::default()
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("prefix", &self.prefix)
            .field("filters", &self.filters.len())
            .field("orders", &self.orders.len())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("keys_only", &self.keys_only)
            .finish()
    }
}

/// Apply `query` to a raw enumeration of entries.
///
/// The cancellation signal in `options` is checked before each element is
/// pulled from `source`. The returned sequence ends right after its first
/// error.
pub fn execute<'a>(
    source: StoreIter<'a, Entry>,
    query: &Query,
    options: &Options,
) -> StoreIter<'a, Entry> {
    let mut it: StoreIter<'a, Entry> = Box::new(source.abortable(options).stop_on_error());

    if let Some(prefix) = query.prefix.clone() {
        it = Box::new(it.filter(move |item| match item {
            Ok(entry) => entry.key.as_str().starts_with(&prefix),
            Err(_) => true,
        }));
    }

    for filter in &query.filters {
        let filter = Arc::clone(filter);
        it = Box::new(it.filter(move |item| match item {
            Ok(entry) => filter(entry),
            Err(_) => true,
        }));
    }

    for order in &query.orders {
        it = Box::new(SortAll::new(it, Arc::clone(order)));
    }

    if let Some(offset) = query.offset {
        it = Box::new(SkipEntries::new(it, offset));
    }

    if let Some(limit) = query.limit {
        it = Box::new(it.take(limit));
    }

    if query.keys_only {
        it = Box::new(it.map(|item| item.map(Entry::into_key_only)));
    }

    it
}

/// Full re-sort of everything upstream, deferred until first polled.
struct SortAll<'a> {
    state: SortState<'a>,
}

enum SortState<'a> {
    Pending(StoreIter<'a, Entry>, Order),
    Draining(std::vec::IntoIter<Entry>),
    Failed(Option<StoreError>),
}

impl<'a> SortAll<'a> {
    fn new(source: StoreIter<'a, Entry>, order: Order) -> Self {
        Self {
            state: SortState::Pending(source, order),
        }
    }
}

impl Iterator for SortAll<'_> {
    type Item = StoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = std::mem::replace(&mut self.state, SortState::Failed(None));
        self.state = match state {
            SortState::Pending(source, order) => {
                match source.collect::<StoreResult<Vec<Entry>>>() {
                    Ok(mut entries) => {
                        entries.sort_by(|a, b| order(a, b));
                        SortState::Draining(entries.into_iter())
                    }
                    Err(e) => SortState::Failed(Some(e)),
                }
            }
            other => other,
        };
        match &mut self.state {
            SortState::Draining(entries) => entries.next().map(Ok),
            SortState::Failed(err) => err.take().map(Err),
            SortState::Pending(..) => None,
        }
    }
}

/// Skip the first `remaining` successful entries; errors always pass.
struct SkipEntries<'a> {
    inner: StoreIter<'a, Entry>,
    remaining: usize,
}

impl<'a> SkipEntries<'a> {
    fn new(inner: StoreIter<'a, Entry>, remaining: usize) -> Self {
        Self { inner, remaining }
    }
}

impl Iterator for SkipEntries<'_> {
    type Item = StoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            if self.remaining > 0 && item.is_ok() {
                self.remaining -= 1;
                continue;
            }
            return Some(item);
        }
    }
}

/// Stock comparators.
pub mod order {
    use std::sync::Arc;

    use strata_types::Entry;

    use super::Order;

    /// Ascending key order.
    pub fn by_key() -> Order {
        Arc::new(|a: &Entry, b: &Entry| a.key.cmp(&b.key))
    }

    /// Descending key order.
    pub fn by_key_desc() -> Order {
        Arc::new(|a: &Entry, b: &Entry| b.key.cmp(&a.key))
    }

    /// Ascending byte order of values; keys-only entries sort first.
    pub fn by_value() -> Order {
        Arc::new(|a: &Entry, b: &Entry| a.value.cmp(&b.value))
    }
}
