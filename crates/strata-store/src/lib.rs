//! The Strata datastore contract.
//!
//! A datastore maps hierarchical [`Key`]s to opaque byte values. Consumers
//! code against the [`Datastore`] trait and swap backends (in-memory, disk,
//! networked) or stack decorators on top of them without changing call
//! sites.
//!
//! # Contract
//!
//! - `put` is an upsert; `get` fails with [`StoreError::NotFound`] for an
//!   absent key; `has` never fails for an absent key; `delete` is idempotent.
//! - `put_many`/`get_many`/`delete_many` consume a lazy source and yield a
//!   lazy sequence of results in input order. They stop at the first
//!   failure: every successful element is yielded, then the error, then the
//!   sequence ends.
//! - [`Batch`] stages writes; `commit` applies all puts, then all deletes.
//!   There is no rollback on partial failure.
//! - `query` runs the [`Query`] pipeline (prefix, filters, orders, offset,
//!   limit, keys-only) over the store's entries.
//! - Every bulk operation accepts [`Options`] carrying an optional
//!   cancellation token, checked between elements.
//!
//! # Backends
//!
//! - [`MemoryDatastore`] -- `HashMap`-based reference store for tests and embedding

pub mod error;
pub mod iter;
pub mod memory;
pub mod options;
pub mod query;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use iter::{Source, StoreIter, StoreIterExt};
pub use memory::MemoryDatastore;
pub use options::Options;
pub use query::{Filter, Order, Query};
pub use traits::{BasicBatch, Batch, Datastore};

pub use bytes::Bytes;
pub use strata_types::{Entry, Key, KeyError, Pair};
pub use tokio_util::sync::CancellationToken;
