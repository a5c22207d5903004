//! Composable datastore decorators.
//!
//! Every type here implements [`Datastore`] and wraps one or more child
//! datastores, so layers nest by ordinary composition: a mount of sharded
//! stores, a sharded tiered store, and so on. The innermost node is always
//! a concrete backend.
//!
//! # Layers
//!
//! - [`KeyTransformStore`] -- rewrites keys through an invertible [`KeyTransform`]
//! - [`NamespaceStore`] -- places every key under a fixed prefix
//! - [`MountStore`] -- routes keys to children by longest matching prefix
//! - [`ShardingStore`] -- buckets keys by a persisted [`ShardFunction`]
//! - [`TieredStore`] -- writes through to every tier, reads from the first that has the key
//!
//! [`LayoutConfig`] builds any of these from a declarative TOML or JSON
//! description.
//!
//! [`Datastore`]: strata_store::Datastore

pub mod config;
pub mod keytransform;
pub mod mount;
pub mod namespace;
pub mod shard;
pub mod sharding;
pub mod tiered;

pub use config::{LayoutConfig, MountConfig, StoreConfig};
pub use keytransform::{FnTransform, KeyTransform, KeyTransformStore, PrefixTransform};
pub use mount::{Mount, MountStore};
pub use namespace::NamespaceStore;
pub use shard::{ShardFunction, MAX_SHARD_PARAM};
pub use sharding::ShardingStore;
pub use tiered::TieredStore;
