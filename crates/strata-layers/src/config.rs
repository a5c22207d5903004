use serde::{Deserialize, Serialize};
use strata_store::{Datastore, MemoryDatastore, StoreError, StoreResult};
use strata_types::Key;

use crate::mount::{Mount, MountStore};
use crate::namespace::NamespaceStore;
use crate::shard::ShardFunction;
use crate::sharding::ShardingStore;
use crate::tiered::TieredStore;

/// Declarative description of a store composition tree.
///
/// ```toml
/// [layout]
/// kind = "mount"
///
/// [[layout.mounts]]
/// prefix = "/blocks"
/// [layout.mounts.store]
/// kind = "sharding"
/// shard = "/repo/flatfs/shard/v1/next-to-last/2"
/// [layout.mounts.store.child]
/// kind = "memory"
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Root node of the tree.
    pub layout: StoreConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            layout: StoreConfig::Memory,
        }
    }
}

impl LayoutConfig {
    /// Parse a layout from TOML.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Parse a layout from JSON.
    pub fn from_json_str(s: &str) -> StoreResult<Self> {
        serde_json::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Instantiate the described stores.
    pub fn build(&self) -> StoreResult<Box<dyn Datastore>> {
        self.layout.build()
    }
}

/// One node of a [`LayoutConfig`] tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StoreConfig {
    /// A fresh [`MemoryDatastore`].
    Memory,
    /// A [`NamespaceStore`] over `child`.
    Namespace { prefix: Key, child: Box<StoreConfig> },
    /// A [`MountStore`] over `mounts`.
    Mount { mounts: Vec<MountConfig> },
    /// A [`ShardingStore`] over `child`, created or opened with `shard`.
    Sharding {
        shard: ShardFunction,
        child: Box<StoreConfig>,
    },
    /// A [`TieredStore`] over `tiers`, fastest first.
    Tiered { tiers: Vec<StoreConfig> },
}

/// A mount entry of [`StoreConfig::Mount`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MountConfig {
    pub prefix: Key,
    pub store: StoreConfig,
}

impl StoreConfig {
    pub fn build(&self) -> StoreResult<Box<dyn Datastore>> {
        let store: Box<dyn Datastore> = match self {
            Self::Memory => Box::new(MemoryDatastore::new()),
            Self::Namespace { prefix, child } => {
                Box::new(NamespaceStore::new(prefix.clone(), child.build()?))
            }
            Self::Mount { mounts } => {
                let built = mounts
                    .iter()
                    .map(|m| -> StoreResult<Mount> {
                        Ok(Mount {
                            prefix: m.prefix.clone(),
                            store: m.store.build()?,
                        })
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                Box::new(MountStore::new(built)?)
            }
            Self::Sharding { shard, child } => {
                Box::new(ShardingStore::create_or_open(child.build()?, *shard)?)
            }
            Self::Tiered { tiers } => {
                let built = tiers
                    .iter()
                    .map(StoreConfig::build)
                    .collect::<StoreResult<Vec<_>>>()?;
                Box::new(TieredStore::new(built)?)
            }
        };
        tracing::debug!(kind = self.kind(), "built store layer");
        Ok(store)
    }

    /// The `kind` tag of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Namespace { .. } => "namespace",
            Self::Mount { .. } => "mount",
            Self::Sharding { .. } => "sharding",
            Self::Tiered { .. } => "tiered",
        }
    }
}
