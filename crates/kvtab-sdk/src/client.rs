use std::sync::Arc;

use tracing::info;

use kvtab_backend::{BackendResult, KeyValueBackend, RedisBackend};
use kvtab_shard::{Coordinator, RunMode, Shard, ShardHealth, ShardRegistry};
use kvtab_table::TableStore;

use crate::config::StoreConfig;
use crate::error::{SdkError, SdkResult};
use crate::legacy::LegacyApi;

/// An opened kvtab store.
///
/// Owns the shard coordinator (and with it the recovery probe thread); the
/// probe stops when this value is dropped.
pub struct Kvtab {
    store: TableStore,
}

impl Kvtab {
    /// Connect to every shard named in `config`.
    ///
    /// Connections are opened lazily, so an unreachable endpoint surfaces on
    /// first use rather than here. A malformed endpoint fails immediately.
    pub fn open(config: &StoreConfig) -> SdkResult<Self> {
        config.validate()?;
        let options = config.pool_options();
        let backends = config
            .shards
            .iter()
            .map(|shard| {
                RedisBackend::connect(&shard.endpoint, options.clone())
                    .map(|b| Arc::new(b) as Arc<dyn KeyValueBackend>)
            })
            .collect::<BackendResult<Vec<_>>>()?;
        Self::from_backends(config, backends)
    }

    /// Build a store over already constructed backends, one per configured
    /// shard and in the same order. Endpoints in `config` are only used for
    /// naming.
    pub fn from_backends(
        config: &StoreConfig,
        backends: Vec<Arc<dyn KeyValueBackend>>,
    ) -> SdkResult<Self> {
        config.validate()?;
        if backends.len() != config.shards.len() {
            return Err(SdkError::Config(format!(
                "{} shards configured but {} backends given",
                config.shards.len(),
                backends.len()
            )));
        }
        let shards = config
            .shards
            .iter()
            .zip(backends)
            .map(|(cfg, backend)| Shard::new(cfg.resolved_name(), backend))
            .collect();
        let registry = ShardRegistry::new(shards)?;
        let coordinator = Coordinator::new(registry, config.mode, config.probe_interval())?;
        info!(
            mode = %coordinator.mode(),
            key_mode = %config.key_mode,
            shards = config.shards.len(),
            "kvtab store opened"
        );
        Ok(Self {
            store: TableStore::new(coordinator, config.key_mode),
        })
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// The same operations with failures folded into sentinel codes.
    pub fn legacy(&self) -> LegacyApi<'_> {
        LegacyApi::new(&self.store)
    }

    pub fn mode(&self) -> RunMode {
        self.store.coordinator().mode()
    }

    /// Ping every shard, in configuration order.
    ///
    /// In mirrored mode the answers also update shard health: unreachable
    /// shards are quarantined and reachable ones put back in service.
    pub fn ping(&self) -> Vec<(String, BackendResult<()>)> {
        self.store.coordinator().check_all()
    }

    pub fn health(&self, shard: &str) -> Option<ShardHealth> {
        self.store.coordinator().registry().health(shard)
    }
}
