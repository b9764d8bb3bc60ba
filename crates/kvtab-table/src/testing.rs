use std::sync::Arc;

use kvtab_backend::{BackendError, BackendResult, HashOp, InMemoryBackend, KeyValueBackend, Ttl};
use kvtab_shard::{Coordinator, RunMode, Shard, ShardRegistry, DEFAULT_PROBE_INTERVAL};
use kvtab_types::{FieldMap, FieldValues, KeyMode};

use crate::store::TableStore;

pub fn store(shards: usize, mode: RunMode, key_mode: KeyMode) -> (TableStore, Vec<Arc<InMemoryBackend>>) {
    let backends: Vec<Arc<InMemoryBackend>> = (0..shards)
        .map(|i| Arc::new(InMemoryBackend::new(format!("mem{i}"))))
        .collect();
    let registry = ShardRegistry::new(
        backends
            .iter()
            .map(|b| Shard::unnamed(b.clone() as Arc<dyn KeyValueBackend>))
            .collect(),
    )
    .unwrap();
    let coordinator = Coordinator::new(registry, Some(mode), DEFAULT_PROBE_INTERVAL).unwrap();
    (TableStore::new(coordinator, key_mode), backends)
}

pub fn mirrored(shards: usize) -> (TableStore, Vec<Arc<InMemoryBackend>>) {
    store(shards, RunMode::Mirrored, KeyMode::Structured)
}

pub fn row(pairs: &[(&str, Option<&str>)]) -> FieldValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

/// Backend that serves reads from `inner` and rejects every write.
pub struct ReadOnly(pub Arc<InMemoryBackend>);

impl ReadOnly {
    fn refuse<T>(&self) -> BackendResult<T> {
        Err(BackendError::Command {
            endpoint: self.0.endpoint().to_string(),
            command: "WRITE",
            reason: "read-only replica".into(),
        })
    }
}

impl KeyValueBackend for ReadOnly {
    fn endpoint(&self) -> &str {
        self.0.endpoint()
    }
    fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>> {
        self.0.hget(key, field)
    }
    fn hgetall(&self, key: &str) -> BackendResult<FieldMap> {
        self.0.hgetall(key)
    }
    fn hset(&self, _: &str, _: &str, _: &str) -> BackendResult<bool> {
        self.refuse()
    }
    fn hset_nx(&self, _: &str, _: &str, _: &str) -> BackendResult<bool> {
        self.refuse()
    }
    fn hdel(&self, _: &str, _: &[&str]) -> BackendResult<u64> {
        self.refuse()
    }
    fn hexists(&self, key: &str, field: &str) -> BackendResult<bool> {
        self.0.hexists(key, field)
    }
    fn exists(&self, key: &str) -> BackendResult<bool> {
        self.0.exists(key)
    }
    fn del(&self, _: &[&str]) -> BackendResult<u64> {
        self.refuse()
    }
    fn expire_at(&self, _: &str, _: i64) -> BackendResult<bool> {
        self.refuse()
    }
    fn ttl(&self, key: &str) -> BackendResult<Ttl> {
        self.0.ttl(key)
    }
    fn server_time(&self) -> BackendResult<i64> {
        self.0.server_time()
    }
    fn ping(&self) -> BackendResult<()> {
        self.0.ping()
    }
    fn transaction(&self, _: &[HashOp]) -> BackendResult<Vec<i64>> {
        self.refuse()
    }
}

pub fn read_only_store() -> TableStore {
    let backend = Arc::new(ReadOnly(Arc::new(InMemoryBackend::new("ro"))));
    let registry = ShardRegistry::new(vec![Shard::unnamed(backend)]).unwrap();
    let coordinator = Coordinator::new(registry, None, DEFAULT_PROBE_INTERVAL).unwrap();
    TableStore::new(coordinator, KeyMode::Structured)
}
