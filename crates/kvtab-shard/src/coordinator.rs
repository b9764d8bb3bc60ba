use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kvtab_backend::{BackendError, BackendResult, HashOp, KeyValueBackend};
use tracing::{debug, error, info, warn};

use crate::error::{ShardError, ShardResult};
use crate::mode::RunMode;
use crate::probe::RecoveryProbe;
use crate::registry::ShardRegistry;
use crate::ring::HashRing;
use crate::shard::Shard;

/// Routes every physical read and write to the right shard(s).
///
/// - [`RunMode::Distributed`]: the hash ring picks one shard per key. A
///   failure is returned to the caller; quarantine is not used.
/// - [`RunMode::Mirrored`]: writes go to every active shard and reads to
///   the first active one. A failing shard is quarantined and the call
///   carries on with the rest.
///
/// Ops are routed by their first key, so a multi-key
/// [`HashOp::DeleteKeys`] should only name keys that live together.
pub struct Coordinator {
    mode: RunMode,
    registry: Arc<ShardRegistry>,
    ring: HashRing,
    probe: RecoveryProbe,
}

impl Coordinator {
    pub fn new(
        registry: ShardRegistry,
        requested: Option<RunMode>,
        probe_interval: Duration,
    ) -> ShardResult<Self> {
        let mode = RunMode::resolve(requested, registry.len())?;
        let ring = {
            let names: Vec<&str> = registry.shards().iter().map(|s| s.name()).collect();
            HashRing::new(&names)
        };
        let registry = Arc::new(registry);
        let probe = RecoveryProbe::new(Arc::clone(&registry), probe_interval);
        info!(mode = %mode, shards = registry.len(), "coordinator ready");
        Ok(Self {
            mode,
            registry,
            ring,
            probe,
        })
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<ShardRegistry> {
        &self.registry
    }

    pub fn probe(&self) -> &RecoveryProbe {
        &self.probe
    }

    /// Run a read against the shard that serves `key`.
    pub fn read<T>(
        &self,
        key: &str,
        op: &'static str,
        f: impl Fn(&dyn KeyValueBackend) -> BackendResult<T>,
    ) -> ShardResult<T> {
        match self.mode {
            RunMode::Distributed => {
                let shard = self.owner(key, op)?;
                f(shard.backend()).map_err(|source| backend_error(shard, source))
            }
            RunMode::Mirrored => {
                let mut last = None;
                for shard in self.registry.active() {
                    match f(shard.backend()) {
                        Ok(value) => return Ok(value),
                        Err(source) => {
                            error!(shard = %shard.name(), op, error = %source, "read failed");
                            self.quarantine(shard.name());
                            last = Some(backend_error(&shard, source));
                        }
                    }
                }
                Err(last.unwrap_or(ShardError::NoActiveShard { op }))
            }
        }
    }

    /// Apply a batch of mutations and return one reply per op.
    ///
    /// A batch of two or more ops for the same shard runs as one
    /// transaction there; a single op runs as a plain command.
    pub fn write(&self, ops: &[HashOp]) -> ShardResult<Vec<i64>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        match self.mode {
            RunMode::Distributed => self.write_distributed(ops),
            RunMode::Mirrored => self.write_mirrored(ops),
        }
    }

    pub fn write_one(&self, op: HashOp) -> ShardResult<i64> {
        let replies = self.write(std::slice::from_ref(&op))?;
        Ok(replies.first().copied().unwrap_or(0))
    }

    /// Clock of the shard serving `key`, as UNIX seconds.
    pub fn server_time(&self, key: &str) -> ShardResult<i64> {
        self.read(key, "TIME", |b| b.server_time())
    }

    /// Ping every configured shard, quarantined ones included.
    pub fn ping_all(&self) -> Vec<(String, BackendResult<()>)> {
        self.registry
            .shards()
            .iter()
            .map(|s| (s.name().to_string(), s.backend().ping()))
            .collect()
    }

    /// Ping every shard and fold the answers into the registry.
    ///
    /// In mirrored mode an unreachable shard is quarantined and a reachable
    /// quarantined one is put back in service.
    pub fn check_all(&self) -> Vec<(String, BackendResult<()>)> {
        let results = self.ping_all();
        if self.mode == RunMode::Mirrored {
            for (name, result) in &results {
                match result {
                    Ok(()) => {
                        self.registry.clear_exception(name);
                    }
                    Err(e) => {
                        warn!(shard = %name, error = %e, "ping failed");
                        self.quarantine(name);
                    }
                }
            }
        }
        results
    }

    /// Quarantine `name` and make sure the probe is watching it.
    pub fn report_exception(&self, name: &str) -> bool {
        let moved = self.registry.report_exception(name);
        if moved {
            self.probe.ensure_running();
        }
        moved
    }

    pub fn clear_exception(&self, name: &str) -> bool {
        self.registry.clear_exception(name)
    }

    /// One synchronous recovery pass. Returns the promoted shards.
    pub fn probe_now(&self) -> Vec<String> {
        self.probe.probe_now()
    }

    fn quarantine(&self, name: &str) {
        self.registry.report_exception(name);
        self.probe.ensure_running();
    }

    fn owner(&self, key: &str, op: &'static str) -> ShardResult<&Arc<Shard>> {
        self.ring
            .locate(key)
            .and_then(|index| self.registry.shards().get(index))
            .ok_or(ShardError::NoActiveShard { op })
    }

    fn write_distributed(&self, ops: &[HashOp]) -> ShardResult<Vec<i64>> {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (position, op) in ops.iter().enumerate() {
            let index = self
                .ring
                .locate(op.routing_key())
                .ok_or(ShardError::NoActiveShard { op: op.command() })?;
            groups.entry(index).or_default().push(position);
        }

        let mut replies = vec![0; ops.len()];
        for (index, positions) in groups {
            let shard = &self.registry.shards()[index];
            let batch: Vec<HashOp> = positions.iter().map(|&p| ops[p].clone()).collect();
            debug!(shard = %shard.name(), ops = batch.len(), "distributed write");
            let results = submit(shard.backend(), &batch).map_err(|e| backend_error(shard, e))?;
            for (position, reply) in positions.into_iter().zip(results) {
                replies[position] = reply;
            }
        }
        Ok(replies)
    }

    fn write_mirrored(&self, ops: &[HashOp]) -> ShardResult<Vec<i64>> {
        let active = self.registry.active();
        let mut accepted: Option<Vec<i64>> = None;
        let mut last = None;
        for shard in &active {
            match submit(shard.backend(), ops) {
                Ok(replies) => {
                    debug!(shard = %shard.name(), ops = ops.len(), "mirrored write");
                    accepted.get_or_insert(replies);
                }
                Err(source) => {
                    error!(shard = %shard.name(), error = %source, "mirrored write failed");
                    self.quarantine(shard.name());
                    last = Some(backend_error(shard, source));
                }
            }
        }
        match accepted {
            Some(replies) => Ok(replies),
            None => Err(last.unwrap_or(ShardError::NoActiveShard {
                op: ops[0].command(),
            })),
        }
    }
}

fn submit(backend: &dyn KeyValueBackend, ops: &[HashOp]) -> BackendResult<Vec<i64>> {
    match ops {
        [single] => backend.apply(single).map(|n| vec![n]),
        _ => backend.transaction(ops),
    }
}

fn backend_error(shard: &Shard, source: BackendError) -> ShardError {
    ShardError::Backend {
        shard: shard.name().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::DEFAULT_PROBE_INTERVAL;
    use crate::shard::ShardHealth;
    use kvtab_backend::InMemoryBackend;

    fn backends(n: usize) -> Vec<Arc<InMemoryBackend>> {
        (0..n)
            .map(|i| Arc::new(InMemoryBackend::new(format!("s{i}"))))
            .collect()
    }

    fn coordinator(backends: &[Arc<InMemoryBackend>], mode: Option<RunMode>) -> Coordinator {
        let shards = backends
            .iter()
            .map(|b| Shard::unnamed(b.clone() as Arc<dyn KeyValueBackend>))
            .collect();
        Coordinator::new(
            ShardRegistry::new(shards).unwrap(),
            mode,
            DEFAULT_PROBE_INTERVAL,
        )
        .unwrap()
    }

    #[test]
    fn single_shard_with_distributed_is_rejected() {
        let b = backends(1);
        let registry = ShardRegistry::new(vec![Shard::unnamed(b[0].clone())]).unwrap();
        let result = Coordinator::new(registry, Some(RunMode::Distributed), DEFAULT_PROBE_INTERVAL);
        assert!(matches!(result, Err(ShardError::Config(_))));
    }

    #[test]
    fn mode_defaults_follow_shard_count() {
        assert_eq!(coordinator(&backends(1), None).mode(), RunMode::Mirrored);
        assert_eq!(coordinator(&backends(2), None).mode(), RunMode::Distributed);
    }

    #[test]
    fn mirrored_write_reaches_every_shard() {
        let b = backends(3);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        assert_eq!(c.write_one(HashOp::set("k", "f", "v")).unwrap(), 1);
        for backend in &b {
            assert_eq!(backend.hget("k", "f").unwrap().as_deref(), Some("v"));
        }
    }

    #[test]
    fn single_op_is_plain_command_batch_is_transaction() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        c.write(&[HashOp::set("k", "a", "1")]).unwrap();
        assert_eq!(b[0].stats().transactions, 0);

        c.write(&[HashOp::set("k", "b", "2"), HashOp::set("k", "c", "3")])
            .unwrap();
        assert_eq!(b[0].stats().transactions, 1);
        assert_eq!(b[1].stats().transactions, 1);
    }

    #[test]
    fn mirrored_failure_quarantines_and_continues() {
        let b = backends(3);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        b[1].set_available(false);

        let replies = c
            .write(&[HashOp::set("k", "a", "1"), HashOp::set("k", "b", "2")])
            .unwrap();
        assert_eq!(replies, vec![1, 1]);

        assert_eq!(b[0].hget("k", "a").unwrap().as_deref(), Some("1"));
        assert_eq!(b[2].hget("k", "b").unwrap().as_deref(), Some("2"));
        assert_eq!(c.registry().health("s1"), Some(ShardHealth::Quarantined));
        assert!(c.probe().is_running());

        b[1].set_available(true);
        assert_eq!(c.probe_now(), vec!["s1".to_string()]);
        assert_eq!(c.registry().health("s1"), Some(ShardHealth::Active));
        // No backfill: the recovered shard missed the write.
        assert!(!b[1].exists("k").unwrap());
    }

    #[test]
    fn check_all_updates_health() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        b[0].set_available(false);

        let results = c.check_all();
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
        assert_eq!(c.registry().health("s0"), Some(ShardHealth::Quarantined));

        b[0].set_available(true);
        assert!(c.check_all().iter().all(|(_, r)| r.is_ok()));
        assert_eq!(c.registry().health("s0"), Some(ShardHealth::Active));
    }

    #[test]
    fn check_all_leaves_distributed_registry_alone() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Distributed));
        b[1].set_available(false);
        assert!(c.check_all()[1].1.is_err());
        assert!(!c.registry().has_quarantined());
    }

    #[test]
    fn quarantined_shard_is_skipped_by_later_writes() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        c.report_exception("s0");
        c.write_one(HashOp::set("k", "f", "v")).unwrap();
        assert!(!b[0].exists("k").unwrap());
        assert!(b[1].exists("k").unwrap());
    }

    #[test]
    fn mirrored_read_fails_over() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        c.write_one(HashOp::set("k", "f", "v")).unwrap();
        b[0].set_available(false);

        let value = c.read("k", "HGET", |be| be.hget("k", "f")).unwrap();
        assert_eq!(value.as_deref(), Some("v"));
        assert_eq!(c.registry().health("s0"), Some(ShardHealth::Quarantined));
    }

    #[test]
    fn all_shards_down_is_an_error() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        b[0].set_available(false);
        b[1].set_available(false);
        assert!(matches!(
            c.write_one(HashOp::set("k", "f", "v")),
            Err(ShardError::Backend { .. })
        ));
        assert!(matches!(
            c.write_one(HashOp::set("k", "f", "v")),
            Err(ShardError::NoActiveShard { .. })
        ));
    }

    #[test]
    fn distributed_write_lands_on_one_shard() {
        let b = backends(3);
        let c = coordinator(&b, None);
        c.write_one(HashOp::set("orders.1", "f", "v")).unwrap();
        let holders = b.iter().filter(|be| be.exists("orders.1").unwrap()).count();
        assert_eq!(holders, 1);
        let value = c.read("orders.1", "HGET", |be| be.hget("orders.1", "f")).unwrap();
        assert_eq!(value.as_deref(), Some("v"));
    }

    #[test]
    fn distributed_batch_keeps_reply_order() {
        let b = backends(3);
        let c = coordinator(&b, None);
        let ops: Vec<HashOp> = (0..20)
            .map(|i| HashOp::set(format!("key{i}"), "f", "v"))
            .collect();
        assert_eq!(c.write(&ops).unwrap(), vec![1; 20]);
        let again = c.write(&ops).unwrap();
        assert_eq!(again, vec![0; 20]);
    }

    #[test]
    fn distributed_failure_is_returned_without_quarantine() {
        let b = backends(2);
        let c = coordinator(&b, None);
        for backend in &b {
            backend.set_available(false);
        }
        assert!(matches!(
            c.write_one(HashOp::set("k", "f", "v")),
            Err(ShardError::Backend { .. })
        ));
        assert!(!c.registry().has_quarantined());
    }

    #[test]
    fn ping_all_reports_each_shard() {
        let b = backends(2);
        let c = coordinator(&b, Some(RunMode::Mirrored));
        b[1].set_available(false);
        let results = c.ping_all();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }
}
