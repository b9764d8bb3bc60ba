use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{ShardError, ShardResult};
use crate::shard::{Shard, ShardHealth};

/// The configured shards, split into active and quarantined.
///
/// Shard order is configuration order and never changes; only health
/// moves. Health transitions are serialized by one mutex.
pub struct ShardRegistry {
    shards: Vec<Arc<Shard>>,
    quarantined: Mutex<BTreeSet<usize>>,
}

impl ShardRegistry {
    /// Build a registry. Names must be unique and the list non-empty.
    pub fn new(shards: Vec<Shard>) -> ShardResult<Self> {
        if shards.is_empty() {
            return Err(ShardError::Config("at least one shard is required".into()));
        }
        let mut seen = HashSet::new();
        for shard in &shards {
            if shard.name().is_empty() {
                return Err(ShardError::Config("shard name must not be empty".into()));
            }
            if !seen.insert(shard.name().to_string()) {
                return Err(ShardError::Config(format!(
                    "duplicate shard name: {}",
                    shard.name()
                )));
            }
        }
        Ok(Self {
            shards: shards.into_iter().map(Arc::new).collect(),
            quarantined: Mutex::new(BTreeSet::new()),
        })
    }

    /// Every shard in configuration order, regardless of health.
    pub fn shards(&self) -> &[Arc<Shard>] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Shard>> {
        self.shards.iter().find(|s| s.name() == name)
    }

    /// Active shards in configuration order.
    pub fn active(&self) -> Vec<Arc<Shard>> {
        let quarantined = self.quarantined.lock().expect("lock poisoned");
        self.shards
            .iter()
            .enumerate()
            .filter(|(i, _)| !quarantined.contains(i))
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    /// Quarantined shards in configuration order.
    pub fn quarantined(&self) -> Vec<Arc<Shard>> {
        let quarantined = self.quarantined.lock().expect("lock poisoned");
        quarantined
            .iter()
            .map(|&i| Arc::clone(&self.shards[i]))
            .collect()
    }

    pub fn has_quarantined(&self) -> bool {
        !self.quarantined.lock().expect("lock poisoned").is_empty()
    }

    pub fn health(&self, name: &str) -> Option<ShardHealth> {
        let index = self.index_of(name)?;
        let quarantined = self.quarantined.lock().expect("lock poisoned");
        Some(if quarantined.contains(&index) {
            ShardHealth::Quarantined
        } else {
            ShardHealth::Active
        })
    }

    /// Move `name` to quarantine. Returns `true` if it was active.
    pub fn report_exception(&self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        let moved = self
            .quarantined
            .lock()
            .expect("lock poisoned")
            .insert(index);
        if moved {
            warn!(shard = %name, "shard quarantined");
        }
        moved
    }

    /// Move `name` back to the active set. Returns `true` if it was
    /// quarantined.
    pub fn clear_exception(&self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        let moved = self
            .quarantined
            .lock()
            .expect("lock poisoned")
            .remove(&index);
        if moved {
            info!(shard = %name, "shard back in service");
        }
        moved
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.shards.iter().position(|s| s.name() == name)
    }
}
