use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use kvtab_types::FieldMap;

use crate::error::{BackendError, BackendResult};
use crate::traits::{HashOp, KeyValueBackend, Ttl};

#[derive(Default)]
struct Entry {
    fields: FieldMap,
    expires_at: Option<i64>,
}

impl Entry {
    fn expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Counters of the physical calls an [`InMemoryBackend`] has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Plain commands, reads included.
    pub commands: u64,
    /// Transaction batches.
    pub transactions: u64,
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Expiry is applied lazily against a
/// clock that tests can move forward, and the endpoint can be switched off
/// to simulate an outage.
pub struct InMemoryBackend {
    name: String,
    hashes: RwLock<HashMap<String, Entry>>,
    available: AtomicBool,
    clock_offset: AtomicI64,
    commands: AtomicU64,
    transactions: AtomicU64,
}

impl InMemoryBackend {
    /// Create an empty backend reporting `name` as its endpoint.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hashes: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            clock_offset: AtomicI64::new(0),
            commands: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
        }
    }

    /// Switch the endpoint on or off. While off, every call fails with
    /// [`BackendError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Move this endpoint's clock forward.
    pub fn advance_clock(&self, secs: i64) {
        self.clock_offset.fetch_add(secs, Ordering::SeqCst);
    }

    /// Remove a key behind the caller's back, as an external client would.
    pub fn evict(&self, key: &str) -> bool {
        self.hashes
            .write()
            .expect("lock poisoned")
            .remove(key)
            .is_some()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.now();
        self.hashes
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|e| !e.expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of live keys.
    pub fn keys(&self) -> Vec<String> {
        let now = self.now();
        let map = self.hashes.read().expect("lock poisoned");
        let mut keys: Vec<String> = map
            .iter()
            .filter(|(_, e)| !e.expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CallStats {
        CallStats {
            commands: self.commands.load(Ordering::SeqCst),
            transactions: self.transactions.load(Ordering::SeqCst),
        }
    }

    fn now(&self) -> i64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        wall + self.clock_offset.load(Ordering::SeqCst)
    }

    fn begin(&self) -> BackendResult<()> {
        if !self.is_available() {
            return Err(BackendError::Unavailable(self.name.clone()));
        }
        self.commands.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(Option<&Entry>) -> T) -> BackendResult<T> {
        self.begin()?;
        let now = self.now();
        let map = self.hashes.read().expect("lock poisoned");
        Ok(f(map.get(key).filter(|e| !e.expired(now))))
    }

    fn mutate(&self, op: HashOp) -> BackendResult<i64> {
        self.begin()?;
        let now = self.now();
        let mut map = self.hashes.write().expect("lock poisoned");
        Ok(apply_op(&mut map, &op, now))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn purge(map: &mut HashMap<String, Entry>, key: &str, now: i64) {
    if map.get(key).is_some_and(|e| e.expired(now)) {
        map.remove(key);
    }
}

fn apply_op(map: &mut HashMap<String, Entry>, op: &HashOp, now: i64) -> i64 {
    match op {
        HashOp::Set { key, field, value } => {
            purge(map, key, now);
            let entry = map.entry(key.clone()).or_default();
            i64::from(entry.fields.insert(field.clone(), value.clone()).is_none())
        }
        HashOp::SetIfAbsent { key, field, value } => {
            purge(map, key, now);
            let entry = map.entry(key.clone()).or_default();
            if entry.fields.contains_key(field) {
                0
            } else {
                entry.fields.insert(field.clone(), value.clone());
                1
            }
        }
        HashOp::Delete { key, fields } => {
            purge(map, key, now);
            let Some(entry) = map.get_mut(key) else {
                return 0;
            };
            let removed = fields
                .iter()
                .filter(|f| entry.fields.remove(f.as_str()).is_some())
                .count();
            if entry.fields.is_empty() {
                map.remove(key);
            }
            removed as i64
        }
        HashOp::DeleteKeys { keys } => keys
            .iter()
            .filter(|k| {
                purge(map, k, now);
                map.remove(k.as_str()).is_some()
            })
            .count() as i64,
        HashOp::ExpireAt { key, epoch_secs } => {
            purge(map, key, now);
            if *epoch_secs <= now {
                return i64::from(map.remove(key).is_some());
            }
            match map.get_mut(key) {
                Some(entry) => {
                    entry.expires_at = Some(*epoch_secs);
                    1
                }
                None => 0,
            }
        }
    }
}

impl KeyValueBackend for InMemoryBackend {
    fn endpoint(&self) -> &str {
        &self.name
    }

    fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>> {
        self.read(key, |e| e.and_then(|e| e.fields.get(field).cloned()))
    }

    fn hgetall(&self, key: &str) -> BackendResult<FieldMap> {
        self.read(key, |e| e.map(|e| e.fields.clone()).unwrap_or_default())
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<bool> {
        self.mutate(HashOp::set(key, field, value)).map(|n| n == 1)
    }

    fn hset_nx(&self, key: &str, field: &str, value: &str) -> BackendResult<bool> {
        self.mutate(HashOp::set_if_absent(key, field, value))
            .map(|n| n == 1)
    }

    fn hdel(&self, key: &str, fields: &[&str]) -> BackendResult<u64> {
        let op = HashOp::Delete {
            key: key.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        self.mutate(op).map(|n| n as u64)
    }

    fn hexists(&self, key: &str, field: &str) -> BackendResult<bool> {
        self.read(key, |e| e.is_some_and(|e| e.fields.contains_key(field)))
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        self.read(key, |e| e.is_some())
    }

    fn del(&self, keys: &[&str]) -> BackendResult<u64> {
        self.mutate(HashOp::delete_keys(keys.iter().copied()))
            .map(|n| n as u64)
    }

    fn expire_at(&self, key: &str, epoch_secs: i64) -> BackendResult<bool> {
        self.mutate(HashOp::expire_at(key, epoch_secs))
            .map(|n| n == 1)
    }

    fn ttl(&self, key: &str) -> BackendResult<Ttl> {
        let now = self.now();
        self.read(key, |e| match e {
            None => Ttl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ttl::Seconds((at - now).max(0) as u64),
        })
    }

    fn server_time(&self) -> BackendResult<i64> {
        self.begin()?;
        Ok(self.now())
    }

    fn ping(&self) -> BackendResult<()> {
        self.begin()
    }

    fn transaction(&self, ops: &[HashOp]) -> BackendResult<Vec<i64>> {
        if !self.is_available() {
            return Err(BackendError::Unavailable(self.name.clone()));
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let now = self.now();
        let mut map = self.hashes.write().expect("lock poisoned");
        Ok(ops.iter().map(|op| apply_op(&mut map, op, now)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hset_reports_new_fields() {
        let b = InMemoryBackend::default();
        assert!(b.hset("h", "f", "1").unwrap());
        assert!(!b.hset("h", "f", "2").unwrap());
        assert_eq!(b.hget("h", "f").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn hset_nx_keeps_existing_value() {
        let b = InMemoryBackend::default();
        assert!(b.hset_nx("h", "f", "1").unwrap());
        assert!(!b.hset_nx("h", "f", "2").unwrap());
        assert_eq!(b.hget("h", "f").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn removing_last_field_removes_key() {
        let b = InMemoryBackend::default();
        b.hset("h", "a", "1").unwrap();
        b.hset("h", "b", "2").unwrap();
        assert_eq!(b.hdel("h", &["a", "missing"]).unwrap(), 1);
        assert!(b.exists("h").unwrap());
        assert_eq!(b.hdel("h", &["b"]).unwrap(), 1);
        assert!(!b.exists("h").unwrap());
    }

    #[test]
    fn empty_string_field_is_a_real_field() {
        let b = InMemoryBackend::default();
        b.hset_nx("RDBshop", "", "stamp").unwrap();
        assert!(b.exists("RDBshop").unwrap());
        assert!(b.hexists("RDBshop", "").unwrap());
    }

    #[test]
    fn hgetall_missing_is_empty() {
        let b = InMemoryBackend::default();
        assert!(b.hgetall("nope").unwrap().is_empty());
    }

    #[test]
    fn del_counts_existing_keys() {
        let b = InMemoryBackend::default();
        b.hset("a", "f", "1").unwrap();
        b.hset("b", "f", "1").unwrap();
        assert_eq!(b.del(&["a", "b", "c"]).unwrap(), 2);
        assert!(b.is_empty());
    }

    #[test]
    fn expiry_hides_key_after_clock_moves() {
        let b = InMemoryBackend::default();
        b.hset("h", "f", "1").unwrap();
        let now = b.server_time().unwrap();
        assert!(b.expire_at("h", now + 10).unwrap());
        assert!(matches!(b.ttl("h").unwrap(), Ttl::Seconds(s) if s <= 10));
        b.advance_clock(11);
        assert!(!b.exists("h").unwrap());
        assert_eq!(b.ttl("h").unwrap(), Ttl::Missing);
    }

    #[test]
    fn expire_in_the_past_deletes() {
        let b = InMemoryBackend::default();
        b.hset("h", "f", "1").unwrap();
        let now = b.server_time().unwrap();
        assert!(b.expire_at("h", now - 1).unwrap());
        assert!(!b.exists("h").unwrap());
        assert!(!b.expire_at("h", now + 5).unwrap());
    }

    #[test]
    fn ttl_of_persistent_key() {
        let b = InMemoryBackend::default();
        b.hset("h", "f", "1").unwrap();
        assert_eq!(b.ttl("h").unwrap(), Ttl::Persistent);
    }

    #[test]
    fn transaction_replies_in_order() {
        let b = InMemoryBackend::default();
        b.hset("h", "a", "1").unwrap();
        let replies = b
            .transaction(&[
                HashOp::set_if_absent("h", "a", "x"),
                HashOp::set("h", "b", "2"),
                HashOp::delete("h", "a"),
            ])
            .unwrap();
        assert_eq!(replies, vec![0, 1, 1]);
        assert_eq!(b.stats().transactions, 1);
    }

    #[test]
    fn unavailable_rejects_everything() {
        let b = InMemoryBackend::new("down");
        b.hset("h", "f", "1").unwrap();
        b.set_available(false);
        assert!(matches!(b.ping(), Err(BackendError::Unavailable(ref n)) if n == "down"));
        assert!(b.hget("h", "f").is_err());
        assert!(b.transaction(&[HashOp::set("h", "g", "2")]).is_err());
        b.set_available(true);
        assert!(b.ping().is_ok());
        assert!(!b.hexists("h", "g").unwrap());
    }

    #[test]
    fn evict_simulates_external_delete() {
        let b = InMemoryBackend::default();
        b.hset("row", "f", "1").unwrap();
        assert!(b.evict("row"));
        assert!(!b.exists("row").unwrap());
    }

    #[test]
    fn apply_dispatches_to_primitives() {
        let b = InMemoryBackend::default();
        assert_eq!(b.apply(&HashOp::set("h", "f", "1")).unwrap(), 1);
        assert_eq!(b.apply(&HashOp::delete_keys(["h"])).unwrap(), 1);
        assert_eq!(b.stats().transactions, 0);
        assert_eq!(b.stats().commands, 2);
    }
}
