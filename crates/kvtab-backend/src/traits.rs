use kvtab_types::FieldMap;

use crate::error::BackendResult;

/// Remaining lifetime of a key, as reported by [`KeyValueBackend::ttl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires in this many seconds.
    Seconds(u64),
}

impl Ttl {
    /// Decode the integer reply of a `TTL` command.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => Ttl::Missing,
            n if n < 0 => Ttl::Persistent,
            n => Ttl::Seconds(n as u64),
        }
    }
}

/// One mutating command inside a batch.
///
/// Every variant answers with an integer, so a batch reply is a `Vec<i64>`
/// in the order the ops were given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HashOp {
    /// `HSET key field value`; replies 1 if the field is new, else 0.
    Set {
        key: String,
        field: String,
        value: String,
    },
    /// `HSETNX key field value`; replies 1 if written, else 0.
    SetIfAbsent {
        key: String,
        field: String,
        value: String,
    },
    /// `HDEL key field...`; replies the number of fields removed.
    Delete { key: String, fields: Vec<String> },
    /// `DEL key...`; replies the number of keys removed.
    DeleteKeys { keys: Vec<String> },
    /// `EXPIREAT key epoch_secs`; replies 1 if the key exists, else 0.
    ExpireAt { key: String, epoch_secs: i64 },
}

impl HashOp {
    pub fn set(key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        HashOp::Set {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn set_if_absent(
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        HashOp::SetIfAbsent {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>, field: impl Into<String>) -> Self {
        HashOp::Delete {
            key: key.into(),
            fields: vec![field.into()],
        }
    }

    pub fn delete_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HashOp::DeleteKeys {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn expire_at(key: impl Into<String>, epoch_secs: i64) -> Self {
        HashOp::ExpireAt {
            key: key.into(),
            epoch_secs,
        }
    }

    /// The key this op touches first. Used for routing.
    pub fn routing_key(&self) -> &str {
        match self {
            HashOp::Set { key, .. }
            | HashOp::SetIfAbsent { key, .. }
            | HashOp::Delete { key, .. }
            | HashOp::ExpireAt { key, .. } => key,
            HashOp::DeleteKeys { keys } => keys.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Command name, for logs and errors.
    pub fn command(&self) -> &'static str {
        match self {
            HashOp::Set { .. } => "HSET",
            HashOp::SetIfAbsent { .. } => "HSETNX",
            HashOp::Delete { .. } => "HDEL",
            HashOp::DeleteKeys { .. } => "DEL",
            HashOp::ExpireAt { .. } => "EXPIREAT",
        }
    }
}

/// A single key-value endpoint holding string hashes.
///
/// Implementations must satisfy these invariants:
/// - A hash with no fields does not exist: removing its last field removes
///   the key.
/// - Every call is one attempt; implementations never retry internally.
/// - [`transaction`](Self::transaction) is all-or-nothing on this endpoint.
pub trait KeyValueBackend: Send + Sync {
    /// Human-readable endpoint description, used in logs.
    fn endpoint(&self) -> &str;

    /// Value of `field` in hash `key`, `Ok(None)` if either is absent.
    fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>>;

    /// Every field of hash `key`. Empty if the key is absent.
    fn hgetall(&self, key: &str) -> BackendResult<FieldMap>;

    /// Overwrite `field`. Returns `true` if the field was new.
    fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<bool>;

    /// Write `field` only if it is absent. Returns `true` if written.
    fn hset_nx(&self, key: &str, field: &str, value: &str) -> BackendResult<bool>;

    /// Remove fields. Returns how many existed.
    fn hdel(&self, key: &str, fields: &[&str]) -> BackendResult<u64>;

    fn hexists(&self, key: &str, field: &str) -> BackendResult<bool>;

    fn exists(&self, key: &str) -> BackendResult<bool>;

    /// Remove whole keys. Returns how many existed.
    fn del(&self, keys: &[&str]) -> BackendResult<u64>;

    /// Expire `key` at an absolute UNIX time. Returns `false` if the key is
    /// absent.
    fn expire_at(&self, key: &str, epoch_secs: i64) -> BackendResult<bool>;

    fn ttl(&self, key: &str) -> BackendResult<Ttl>;

    /// The endpoint's own clock, as UNIX seconds.
    fn server_time(&self) -> BackendResult<i64>;

    /// Liveness check.
    fn ping(&self) -> BackendResult<()>;

    /// Apply `ops` atomically and return one integer reply per op.
    fn transaction(&self, ops: &[HashOp]) -> BackendResult<Vec<i64>>;

    /// Apply a single op as a plain command.
    ///
    /// Default implementation dispatches to the typed primitives.
    fn apply(&self, op: &HashOp) -> BackendResult<i64> {
        match op {
            HashOp::Set { key, field, value } => self.hset(key, field, value).map(i64::from),
            HashOp::SetIfAbsent { key, field, value } => {
                self.hset_nx(key, field, value).map(i64::from)
            }
            HashOp::Delete { key, fields } => {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                self.hdel(key, &fields).map(|n| n as i64)
            }
            HashOp::DeleteKeys { keys } => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                self.del(&keys).map(|n| n as i64)
            }
            HashOp::ExpireAt { key, epoch_secs } => {
                self.expire_at(key, *epoch_secs).map(i64::from)
            }
        }
    }
}
