use redis::{Commands, RedisError};
use tracing::debug;

use kvtab_types::FieldMap;

use crate::error::{BackendError, BackendResult};
use crate::pool::{ConnectionPool, PoolOptions, PoolStats};
use crate::traits::{HashOp, KeyValueBackend, Ttl};

/// Backend talking to a Redis-compatible server.
///
/// Every call checks out one pooled connection, issues one command (or one
/// `MULTI`/`EXEC` batch) and returns the connection. A connection that saw
/// an I/O error is discarded rather than reused.
pub struct RedisBackend {
    pool: ConnectionPool,
}

impl RedisBackend {
    pub fn connect(endpoint: &str, options: PoolOptions) -> BackendResult<Self> {
        Ok(Self {
            pool: ConnectionPool::new(endpoint, options)?,
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn with_conn<T>(
        &self,
        command: &'static str,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> BackendResult<T> {
        let mut conn = self.pool.get()?;
        match f(&mut *conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = self.map_error(command, e);
                if err.is_connectivity() {
                    conn.mark_broken();
                }
                Err(err)
            }
        }
    }

    fn map_error(&self, command: &'static str, e: RedisError) -> BackendError {
        let endpoint = self.pool.endpoint().to_string();
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
        {
            BackendError::Connection {
                endpoint,
                reason: e.to_string(),
            }
        } else {
            BackendError::Command {
                endpoint,
                command,
                reason: e.to_string(),
            }
        }
    }
}

fn queue(pipe: &mut redis::Pipeline, op: &HashOp) {
    match op {
        HashOp::Set { key, field, value } => {
            pipe.cmd("HSET").arg(key).arg(field).arg(value);
        }
        HashOp::SetIfAbsent { key, field, value } => {
            pipe.cmd("HSETNX").arg(key).arg(field).arg(value);
        }
        HashOp::Delete { key, fields } => {
            pipe.cmd("HDEL").arg(key).arg(fields);
        }
        HashOp::DeleteKeys { keys } => {
            pipe.cmd("DEL").arg(keys);
        }
        HashOp::ExpireAt { key, epoch_secs } => {
            pipe.cmd("EXPIREAT").arg(key).arg(*epoch_secs);
        }
    }
}

impl KeyValueBackend for RedisBackend {
    fn endpoint(&self) -> &str {
        self.pool.endpoint()
    }

    fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>> {
        self.with_conn("HGET", |c| c.hget(key, field))
    }

    fn hgetall(&self, key: &str) -> BackendResult<FieldMap> {
        self.with_conn("HGETALL", |c| c.hgetall(key))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<bool> {
        self.with_conn("HSET", |c| c.hset::<_, _, _, i64>(key, field, value))
            .map(|n| n == 1)
    }

    fn hset_nx(&self, key: &str, field: &str, value: &str) -> BackendResult<bool> {
        self.with_conn("HSETNX", |c| c.hset_nx(key, field, value))
    }

    fn hdel(&self, key: &str, fields: &[&str]) -> BackendResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.with_conn("HDEL", |c| c.hdel(key, fields))
    }

    fn hexists(&self, key: &str, field: &str) -> BackendResult<bool> {
        self.with_conn("HEXISTS", |c| c.hexists(key, field))
    }

    fn exists(&self, key: &str) -> BackendResult<bool> {
        self.with_conn("EXISTS", |c| c.exists(key))
    }

    fn del(&self, keys: &[&str]) -> BackendResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_conn("DEL", |c| c.del(keys))
    }

    fn expire_at(&self, key: &str, epoch_secs: i64) -> BackendResult<bool> {
        self.with_conn("EXPIREAT", |c| {
            redis::cmd("EXPIREAT").arg(key).arg(epoch_secs).query(c)
        })
    }

    fn ttl(&self, key: &str) -> BackendResult<Ttl> {
        self.with_conn("TTL", |c| redis::cmd("TTL").arg(key).query::<i64>(c))
            .map(Ttl::from_reply)
    }

    fn server_time(&self) -> BackendResult<i64> {
        self.with_conn("TIME", |c| redis::cmd("TIME").query::<(i64, i64)>(c))
            .map(|(secs, _micros)| secs)
    }

    fn ping(&self) -> BackendResult<()> {
        self.with_conn("PING", |c| redis::cmd("PING").query::<String>(c))
            .map(|_| ())
    }

    fn transaction(&self, ops: &[HashOp]) -> BackendResult<Vec<i64>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            queue(&mut pipe, op);
        }
        debug!(endpoint = %self.endpoint(), ops = ops.len(), "MULTI/EXEC");
        self.with_conn("EXEC", |c| pipe.query::<Vec<i64>>(c))
            .map_err(|e| match e {
                BackendError::Command {
                    endpoint, reason, ..
                } => BackendError::Transaction { endpoint, reason },
                other => other,
            })
    }
}
