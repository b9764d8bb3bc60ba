use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use redis::ConnectionLike;
use tracing::debug;

use crate::error::{BackendError, BackendResult};

/// Sizing and timeout knobs for a [`ConnectionPool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolOptions {
    /// Connections kept open between calls. Extra connections are closed on
    /// return.
    pub max_idle: usize,
    pub connect_timeout: Duration,
    /// Read and write timeout on every socket.
    pub io_timeout: Duration,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_idle: 8,
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(300)),
        }
    }
}

struct IdleConnection {
    connection: redis::Connection,
    returned_at: Instant,
}

/// Blocking pool of connections to one endpoint.
///
/// [`get`](Self::get) hands out a [`PooledConnection`] guard that returns
/// the connection on drop, or closes it if it was marked broken.
pub struct ConnectionPool {
    endpoint: String,
    client: redis::Client,
    options: PoolOptions,
    idle: Mutex<VecDeque<IdleConnection>>,
    checked_out: AtomicUsize,
}

/// Point-in-time pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub checked_out: usize,
}

impl ConnectionPool {
    /// Build a pool for `endpoint` (`redis://host:port/db`). No connection
    /// is opened until the first checkout.
    pub fn new(endpoint: &str, options: PoolOptions) -> BackendResult<Self> {
        let client = redis::Client::open(endpoint).map_err(|e| {
            BackendError::Config(format!("invalid endpoint {endpoint:?}: {e}"))
        })?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
            options,
            idle: Mutex::new(VecDeque::new()),
            checked_out: AtomicUsize::new(0),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check out a connection, reusing an idle one when possible.
    pub fn get(&self) -> BackendResult<PooledConnection<'_>> {
        let connection = match self.take_idle() {
            Some(connection) => connection,
            None => self.connect()?,
        };
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            pool: self,
            connection: Some(connection),
            broken: false,
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().expect("lock poisoned").len(),
            checked_out: self.checked_out.load(Ordering::SeqCst),
        }
    }

    fn take_idle(&self) -> Option<redis::Connection> {
        let mut idle = self.idle.lock().expect("lock poisoned");
        while let Some(entry) = idle.pop_front() {
            let stale = self
                .options
                .idle_timeout
                .is_some_and(|t| entry.returned_at.elapsed() > t);
            if stale || !entry.connection.is_open() {
                debug!(endpoint = %self.endpoint, "closing stale idle connection");
                continue;
            }
            return Some(entry.connection);
        }
        None
    }

    fn connect(&self) -> BackendResult<redis::Connection> {
        let unreachable = |e: redis::RedisError| BackendError::Connection {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        };
        let connection = self
            .client
            .get_connection_with_timeout(self.options.connect_timeout)
            .map_err(unreachable)?;
        connection
            .set_read_timeout(Some(self.options.io_timeout))
            .map_err(unreachable)?;
        connection
            .set_write_timeout(Some(self.options.io_timeout))
            .map_err(unreachable)?;
        debug!(endpoint = %self.endpoint, "opened connection");
        Ok(connection)
    }

    fn give_back(&self, connection: redis::Connection, broken: bool) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);
        if broken || !connection.is_open() {
            debug!(endpoint = %self.endpoint, "discarding broken connection");
            return;
        }
        let mut idle = self.idle.lock().expect("lock poisoned");
        if idle.len() < self.options.max_idle {
            idle.push_back(IdleConnection {
                connection,
                returned_at: Instant::now(),
            });
        }
    }
}

/// A checked-out connection. Returned to its pool on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    connection: Option<redis::Connection>,
    broken: bool,
}

impl PooledConnection<'_> {
    /// Close this connection on drop instead of returning it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Deref for PooledConnection<'_> {
    type Target = redis::Connection;

    fn deref(&self) -> &redis::Connection {
        self.connection
            .as_ref()
            .expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut redis::Connection {
        self.connection
            .as_mut()
            .expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.give_back(connection, self.broken);
        }
    }
}
