//! Key-value backend seam for kvtab.
//!
//! A backend is one endpoint holding string hashes. kvtab only needs a
//! small set of primitives from it: hash field get/set/delete, key
//! existence and deletion, absolute expiry, server time, a liveness ping
//! and an all-or-nothing batch.
//!
//! # Backends
//!
//! All backends implement the [`KeyValueBackend`] trait:
//!
//! - [`InMemoryBackend`] -- `HashMap`-based backend for tests and embedding,
//!   with a movable clock and outage injection
//! - [`RedisBackend`] -- Redis-compatible server behind a blocking
//!   [`ConnectionPool`]
//!
//! # Rules
//!
//! 1. One attempt per call. Retrying is the caller's business.
//! 2. A connection is checked out for exactly one command or batch.
//! 3. A hash with no fields does not exist.

pub mod error;
pub mod memory;
pub mod pool;
pub mod remote;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use memory::{CallStats, InMemoryBackend};
pub use pool::{ConnectionPool, PoolOptions, PoolStats, PooledConnection};
pub use remote::RedisBackend;
pub use traits::{HashOp, KeyValueBackend, Ttl};
