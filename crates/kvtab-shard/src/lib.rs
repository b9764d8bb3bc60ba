//! Shard coordination for kvtab.
//!
//! A store talks to one or more backend endpoints ("shards"). This crate
//! decides which of them serve each physical read and write, isolates the
//! ones that fail and brings them back once they answer again.
//!
//! # Key Types
//!
//! - [`Shard`] -- a named [`KeyValueBackend`](kvtab_backend::KeyValueBackend)
//! - [`ShardRegistry`] -- shards split into active and quarantined sets
//! - [`RunMode`] -- distributed (hash ring) or mirrored (replicate everything)
//! - [`Coordinator`] -- per-operation routing and mirrored fan-out
//! - [`RecoveryProbe`] -- background pinger for quarantined shards
//! - [`HashRing`] -- FNV-1a consistent-hash ring with virtual nodes

pub mod coordinator;
pub mod error;
pub mod mode;
pub mod probe;
pub mod registry;
pub mod ring;
pub mod shard;

pub use coordinator::Coordinator;
pub use error::{ShardError, ShardResult};
pub use mode::RunMode;
pub use probe::{RecoveryProbe, DEFAULT_PROBE_INTERVAL};
pub use registry::ShardRegistry;
pub use ring::HashRing;
pub use shard::{Shard, ShardHealth};
