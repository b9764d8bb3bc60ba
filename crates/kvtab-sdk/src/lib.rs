//! Entry point for applications embedding kvtab.
//!
//! [`StoreConfig`] describes the shards and run mode, [`Kvtab::open`] wires
//! backends, the shard coordinator and the [`TableStore`] together, and
//! [`LegacyApi`] exposes the same operations with sentinel-coded results.

pub mod client;
pub mod config;
pub mod error;
pub mod legacy;

pub use client::Kvtab;
pub use config::{ShardConfig, StoreConfig};
pub use error::{SdkError, SdkResult};
pub use legacy::LegacyApi;

// Re-export key types
pub use kvtab_backend::{BackendError, InMemoryBackend, KeyValueBackend, Ttl};
pub use kvtab_shard::{RunMode, ShardHealth};
pub use kvtab_table::{FieldType, TableError, TableStore, UpdateOptions};
pub use kvtab_types::{FieldMap, FieldValues, KeyMode, PutMode, RData, RowKey, Sentinel, Stamp, TableId};
