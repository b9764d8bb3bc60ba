//! Logical tables over key-value hashes.
//!
//! kvtab stores a database / table / row / column model in plain string
//! hashes:
//!
//! - a database is the hash `"RDB" + name`, mapping table ids to their
//!   creation time
//! - a table is the hash `database.table`, mapping row keys to their
//!   registration time
//! - a row is one hash of column → value, keyed by its [`RowKey`]
//!
//! Database and table hashes carry a placeholder field `""` so they exist
//! even when empty.
//!
//! # Key Types
//!
//! - [`TableStore`] -- table and row lifecycle, reads with self-healing
//! - [`RowCodec`] / [`SerdeRowCodec`] -- row values to field maps and back
//! - [`TypeHintRegistry`] -- per-store column type overrides
//! - [`UpdateOptions`] -- null handling and expiry for overwrites
//!
//! [`RowKey`]: kvtab_types::RowKey

pub mod codec;
pub mod error;
pub mod hints;
pub mod options;
pub mod store;
mod write;

#[cfg(test)]
mod testing;

pub use codec::{RowCodec, SerdeRowCodec};
pub use error::{TableError, TableResult};
pub use hints::{FieldType, TableHints, TypeHintRegistry};
pub use options::UpdateOptions;
pub use store::TableStore;
