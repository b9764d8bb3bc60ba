//! Physical key naming for the three-tier hash model.
//!
//! | Logical thing | Physical key                 | Hash fields               |
//! |---------------|------------------------------|---------------------------|
//! | database      | `"RDB" + database`           | table ids → created at    |
//! | table         | `database + "." + table`     | row keys → registered at  |
//! | row           | `table + "." + id` or `id`   | column → value            |
//!
//! The names must be reproduced exactly so that other clients of the same
//! backend see the same layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Prefix prepended to a logical database name to form its hash key.
pub const DATABASE_PREFIX: &str = "RDB";

/// Reserved field that forces a database or table hash to exist.
///
/// Never written to row hashes.
pub const PLACEHOLDER_FIELD: &str = "";

/// How row ids become row keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// `table + "." + id`.
    #[default]
    Structured,
    /// `id` verbatim. Ids must be unique across tables.
    Flat,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Structured => f.write_str("structured"),
            KeyMode::Flat => f.write_str("flat"),
        }
    }
}

impl FromStr for KeyMode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured" => Ok(KeyMode::Structured),
            "flat" => Ok(KeyMode::Flat),
            other => Err(TypeError::UnknownVariant {
                kind: "key mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Physical key of a database metadata hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseId(String);

impl DatabaseId {
    pub fn new(database: &str) -> Self {
        Self(format!("{DATABASE_PREFIX}{database}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Physical key of a table metadata hash.
///
/// The same string is the field name under which the table is linked into
/// its database hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    pub fn new(database: &str, table: &str) -> Self {
        Self(format!("{database}.{table}"))
    }

    /// Wrap an id read back from a database hash.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Physical key of one row hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(String);

impl RowKey {
    /// Build the row key for `id` in `table`.
    ///
    /// Pure: the same inputs always give the same key.
    pub fn new(table: &str, id: &str, mode: KeyMode) -> Self {
        match mode {
            KeyMode::Structured => Self(format!("{table}.{id}")),
            KeyMode::Flat => Self(id.to_string()),
        }
    }

    /// Wrap a key read back from a table hash, or supplied by the caller.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `true` for the reserved placeholder field of a table hash.
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_FIELD
    }
}

macro_rules! string_key_impls {
    ($($ty:ident),*) => {$(
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($ty), self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    )*};
}

string_key_impls!(DatabaseId, TableId, RowKey);

/// Reject an empty required name.
pub fn require(what: &'static str, value: &str) -> Result<(), TypeError> {
    if value.is_empty() {
        Err(TypeError::Empty { what })
    } else {
        Ok(())
    }
}
