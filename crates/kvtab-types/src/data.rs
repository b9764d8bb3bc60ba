use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::temporal::Stamp;

/// A row as read back from the backend: column name → column value.
pub type FieldMap = BTreeMap<String, String>;

/// A row as written by callers. `None` means "delete this column".
pub type FieldValues = BTreeMap<String, Option<String>>;

/// How a single field write treats an existing value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PutMode {
    /// Always overwrite.
    #[default]
    Normal,
    /// Write only if the field does not exist yet.
    OnlyIfAbsent,
    /// Write only if the field already exists.
    OnlyIfPresent,
}

/// One in-flight field write.
///
/// `key` is the caller's row id (not yet turned into a [`RowKey`]); a `None`
/// value deletes the field.
///
/// [`RowKey`]: crate::RowKey
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RData {
    pub key: String,
    pub field: String,
    pub value: Option<String>,
    /// Seconds until the row expires; `0` leaves expiry untouched.
    pub expire_seconds: u64,
    pub put_mode: PutMode,
    /// Registration timestamp to record instead of "now".
    pub timestamp: Option<Stamp>,
}

impl RData {
    pub fn new(key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
            value: Some(value.into()),
            expire_seconds: 0,
            put_mode: PutMode::Normal,
            timestamp: None,
        }
    }

    /// A write that deletes `field`.
    pub fn delete(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            value: None,
            ..Self::new(key, field, String::new())
        }
    }

    pub fn with_put_mode(mut self, put_mode: PutMode) -> Self {
        self.put_mode = put_mode;
        self
    }

    pub fn with_expire_seconds(mut self, seconds: u64) -> Self {
        self.expire_seconds = seconds;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Stamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// `true` if this write removes the field.
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}
