//! Compatibility surface with integer and boolean results.
//!
//! Mutations answer with a non-negative count, or a negative
//! [`Sentinel`] code on failure. Reads answer with an empty or absent value
//! on failure. Every failure is logged before it is folded.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use kvtab_backend::Ttl;
use kvtab_table::{TableError, TableResult, TableStore, UpdateOptions};
use kvtab_types::{FieldMap, FieldValues, RData, RowKey, Sentinel, Stamp, TableId};

/// Borrowed view of a [`TableStore`] that never returns `Err`.
#[derive(Clone, Copy)]
pub struct LegacyApi<'a> {
    store: &'a TableStore,
}

fn count(op: &'static str, result: TableResult<u64>) -> i64 {
    match result {
        Ok(n) => i64::try_from(n).unwrap_or(i64::MAX),
        Err(e) => {
            warn!(op, error = %e, "operation failed");
            e.sentinel().code()
        }
    }
}

fn flag(op: &'static str, result: TableResult<bool>) -> bool {
    or_default(op, result)
}

fn or_default<T: Default>(op: &'static str, result: TableResult<T>) -> T {
    result.unwrap_or_else(|e: TableError| {
        warn!(op, error = %e, "read failed");
        T::default()
    })
}

impl<'a> LegacyApi<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self { store }
    }

    // ---- Lifecycle ----

    pub fn create_table(&self, database: &str, table: &str) -> bool {
        flag("create_table", self.store.create_table(database, table))
    }

    pub fn drop_table(&self, database: &str, table: &str) -> bool {
        flag("drop_table", self.store.drop_table(database, table))
    }

    pub fn drop_database(&self, database: &str) -> bool {
        flag("drop_database", self.store.drop_database(database))
    }

    pub fn truncate(&self, database: &str, table: &str) -> i64 {
        count("truncate", self.store.truncate(database, table))
    }

    pub fn delete(&self, database: &str, table: &str, id: &str) -> i64 {
        count("delete", self.store.delete(database, table, id))
    }

    // ---- Writes ----

    pub fn insert_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> i64 {
        count("insert_field", self.store.insert_field(database, table, id, field, value))
    }

    pub fn insert_row(&self, database: &str, table: &str, id: &str, fields: &FieldValues) -> i64 {
        count("insert_row", self.store.insert_row(database, table, id, fields))
    }

    pub fn insert_data(&self, database: &str, table: &str, data: &RData) -> i64 {
        count("insert_data", self.store.insert_data(database, table, data))
    }

    pub fn insert_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> i64 {
        count("insert_object", self.store.insert_object(database, table, id, value))
    }

    pub fn update_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> i64 {
        count("update_field", self.store.update_field(database, table, id, field, value))
    }

    pub fn update_row(
        &self,
        database: &str,
        table: &str,
        id: &str,
        fields: &FieldValues,
        options: UpdateOptions,
    ) -> i64 {
        count(
            "update_row",
            self.store.update_row(database, table, id, fields, options),
        )
    }

    pub fn update_data(&self, database: &str, table: &str, data: &RData) -> i64 {
        count("update_data", self.store.update_data(database, table, data))
    }

    pub fn update_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> i64 {
        count("update_object", self.store.update_object(database, table, id, value))
    }

    pub fn save_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> i64 {
        count("save_field", self.store.save_field(database, table, id, field, value))
    }

    pub fn save_row(
        &self,
        database: &str,
        table: &str,
        id: &str,
        fields: &FieldValues,
        options: UpdateOptions,
    ) -> i64 {
        count(
            "save_row",
            self.store.save_row(database, table, id, fields, options),
        )
    }

    pub fn save_data(&self, database: &str, table: &str, data: &RData) -> i64 {
        count("save_data", self.store.save_data(database, table, data))
    }

    pub fn save_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> i64 {
        count("save_object", self.store.save_object(database, table, id, value))
    }

    pub fn put(&self, database: &str, table: &str, batch: &[RData]) -> i64 {
        count("put", self.store.put(database, table, batch))
    }

    // ---- Reads ----

    pub fn get_row(&self, row_key: &str) -> Option<FieldMap> {
        or_default("get_row", self.store.get_row(row_key))
    }

    pub fn get_row_in(&self, database: &str, table: &str, id: &str) -> Option<FieldMap> {
        or_default("get_row_in", self.store.get_row_in(database, table, id))
    }

    pub fn get_row_as<T>(&self, database: &str, table: &str, id: &str) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        or_default("get_row_as", self.store.get_row_as(database, table, id))
    }

    pub fn get_rows(&self, database: &str, table: &str) -> BTreeMap<RowKey, FieldMap> {
        or_default("get_rows", self.store.get_rows(database, table))
    }

    pub fn get_rows_list<T>(&self, database: &str, table: &str) -> Vec<T>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        or_default("get_rows_list", self.store.get_rows_list(database, table))
    }

    pub fn get_tables(&self, database: &str) -> BTreeMap<TableId, Stamp> {
        or_default("get_tables", self.store.get_tables(database))
    }

    pub fn get_create_time(&self, database: &str) -> Option<Stamp> {
        or_default("get_create_time", self.store.get_create_time(database))
    }

    pub fn get_table_create_time(&self, database: &str, table: &str) -> Option<Stamp> {
        or_default(
            "get_table_create_time",
            self.store.get_table_create_time(database, table),
        )
    }

    pub fn get_row_create_time(&self, database: &str, table: &str, id: &str) -> Option<Stamp> {
        or_default(
            "get_row_create_time",
            self.store.get_row_create_time(database, table, id),
        )
    }

    pub fn database_exists(&self, database: &str) -> bool {
        flag("database_exists", self.store.database_exists(database))
    }

    pub fn table_exists(&self, database: &str, table: &str) -> bool {
        flag("table_exists", self.store.table_exists(database, table))
    }

    pub fn row_exists(&self, database: &str, table: &str, id: &str) -> bool {
        flag("row_exists", self.store.row_exists(database, table, id))
    }

    pub fn field_exists(&self, database: &str, table: &str, id: &str, field: &str) -> bool {
        flag("field_exists", self.store.field_exists(database, table, id, field))
    }

    /// `TTL` reply semantics: seconds left, `-1` without expiry, `-2` for a
    /// missing row. Any other failure is [`Sentinel::Internal`].
    pub fn time_to_live(&self, database: &str, table: &str, id: &str) -> i64 {
        match self.store.time_to_live(database, table, id) {
            Ok(Ttl::Seconds(secs)) => i64::try_from(secs).unwrap_or(i64::MAX),
            Ok(Ttl::Persistent) => -1,
            Ok(Ttl::Missing) => -2,
            Err(e) => {
                warn!(op = "time_to_live", error = %e, "read failed");
                Sentinel::Internal.code()
            }
        }
    }
}
