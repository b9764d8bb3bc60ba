use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

use kvtab_backend::{HashOp, Ttl};
use kvtab_shard::Coordinator;
use kvtab_types::{
    require, DatabaseId, FieldMap, KeyMode, RowKey, Stamp, TableId, PLACEHOLDER_FIELD,
};

use crate::codec::{RowCodec, SerdeRowCodec};
use crate::error::{TableError, TableResult};
use crate::hints::{TableHints, TypeHintRegistry};

/// Logical databases, tables and rows over key-value hashes.
///
/// Every physical call goes through the [`Coordinator`], which picks the
/// shard(s). `create_table` is serialized by a per-store mutex; everything
/// else relies on the backend's conditional primitives.
pub struct TableStore<C: RowCodec = SerdeRowCodec> {
    pub(crate) coordinator: Coordinator,
    pub(crate) key_mode: KeyMode,
    pub(crate) codec: C,
    pub(crate) hints: TypeHintRegistry,
    create_lock: Mutex<()>,
}

impl TableStore<SerdeRowCodec> {
    pub fn new(coordinator: Coordinator, key_mode: KeyMode) -> Self {
        Self::with_codec(coordinator, key_mode, SerdeRowCodec)
    }
}

impl<C: RowCodec> TableStore<C> {
    pub fn with_codec(coordinator: Coordinator, key_mode: KeyMode, codec: C) -> Self {
        Self {
            coordinator,
            key_mode,
            codec,
            hints: TypeHintRegistry::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    /// Column type hints used when decoding rows of this store.
    pub fn hints(&self) -> &TypeHintRegistry {
        &self.hints
    }

    /// Physical key of row `id` in `table`.
    pub fn row_key(&self, table: &str, id: &str) -> RowKey {
        RowKey::new(table, id, self.key_mode)
    }

    // -- table lifecycle --------------------------------------------------

    /// Create `database.table`.
    ///
    /// Returns `Ok(false)` if the table already exists. Missing database
    /// metadata is provisioned on the way, so a half-created table heals
    /// here.
    pub fn create_table(&self, database: &str, table: &str) -> TableResult<bool> {
        require("database", database)?;
        require("table", table)?;
        let db_id = DatabaseId::new(database);
        let table_id = TableId::new(database, table);

        let _guard = self.create_lock.lock().expect("lock poisoned");
        let now = Stamp::now().render();
        if self.exists(table_id.as_str())? {
            self.relink(&db_id, &table_id, &now)?;
            error!(table = %table_id, "table already exists");
            return Ok(false);
        }

        let replies = self.coordinator.write(&[
            HashOp::set_if_absent(db_id.as_str(), PLACEHOLDER_FIELD, now.as_str()),
            HashOp::set_if_absent(db_id.as_str(), table_id.as_str(), now.as_str()),
            HashOp::set_if_absent(table_id.as_str(), PLACEHOLDER_FIELD, now.as_str()),
        ])?;
        let created = replies.get(2).copied() == Some(1);
        if created {
            info!(table = %table_id, "table created");
        } else {
            error!(table = %table_id, "table appeared while being created");
        }
        Ok(created)
    }

    /// Drop `database.table` with all its rows.
    ///
    /// Returns `Ok(false)` if the table or its database does not exist.
    pub fn drop_table(&self, database: &str, table: &str) -> TableResult<bool> {
        require("database", database)?;
        require("table", table)?;
        let db_id = DatabaseId::new(database);
        let table_id = TableId::new(database, table);
        if !self.exists(table_id.as_str())? || !self.exists(db_id.as_str())? {
            return Ok(false);
        }
        self.drop_table_ids(&db_id, &table_id)
    }

    /// Drop every table of `database`, then the database itself.
    ///
    /// Stops with `Ok(false)` at the first table that fails to drop.
    pub fn drop_database(&self, database: &str) -> TableResult<bool> {
        require("database", database)?;
        let db_id = DatabaseId::new(database);
        for table_id in self.table_ids(&db_id)? {
            if !self.drop_table_ids(&db_id, &table_id)? {
                warn!(database = %database, table = %table_id, "drop database aborted");
                return Ok(false);
            }
        }
        let removed = self.coordinator.write_one(HashOp::delete_keys([db_id.as_str()]))?;
        if removed > 0 {
            info!(database = %database, "database dropped");
        }
        Ok(removed > 0)
    }

    /// Delete every row of a table, keeping the table. Returns the number
    /// of rows removed.
    pub fn truncate(&self, database: &str, table: &str) -> TableResult<u64> {
        require("database", database)?;
        require("table", table)?;
        let table_id = self.existing_table(database, table)?;
        self.truncate_id(&table_id)
    }

    /// Delete one row. Returns 0 or 1.
    pub fn delete(&self, database: &str, table: &str, id: &str) -> TableResult<u64> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        let table_id = self.existing_table(database, table)?;
        self.delete_row(&table_id, &self.row_key(table, id))
    }

    fn drop_table_ids(&self, db_id: &DatabaseId, table_id: &TableId) -> TableResult<bool> {
        self.truncate_id(table_id)?;
        self.coordinator
            .write_one(HashOp::delete(table_id.as_str(), PLACEHOLDER_FIELD))?;
        self.coordinator
            .write_one(HashOp::delete_keys([table_id.as_str()]))?;
        let unlinked = self
            .coordinator
            .write_one(HashOp::delete(db_id.as_str(), table_id.as_str()))?;
        if unlinked > 0 {
            info!(table = %table_id, "table dropped");
        }
        Ok(unlinked > 0)
    }

    fn truncate_id(&self, table_id: &TableId) -> TableResult<u64> {
        let mut removed = 0;
        for row_key in self.registered_rows(table_id)? {
            removed += self.delete_row(table_id, &row_key)?;
        }
        Ok(removed)
    }

    pub(crate) fn delete_row(&self, table_id: &TableId, row_key: &RowKey) -> TableResult<u64> {
        self.coordinator
            .write_one(HashOp::delete(table_id.as_str(), row_key.as_str()))?;
        let removed = self
            .coordinator
            .write_one(HashOp::delete_keys([row_key.as_str()]))?;
        Ok(removed.max(0) as u64)
    }

    fn existing_table(&self, database: &str, table: &str) -> TableResult<TableId> {
        let table_id = TableId::new(database, table);
        if self.exists(table_id.as_str())? {
            Ok(table_id)
        } else {
            Err(TableError::TableNotFound(table_id.to_string()))
        }
    }

    /// Create the table if needed before a write.
    pub(crate) fn ensure_table(&self, database: &str, table: &str) -> TableResult<TableId> {
        let table_id = TableId::new(database, table);
        if self.exists(table_id.as_str())? {
            let db_id = DatabaseId::new(database);
            let linked = self.coordinator.read(db_id.as_str(), "HEXISTS", |b| {
                b.hexists(db_id.as_str(), table_id.as_str())
            })?;
            if !linked {
                let _guard = self.create_lock.lock().expect("lock poisoned");
                self.relink(&db_id, &table_id, &Stamp::now().render())?;
            }
            return Ok(table_id);
        }
        let failed = |reason: String| TableError::AutoCreateFailed {
            table: table_id.to_string(),
            reason,
        };
        match self.create_table(database, table) {
            Ok(true) => Ok(table_id.clone()),
            // Lost a race with another creator; fine if the table is there.
            Ok(false) if self.exists(table_id.as_str())? => Ok(table_id.clone()),
            Ok(false) => Err(failed("table hash missing after create".into())),
            Err(e) => Err(failed(e.to_string())),
        }
    }

    /// Provision the database hash and its entry for an existing table.
    fn relink(&self, db_id: &DatabaseId, table_id: &TableId, now: &str) -> TableResult<()> {
        let replies = self.coordinator.write(&[
            HashOp::set_if_absent(db_id.as_str(), PLACEHOLDER_FIELD, now),
            HashOp::set_if_absent(db_id.as_str(), table_id.as_str(), now),
        ])?;
        if replies.get(1).copied() == Some(1) {
            warn!(table = %table_id, "table relinked into its database");
        }
        Ok(())
    }

    fn table_ids(&self, db_id: &DatabaseId) -> TableResult<Vec<TableId>> {
        Ok(self
            .hgetall(db_id.as_str())?
            .into_keys()
            .filter(|k| k != PLACEHOLDER_FIELD)
            .map(TableId::from_raw)
            .collect())
    }

    fn registered_rows(&self, table_id: &TableId) -> TableResult<Vec<RowKey>> {
        Ok(self
            .hgetall(table_id.as_str())?
            .into_keys()
            .map(RowKey::from_raw)
            .filter(|k| !k.is_placeholder())
            .collect())
    }

    // -- reads ------------------------------------------------------------

    /// Every column of the row stored at `row_key`.
    pub fn get_row(&self, row_key: &str) -> TableResult<Option<FieldMap>> {
        require("row key", row_key)?;
        let fields = self.hgetall(row_key)?;
        Ok((!fields.is_empty()).then_some(fields))
    }

    /// Every column of row `id` in `database.table`.
    pub fn get_row_in(&self, database: &str, table: &str, id: &str) -> TableResult<Option<FieldMap>> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        self.get_row(self.row_key(table, id).as_str())
    }

    /// Row `id` decoded as `T`, using the table's type hints.
    pub fn get_row_as<T>(&self, database: &str, table: &str, id: &str) -> TableResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let hints = self.hints.get(database, table);
        self.get_row_in(database, table, id)?
            .map(|fields| self.codec.decode(&fields, &hints))
            .transpose()
    }

    /// The row stored at `row_key` decoded as `T`, without type hints.
    pub fn get_row_key_as<T>(&self, row_key: &str) -> TableResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        self.get_row(row_key)?
            .map(|fields| self.codec.decode(&fields, &TableHints::new()))
            .transpose()
    }

    /// Every row of a table, keyed by row key.
    ///
    /// A registered row whose hash has vanished (expired or deleted behind
    /// our back) is unregistered on the way. Empty if the table does not
    /// exist.
    pub fn get_rows(&self, database: &str, table: &str) -> TableResult<BTreeMap<RowKey, FieldMap>> {
        require("database", database)?;
        require("table", table)?;
        let table_id = TableId::new(database, table);
        let mut rows = BTreeMap::new();
        for row_key in self.registered_rows(&table_id)? {
            let fields = self.hgetall(row_key.as_str())?;
            if fields.is_empty() {
                warn!(table = %table_id, row = %row_key, "purging stale row registration");
                self.coordinator
                    .write_one(HashOp::delete(table_id.as_str(), row_key.as_str()))?;
                continue;
            }
            rows.insert(row_key, fields);
        }
        Ok(rows)
    }

    /// [`get_rows`](Self::get_rows) decoded as `T`.
    pub fn get_rows_as<T>(&self, database: &str, table: &str) -> TableResult<BTreeMap<RowKey, T>>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let hints = self.hints.get(database, table);
        self.get_rows(database, table)?
            .into_iter()
            .map(|(key, fields)| Ok((key, self.codec.decode(&fields, &hints)?)))
            .collect()
    }

    /// Decoded rows in row key order.
    pub fn get_rows_list<T>(&self, database: &str, table: &str) -> TableResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        Ok(self.get_rows_as(database, table)?.into_values().collect())
    }

    /// Tables of a database with their creation time.
    pub fn get_tables(&self, database: &str) -> TableResult<BTreeMap<TableId, Stamp>> {
        require("database", database)?;
        let db_id = DatabaseId::new(database);
        let mut tables = BTreeMap::new();
        for (table_id, created) in self.hgetall(db_id.as_str())? {
            if table_id == PLACEHOLDER_FIELD {
                continue;
            }
            match Stamp::parse(&created) {
                Ok(stamp) => {
                    tables.insert(TableId::from_raw(table_id), stamp);
                }
                Err(e) => warn!(table = %table_id, error = %e, "unreadable table timestamp"),
            }
        }
        Ok(tables)
    }

    pub fn get_create_time(&self, database: &str) -> TableResult<Option<Stamp>> {
        require("database", database)?;
        self.stamp(DatabaseId::new(database).as_str(), PLACEHOLDER_FIELD)
    }

    pub fn get_table_create_time(&self, database: &str, table: &str) -> TableResult<Option<Stamp>> {
        require("database", database)?;
        require("table", table)?;
        self.stamp(TableId::new(database, table).as_str(), PLACEHOLDER_FIELD)
    }

    /// When row `id` was first registered in its table.
    pub fn get_row_create_time(&self, database: &str, table: &str, id: &str) -> TableResult<Option<Stamp>> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        let table_id = TableId::new(database, table);
        self.stamp(table_id.as_str(), self.row_key(table, id).as_str())
    }

    pub fn database_exists(&self, database: &str) -> TableResult<bool> {
        require("database", database)?;
        self.exists(DatabaseId::new(database).as_str())
    }

    pub fn table_exists(&self, database: &str, table: &str) -> TableResult<bool> {
        require("database", database)?;
        require("table", table)?;
        self.exists(TableId::new(database, table).as_str())
    }

    pub fn row_exists(&self, database: &str, table: &str, id: &str) -> TableResult<bool> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        self.exists(self.row_key(table, id).as_str())
    }

    pub fn field_exists(&self, database: &str, table: &str, id: &str, field: &str) -> TableResult<bool> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        require("field", field)?;
        let key = self.row_key(table, id);
        Ok(self
            .coordinator
            .read(key.as_str(), "HEXISTS", |b| b.hexists(key.as_str(), field))?)
    }

    /// Remaining lifetime of row `id`.
    pub fn time_to_live(&self, database: &str, table: &str, id: &str) -> TableResult<Ttl> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        let key = self.row_key(table, id);
        Ok(self
            .coordinator
            .read(key.as_str(), "TTL", |b| b.ttl(key.as_str()))?)
    }

    // -- physical reads ---------------------------------------------------

    pub(crate) fn exists(&self, key: &str) -> TableResult<bool> {
        Ok(self.coordinator.read(key, "EXISTS", |b| b.exists(key))?)
    }

    pub(crate) fn hget(&self, key: &str, field: &str) -> TableResult<Option<String>> {
        Ok(self.coordinator.read(key, "HGET", |b| b.hget(key, field))?)
    }

    pub(crate) fn hgetall(&self, key: &str) -> TableResult<FieldMap> {
        Ok(self.coordinator.read(key, "HGETALL", |b| b.hgetall(key))?)
    }

    /// A stored timestamp; `None` when absent or unreadable.
    fn stamp(&self, key: &str, field: &str) -> TableResult<Option<Stamp>> {
        let Some(raw) = self.hget(key, field)? else {
            return Ok(None);
        };
        match Stamp::parse(&raw) {
            Ok(stamp) => Ok(Some(stamp)),
            Err(e) => {
                warn!(key, field, error = %e, "unreadable timestamp");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use serde::Deserialize;

    use kvtab_backend::KeyValueBackend;
    use kvtab_shard::{RunMode, ShardHealth};

    use super::*;
    use crate::hints::FieldType;
    use crate::testing::{mirrored, row, store};

    #[test]
    fn never_created_table_is_absent_and_empty() {
        let (store, _) = mirrored(1);
        assert!(!store.table_exists("shop", "orders").unwrap());
        assert!(!store.database_exists("shop").unwrap());
        assert!(store.get_rows("shop", "orders").unwrap().is_empty());
        assert!(store.get_tables("shop").unwrap().is_empty());
    }

    #[test]
    fn create_table_writes_three_tier_layout() {
        let (store, b) = mirrored(1);
        assert!(store.create_table("shop", "orders").unwrap());

        let db = b[0].hgetall("RDBshop").unwrap();
        assert!(db.contains_key(""));
        assert!(db.contains_key("shop.orders"));
        let table = b[0].hgetall("shop.orders").unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![""]);

        store
            .insert_field("shop", "orders", "1", "item", "pen")
            .unwrap();
        assert!(b[0].hexists("shop.orders", "orders.1").unwrap());
        assert_eq!(b[0].hget("orders.1", "item").unwrap().as_deref(), Some("pen"));
        assert!(!b[0].hexists("orders.1", "").unwrap());
    }

    #[test]
    fn second_create_returns_false_without_mutating() {
        let (store, _) = mirrored(1);
        assert!(store.create_table("shop", "orders").unwrap());
        let created = store.get_table_create_time("shop", "orders").unwrap();
        assert!(!store.create_table("shop", "orders").unwrap());
        assert_eq!(store.get_table_create_time("shop", "orders").unwrap(), created);
        assert_eq!(store.get_tables("shop").unwrap().len(), 1);
    }

    #[test]
    fn concurrent_create_yields_one_table() {
        let (store, _) = mirrored(2);
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create_table("shop", "orders").unwrap())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.get_tables("shop").unwrap().len(), 1);
    }

    #[test]
    fn create_table_heals_missing_table_hash() {
        let (store, b) = mirrored(1);
        store.create_table("shop", "orders").unwrap();
        b[0].evict("shop.orders");
        assert!(!store.table_exists("shop", "orders").unwrap());

        assert!(store.create_table("shop", "orders").unwrap());
        assert!(store.table_exists("shop", "orders").unwrap());
        assert_eq!(store.get_tables("shop").unwrap().len(), 1);
    }

    #[test]
    fn create_table_relinks_orphaned_table() {
        let (store, b) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "1").unwrap();
        store.insert_field("shop", "orders", "2", "a", "2").unwrap();
        b[0].hdel("RDBshop", &["shop.orders"]).unwrap();
        assert!(store.get_tables("shop").unwrap().is_empty());

        assert!(!store.create_table("shop", "orders").unwrap());
        assert!(store
            .get_tables("shop")
            .unwrap()
            .contains_key(&TableId::new("shop", "orders")));

        assert!(store.drop_database("shop").unwrap());
        assert!(b[0].is_empty(), "left behind: {:?}", b[0].keys());
    }

    #[test]
    fn auto_create_relinks_orphaned_table() {
        let (store, b) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "1").unwrap();
        b[0].evict("RDBshop");
        store.insert_field("shop", "orders", "2", "a", "2").unwrap();
        assert!(store.database_exists("shop").unwrap());
        assert_eq!(store.get_tables("shop").unwrap().len(), 1);
    }

    #[test]
    fn foreign_timestamps_read_as_absent() {
        let (store, b) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "1").unwrap();
        b[0].hset("RDBshop", "", "1710495000").unwrap();
        b[0].hset("shop.orders", "", "yesterday").unwrap();
        b[0].hset("shop.orders", "orders.1", "").unwrap();

        assert_eq!(store.get_create_time("shop").unwrap(), None);
        assert_eq!(store.get_table_create_time("shop", "orders").unwrap(), None);
        assert_eq!(store.get_row_create_time("shop", "orders", "1").unwrap(), None);
        assert!(store.row_exists("shop", "orders", "1").unwrap());
    }

    #[test]
    fn drop_table_then_recreate() {
        let (store, b) = mirrored(1);
        store
            .insert_row("shop", "orders", "1", &row(&[("a", Some("1"))]))
            .unwrap();
        assert!(store.drop_table("shop", "orders").unwrap());

        assert!(store.get_rows("shop", "orders").unwrap().is_empty());
        assert!(!store.table_exists("shop", "orders").unwrap());
        assert!(!b[0].exists("orders.1").unwrap());
        assert!(store.database_exists("shop").unwrap());

        assert!(store.create_table("shop", "orders").unwrap());
    }

    #[test]
    fn drop_missing_table_is_false() {
        let (store, b) = mirrored(1);
        assert!(!store.drop_table("shop", "orders").unwrap());

        store.create_table("shop", "orders").unwrap();
        b[0].evict("RDBshop");
        assert!(!store.drop_table("shop", "orders").unwrap());
    }

    #[test]
    fn drop_database_removes_everything() {
        let (store, b) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "1").unwrap();
        store.insert_field("shop", "users", "u", "name", "ann").unwrap();
        assert!(store.drop_database("shop").unwrap());
        assert!(b[0].is_empty(), "left behind: {:?}", b[0].keys());
        assert!(!store.drop_database("shop").unwrap());
    }

    #[test]
    fn truncate_keeps_table_and_create_time() {
        let (store, _) = mirrored(1);
        store.create_table("shop", "orders").unwrap();
        let created = store.get_table_create_time("shop", "orders").unwrap();
        assert!(created.is_some());
        for id in ["1", "2", "3"] {
            store.insert_field("shop", "orders", id, "a", "x").unwrap();
        }

        assert_eq!(store.truncate("shop", "orders").unwrap(), 3);
        assert!(store.table_exists("shop", "orders").unwrap());
        assert!(store.get_rows("shop", "orders").unwrap().is_empty());
        assert_eq!(store.get_table_create_time("shop", "orders").unwrap(), created);
        assert_eq!(store.truncate("shop", "orders").unwrap(), 0);
    }

    #[test]
    fn truncate_and_delete_need_the_table() {
        let (store, _) = mirrored(1);
        assert!(matches!(
            store.truncate("shop", "orders"),
            Err(TableError::TableNotFound(_))
        ));
        assert!(matches!(
            store.delete("shop", "orders", "1"),
            Err(TableError::TableNotFound(_))
        ));
    }

    #[test]
    fn delete_counts_rows() {
        let (store, _) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "x").unwrap();
        assert_eq!(store.delete("shop", "orders", "1").unwrap(), 1);
        assert_eq!(store.delete("shop", "orders", "1").unwrap(), 0);
        assert!(store.get_row_create_time("shop", "orders", "1").unwrap().is_none());
    }

    #[test]
    fn get_rows_purges_stale_registrations() {
        let (store, b) = mirrored(2);
        store.insert_field("shop", "orders", "1", "a", "x").unwrap();
        store.insert_field("shop", "orders", "2", "a", "y").unwrap();
        for backend in &b {
            backend.evict("orders.1");
        }

        let rows = store.get_rows("shop", "orders").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.contains_key(&RowKey::from_raw("orders.2")));
        for backend in &b {
            assert!(!backend.hexists("shop.orders", "orders.1").unwrap());
        }
    }

    #[test]
    fn create_times_at_each_level() {
        let (store, _) = mirrored(1);
        assert!(store.get_create_time("shop").unwrap().is_none());
        store.insert_field("shop", "orders", "1", "a", "x").unwrap();
        let db = store.get_create_time("shop").unwrap().unwrap();
        let table = store.get_table_create_time("shop", "orders").unwrap().unwrap();
        let row = store.get_row_create_time("shop", "orders", "1").unwrap().unwrap();
        assert!(db <= table && table <= row);
        let tables = store.get_tables("shop").unwrap();
        assert_eq!(tables.get(&TableId::new("shop", "orders")), Some(&table));
    }

    #[test]
    fn existence_checks() {
        let (store, _) = mirrored(1);
        store.insert_field("shop", "orders", "1", "a", "x").unwrap();
        assert!(store.database_exists("shop").unwrap());
        assert!(store.table_exists("shop", "orders").unwrap());
        assert!(store.row_exists("shop", "orders", "1").unwrap());
        assert!(!store.row_exists("shop", "orders", "2").unwrap());
        assert!(store.field_exists("shop", "orders", "1", "a").unwrap());
        assert!(!store.field_exists("shop", "orders", "1", "b").unwrap());
    }

    #[test]
    fn empty_arguments_never_reach_the_backend() {
        let (store, b) = mirrored(1);
        assert!(matches!(
            store.create_table("", "orders"),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.insert_field("shop", "orders", "", "a", "x"),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.update_row("shop", "orders", "1", &row(&[]), Default::default()),
            Err(TableError::InvalidArgument(_))
        ));
        assert!(matches!(store.get_row(""), Err(TableError::InvalidArgument(_))));
        assert_eq!(b[0].stats().commands, 0);
        assert_eq!(b[0].stats().transactions, 0);
    }

    #[test]
    fn mirrored_outage_quarantines_then_probe_restores() {
        let (store, b) = mirrored(3);
        store.create_table("shop", "orders").unwrap();
        b[2].set_available(false);

        let written = store
            .insert_row("shop", "orders", "1", &row(&[("a", Some("1")), ("b", Some("2"))]))
            .unwrap();
        assert_eq!(written, 2);
        for backend in &b[..2] {
            assert_eq!(backend.hget("orders.1", "a").unwrap().as_deref(), Some("1"));
            assert!(backend.hexists("shop.orders", "orders.1").unwrap());
        }
        let registry = store.coordinator().registry();
        assert_eq!(registry.health("mem2"), Some(ShardHealth::Quarantined));

        b[2].set_available(true);
        assert_eq!(store.coordinator().probe_now(), vec!["mem2".to_string()]);
        assert_eq!(registry.health("mem2"), Some(ShardHealth::Active));
        assert!(!b[2].exists("orders.1").unwrap());
    }

    #[test]
    fn mirrored_reads_survive_first_shard_outage() {
        let (store, b) = mirrored(2);
        store.insert_field("shop", "orders", "1", "a", "x").unwrap();
        b[0].set_available(false);
        let fields = store.get_row_in("shop", "orders", "1").unwrap().unwrap();
        assert_eq!(fields["a"], "x");
        assert_eq!(
            store.coordinator().registry().health("mem0"),
            Some(ShardHealth::Quarantined)
        );
    }

    #[test]
    fn distributed_store_round_trips() {
        let (store, b) = store(3, RunMode::Distributed, KeyMode::Structured);
        for i in 0..10 {
            store
                .insert_field("shop", "orders", &i.to_string(), "n", &i.to_string())
                .unwrap();
        }
        assert_eq!(store.get_rows("shop", "orders").unwrap().len(), 10);
        let holders = b.iter().filter(|be| !be.is_empty()).count();
        assert!(holders > 1);
        assert!(store.drop_database("shop").unwrap());
        assert!(b.iter().all(|be| be.is_empty()));
    }

    #[test]
    fn flat_keys_use_id_verbatim() {
        let (store, b) = store(1, RunMode::Mirrored, KeyMode::Flat);
        store.insert_field("shop", "orders", "o-1", "a", "x").unwrap();
        assert!(b[0].exists("o-1").unwrap());
        assert!(b[0].hexists("shop.orders", "o-1").unwrap());
        assert_eq!(store.get_row("o-1").unwrap().unwrap()["a"], "x");
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Order {
        item: String,
        qty: u32,
        paid: bool,
        ref_no: Option<String>,
    }

    #[test]
    fn typed_reads_use_hints() {
        let (store, _) = mirrored(1);
        store
            .insert_row(
                "shop",
                "orders",
                "1",
                &row(&[
                    ("item", Some("pen")),
                    ("qty", Some("3")),
                    ("paid", Some("true")),
                    ("ref_no", Some("0042")),
                ]),
            )
            .unwrap();
        store.hints().save("shop", "orders", "ref_no", FieldType::Text);

        let order: Order = store.get_row_as("shop", "orders", "1").unwrap().unwrap();
        assert_eq!(
            order,
            Order {
                item: "pen".into(),
                qty: 3,
                paid: true,
                ref_no: Some("0042".into()),
            }
        );
        let by_key: Order = store.get_row_key_as("orders.1").unwrap().unwrap();
        assert_eq!(by_key.qty, 3);
        assert!(store.get_row_as::<Order>("shop", "orders", "9").unwrap().is_none());

        let list: Vec<Order> = store.get_rows_list("shop", "orders").unwrap();
        assert_eq!(list.len(), 1);
    }
}
