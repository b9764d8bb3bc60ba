use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use kvtab_backend::HashOp;
use kvtab_types::{require, FieldValues, PutMode, RData, RowKey, Stamp, TableId};

use crate::codec::RowCodec;
use crate::error::{TableError, TableResult};
use crate::options::UpdateOptions;
use crate::store::TableStore;

/// How a row write treats columns that already hold a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteKind {
    /// Set-if-absent: existing columns are left alone.
    Insert,
    /// Unconditional overwrite.
    Update(UpdateOptions),
}

impl<C: RowCodec> TableStore<C> {
    /// Write one column unless it already has a value. Returns 1 if
    /// written, else 0. A missing table is created on the fly.
    pub fn insert_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> TableResult<u64> {
        require("field", field)?;
        let fields = FieldValues::from([(field.to_string(), Some(value.to_string()))]);
        self.insert_row(database, table, id, &fields)
    }

    /// Write every column that does not have a value yet. Returns the
    /// number of columns written; `None` values count as 0.
    pub fn insert_row(&self, database: &str, table: &str, id: &str, fields: &FieldValues) -> TableResult<u64> {
        self.write_row(database, table, id, fields, WriteKind::Insert)
    }

    /// Insert the single column carried by `data`.
    pub fn insert_data(&self, database: &str, table: &str, data: &RData) -> TableResult<u64> {
        require("field", &data.field)?;
        let fields = FieldValues::from([(data.field.clone(), data.value.clone())]);
        self.insert_row(database, table, &data.key, &fields)
    }

    /// Insert every field of `value`.
    pub fn insert_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> TableResult<u64> {
        let fields = self.codec.encode(value)?;
        self.insert_row(database, table, id, &fields)
    }

    /// Overwrite one column.
    pub fn update_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> TableResult<u64> {
        require("field", field)?;
        let fields = FieldValues::from([(field.to_string(), Some(value.to_string()))]);
        self.update_row(database, table, id, &fields, UpdateOptions::default())
    }

    /// Overwrite columns. A `None` value deletes its column when
    /// `options.null_means_delete` is set. Returns the number of columns
    /// written or deleted.
    pub fn update_row(
        &self,
        database: &str,
        table: &str,
        id: &str,
        fields: &FieldValues,
        options: UpdateOptions,
    ) -> TableResult<u64> {
        self.write_row(database, table, id, fields, WriteKind::Update(options))
    }

    /// Overwrite the single column carried by `data`, honouring its expiry.
    pub fn update_data(&self, database: &str, table: &str, data: &RData) -> TableResult<u64> {
        require("field", &data.field)?;
        let fields = FieldValues::from([(data.field.clone(), data.value.clone())]);
        let options = UpdateOptions {
            expire_seconds: Some(data.expire_seconds),
            ..UpdateOptions::default()
        };
        self.update_row(database, table, &data.key, &fields, options)
    }

    /// Overwrite every field of `value`. `None` fields delete their column.
    pub fn update_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> TableResult<u64> {
        let fields = self.codec.encode(value)?;
        self.update_row(database, table, id, &fields, UpdateOptions::default())
    }

    pub fn save_field(&self, database: &str, table: &str, id: &str, field: &str, value: &str) -> TableResult<u64> {
        self.update_field(database, table, id, field, value)
    }

    pub fn save_row(
        &self,
        database: &str,
        table: &str,
        id: &str,
        fields: &FieldValues,
        options: UpdateOptions,
    ) -> TableResult<u64> {
        self.update_row(database, table, id, fields, options)
    }

    pub fn save_data(&self, database: &str, table: &str, data: &RData) -> TableResult<u64> {
        self.update_data(database, table, data)
    }

    pub fn save_object<T: Serialize>(&self, database: &str, table: &str, id: &str, value: &T) -> TableResult<u64> {
        self.update_object(database, table, id, value)
    }

    /// Apply a batch of column writes, each with its own [`PutMode`].
    ///
    /// All writes go out as one coordinator batch, so a mirrored store
    /// applies them in one transaction per shard. `OnlyIfPresent` is
    /// checked with a read just before the batch. Rows with
    /// `expire_seconds` get an expiry when at least one of their columns
    /// changed. Returns the number of columns changed.
    pub fn put(&self, database: &str, table: &str, batch: &[RData]) -> TableResult<u64> {
        require("database", database)?;
        require("table", table)?;
        if batch.is_empty() {
            return Ok(0);
        }
        for data in batch {
            require("row id", &data.key)?;
            require("field", &data.field)?;
        }
        let table_id = self.ensure_table(database, table)?;

        let mut ops = Vec::new();
        // (op position, row key, counts unconditionally)
        let mut tracked: Vec<(usize, RowKey, bool)> = Vec::new();
        let mut registered = BTreeSet::new();
        let mut expiring: BTreeMap<RowKey, u64> = BTreeMap::new();

        for data in batch {
            let row_key = self.row_key(table, &data.key);
            let op = match (&data.value, data.put_mode) {
                (None, _) => HashOp::delete(row_key.as_str(), data.field.as_str()),
                (Some(value), PutMode::Normal) => {
                    HashOp::set(row_key.as_str(), data.field.as_str(), value.as_str())
                }
                (Some(value), PutMode::OnlyIfAbsent) => {
                    HashOp::set_if_absent(row_key.as_str(), data.field.as_str(), value.as_str())
                }
                (Some(value), PutMode::OnlyIfPresent) => {
                    let present = self.coordinator.read(row_key.as_str(), "HEXISTS", |b| {
                        b.hexists(row_key.as_str(), &data.field)
                    })?;
                    if !present {
                        debug!(row = %row_key, field = %data.field, "put skipped: field absent");
                        continue;
                    }
                    HashOp::set(row_key.as_str(), data.field.as_str(), value.as_str())
                }
            };
            // Only rows that receive a value get registered.
            if data.value.is_some() && registered.insert(row_key.clone()) {
                let stamp = data.timestamp.unwrap_or_else(Stamp::now).render();
                ops.push(HashOp::set_if_absent(table_id.as_str(), row_key.as_str(), stamp));
            }
            if data.expire_seconds > 0 {
                expiring.insert(row_key.clone(), data.expire_seconds);
            }
            let unconditional = matches!(op, HashOp::Set { .. });
            tracked.push((ops.len(), row_key, unconditional));
            ops.push(op);
        }

        if ops.is_empty() {
            return Ok(0);
        }

        let replies = self.coordinator.write(&ops)?;
        let mut changed_rows = BTreeSet::new();
        let mut total = 0;
        for (position, row_key, unconditional) in tracked {
            let reply = replies.get(position).copied().unwrap_or(0);
            let changed = if unconditional { 1 } else { reply.max(0) as u64 };
            if changed > 0 {
                changed_rows.insert(row_key);
            }
            total += changed;
        }

        for (row_key, seconds) in expiring {
            if changed_rows.contains(&row_key) {
                self.expire_row(&row_key, seconds)?;
            }
        }
        Ok(total)
    }

    fn write_row(
        &self,
        database: &str,
        table: &str,
        id: &str,
        fields: &FieldValues,
        kind: WriteKind,
    ) -> TableResult<u64> {
        require("database", database)?;
        require("table", table)?;
        require("row id", id)?;
        if fields.is_empty() {
            return Err(TableError::InvalidArgument("no fields to write".into()));
        }
        for field in fields.keys() {
            require("field", field)?;
        }
        let table_id = self.ensure_table(database, table)?;
        let row_key = self.row_key(table, id);

        // A row that only loses columns is not registered.
        let registers = fields.values().any(Option::is_some);
        let mut ops = Vec::new();
        if registers {
            ops.push(self.register(&table_id, &row_key));
        }
        // Overwrites count as changed whatever the backend replies.
        let mut always_counts = Vec::new();
        for (field, value) in fields {
            let op = match (kind, value) {
                (WriteKind::Insert, Some(value)) => {
                    HashOp::set_if_absent(row_key.as_str(), field.as_str(), value.as_str())
                }
                (WriteKind::Update(_), Some(value)) => {
                    HashOp::set(row_key.as_str(), field.as_str(), value.as_str())
                }
                (WriteKind::Update(options), None) if options.null_means_delete => {
                    HashOp::delete(row_key.as_str(), field.as_str())
                }
                (_, None) => continue,
            };
            always_counts.push(matches!(op, HashOp::Set { .. }));
            ops.push(op);
        }

        let replies = self.coordinator.write(&ops)?;
        let changed: u64 = replies
            .iter()
            .skip(usize::from(registers))
            .zip(always_counts)
            .map(|(&reply, always)| if always { 1 } else { reply.max(0) as u64 })
            .sum();

        if let WriteKind::Update(UpdateOptions {
            expire_seconds: Some(seconds),
            ..
        }) = kind
        {
            if seconds > 0 && changed > 0 {
                self.expire_row(&row_key, seconds)?;
            }
        }
        Ok(changed)
    }

    fn register(&self, table_id: &TableId, row_key: &RowKey) -> HashOp {
        HashOp::set_if_absent(table_id.as_str(), row_key.as_str(), Stamp::now().render())
    }

    fn expire_row(&self, row_key: &RowKey, seconds: u64) -> TableResult<()> {
        let now = self.coordinator.server_time(row_key.as_str())?;
        let at = now.saturating_add(seconds.min(i64::MAX as u64) as i64);
        self.coordinator
            .write_one(HashOp::expire_at(row_key.as_str(), at))?;
        debug!(row = %row_key, expire_at = at, "row expiry set");
        Ok(())
    }
}
