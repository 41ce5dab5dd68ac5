//! SQLite-backed announcement store.
//!
//! Each chunk is written inside one transaction, so a chunk lands either
//! completely or not at all. The row shape is abstracted by [`SqlRow`], which
//! keeps the per-chunk writer independent of the announcement columns.

use countmein_db::DbPool;
use countmein_types::{AnnouncementRecord, ANNOUNCEMENT_TABLE, SIMULATOR_USER_ID};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter};

use crate::error::StoreError;
use crate::store::{is_plain_identifier, AnnouncementStore};

/// A value that maps onto one row of a SQL table.
pub trait SqlRow {
    /// Column names, in the order [`values`](Self::values) yields them.
    const COLUMNS: &'static [&'static str];

    /// Column values for this row.
    fn values(&self) -> Vec<Value>;
}

impl SqlRow for AnnouncementRecord {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "user_device_id",
        "user_device_type",
        "seen_device_id",
        "seen_device_type",
        "location_latitude",
        "location_longitude",
        "user_time",
        "server_time",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.user_id.clone()),
            Value::Text(self.user_device_id.clone()),
            Value::Text(self.user_device_type.clone()),
            Value::Text(self.seen_device_id.clone()),
            Value::Text(self.seen_device_type.clone()),
            Value::Real(self.location_latitude),
            Value::Real(self.location_longitude),
            Value::Integer(self.user_time),
            Value::Integer(self.server_time),
        ]
    }
}

/// Announcement store over a pooled SQLite database.
///
/// The count query always reads the migrated `announcement` table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Writes one chunk of any row shape in a single transaction.
    pub fn put_rows<R: SqlRow>(&self, table: &str, rows: &[R]) -> Result<(), StoreError> {
        if !is_plain_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }
        if rows.is_empty() {
            return Ok(());
        }

        let placeholders = (1..=R::COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            R::COLUMNS.join(", ")
        );

        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.values()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl AnnouncementStore for SqliteStore {
    fn put(&self, table: &str, rows: &[AnnouncementRecord]) -> Result<(), StoreError> {
        self.put_rows(table, rows)
    }

    fn count_distinct_devices(&self, since: i64) -> Result<i64, StoreError> {
        let sql = format!(
            "SELECT COUNT(DISTINCT seen_device_id) FROM {ANNOUNCEMENT_TABLE}
             WHERE user_time > ?1 AND user_id != ?2"
        );

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt.column_count();
        let mut rows = stmt.query(params![since, SIMULATOR_USER_ID])?;
        let row = rows.next()?.ok_or(StoreError::NoRows)?;

        if columns != 1 {
            return Err(StoreError::UnexpectedValue(format!(
                "expected 1 column, got {columns}"
            )));
        }

        match row.get_ref(0)? {
            ValueRef::Integer(count) => Ok(count),
            other => Err(StoreError::UnexpectedValue(format!(
                "expected an integer, got {}",
                other.data_type()
            ))),
        }
    }
}
