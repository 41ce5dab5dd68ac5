//! The storage capability the ingest pipeline writes through.
//!
//! Backends implement two operations: a single bounded write call
//! ([`AnnouncementStore::put`]) and the distinct-device aggregate. Chunking
//! lives in the provided [`AnnouncementStore::insert`] so every backend
//! splits batches the same way.

use countmein_types::AnnouncementRecord;

use crate::batch::write_chunks;
use crate::error::StoreError;

/// Count reported alongside an error when the aggregate is unavailable.
pub const COUNT_UNAVAILABLE: i64 = -1;

/// An append-only announcement table store.
///
/// Implementations are shared across concurrent requests and must do their
/// own write serialisation.
pub trait AnnouncementStore: Send + Sync {
    /// Writes one chunk of rows to `table` in a single backend call.
    ///
    /// Callers keep chunks within the backend's per-call limit; use
    /// [`insert`](Self::insert) for arbitrary batch sizes.
    fn put(&self, table: &str, rows: &[AnnouncementRecord]) -> Result<(), StoreError>;

    /// Counts distinct `seen_device_id` values over records with
    /// `user_time > since`, ignoring records from the simulator user.
    ///
    /// # Errors
    ///
    /// Fails if the query fails, yields no row, or yields anything other
    /// than a single integer. A zero count is never substituted for an
    /// error.
    fn count_distinct_devices(&self, since: i64) -> Result<i64, StoreError>;

    /// Writes `rows` to `table` in chunks (99 rows, then 100 per call).
    ///
    /// # Errors
    ///
    /// Returns the first chunk failure. Earlier chunks are not rolled back.
    fn insert(&self, table: &str, rows: &[AnnouncementRecord]) -> Result<(), StoreError> {
        write_chunks(table, rows, |table, chunk| self.put(table, chunk))
    }
}

/// Returns `true` when `name` can be spliced into SQL as a table name.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
