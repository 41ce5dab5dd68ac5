//! In-memory announcement store.
//!
//! Keeps rows per table behind a mutex and records the size of every write
//! call, which makes chunking observable. A failure can be scheduled for a
//! given write call or for the count query to exercise error paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use countmein_types::{AnnouncementRecord, ANNOUNCEMENT_TABLE, SIMULATOR_USER_ID};

use crate::error::StoreError;
use crate::store::AnnouncementStore;

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<AnnouncementRecord>>,
    chunk_sizes: Vec<usize>,
    /// 1-based index of the write call that should fail.
    fail_put_on_call: Option<usize>,
    fail_count: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `call`-th write call (1-based) fails. The failing call
    /// writes nothing.
    pub fn failing_on_put(call: usize) -> Self {
        let store = Self::default();
        store.lock().fail_put_on_call = Some(call);
        store
    }

    /// A store whose count query always fails.
    pub fn failing_count() -> Self {
        let store = Self::default();
        store.lock().fail_count = true;
        store
    }

    /// Rows written to `table` so far, in write order.
    pub fn rows(&self, table: &str) -> Vec<AnnouncementRecord> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Size of every write call attempted so far, including a failed one.
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.lock().chunk_sizes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AnnouncementStore for MemoryStore {
    fn put(&self, table: &str, rows: &[AnnouncementRecord]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.chunk_sizes.push(rows.len());

        if state.fail_put_on_call == Some(state.chunk_sizes.len()) {
            return Err(StoreError::Unavailable(format!(
                "write call {} to '{table}' refused",
                state.chunk_sizes.len()
            )));
        }

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    fn count_distinct_devices(&self, since: i64) -> Result<i64, StoreError> {
        let state = self.lock();
        if state.fail_count {
            return Err(StoreError::Unavailable("count query refused".to_string()));
        }

        let distinct: HashSet<&str> = state
            .tables
            .get(ANNOUNCEMENT_TABLE)
            .into_iter()
            .flatten()
            .filter(|r| r.user_time > since && r.user_id != SIMULATOR_USER_ID)
            .map(|r| r.seen_device_id.as_str())
            .collect();

        Ok(distinct.len() as i64)
    }
}
