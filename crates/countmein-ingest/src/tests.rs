//! Unit tests for the stores and the ingest pipeline.

use std::io;
use std::sync::{Arc, Mutex};

use countmein_db::{create_pool, run_migrations, DbRuntimeSettings};
use countmein_types::{
    Announcement, AnnouncementRecord, Device, ANNOUNCEMENT_TABLE, SIMULATOR_USER_ID,
};

use crate::error::{IngestError, StoreError};
use crate::memory::MemoryStore;
use crate::record::to_record_at;
use crate::service::Ingestor;
use crate::sqlite::SqliteStore;
use crate::store::AnnouncementStore;
use crate::validate::{ValidationError, ValidationPolicy};

/// A single-connection in-memory database with migrations applied.
fn sqlite_store() -> SqliteStore {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
    }
    SqliteStore::new(pool)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn announcement(user: &str, seen: &str, time: i64) -> Announcement {
    Announcement {
        user_id: user.to_string(),
        user_device: Device::new(format!("{user}-phone"), "iphone 14"),
        seen_device: Device::new(seen, "pixel 8"),
        time,
        ..Default::default()
    }
}

fn record(user: &str, seen: &str, time: i64) -> AnnouncementRecord {
    to_record_at(announcement(user, seen, time), time)
}

fn row_count(store: &SqliteStore) -> i64 {
    let conn = store.pool().get().expect("should get connection");
    conn.query_row("SELECT COUNT(*) FROM announcement", [], |row| row.get(0))
        .expect("should count rows")
}

fn ingestor(store: Arc<dyn AnnouncementStore>) -> Ingestor {
    Ingestor::new(
        store,
        ValidationPolicy::default(),
        tracing::info_span!("ingest"),
    )
}

// ── SqliteStore ──────────────────────────────────────────────────────

#[test]
fn sqlite_put_persists_every_column() {
    let store = sqlite_store();
    let mut rec = record("alice", "dev-9", 1_700_000_000);
    rec.location_latitude = 32.0577;
    rec.location_longitude = 34.7664;

    store.put(ANNOUNCEMENT_TABLE, &[rec.clone()]).expect("put should succeed");

    let conn = store.pool().get().unwrap();
    let stored = conn
        .query_row(
            "SELECT id, user_id, user_device_id, user_device_type, seen_device_id,
                    seen_device_type, location_latitude, location_longitude,
                    user_time, server_time
             FROM announcement",
            [],
            |row| {
                Ok(AnnouncementRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    user_device_id: row.get(2)?,
                    user_device_type: row.get(3)?,
                    seen_device_id: row.get(4)?,
                    seen_device_type: row.get(5)?,
                    location_latitude: row.get(6)?,
                    location_longitude: row.get(7)?,
                    user_time: row.get(8)?,
                    server_time: row.get(9)?,
                })
            },
        )
        .expect("should read stored row");

    assert_eq!(stored, rec);
}

#[test]
fn sqlite_insert_writes_large_batches() {
    let store = sqlite_store();
    let records: Vec<_> = (0..250)
        .map(|i| record("alice", &format!("dev-{i}"), 1_700_000_000))
        .collect();

    store.insert(ANNOUNCEMENT_TABLE, &records).expect("insert should succeed");
    assert_eq!(row_count(&store), 250);
}

#[test]
fn sqlite_chunk_is_atomic() {
    let store = sqlite_store();
    let first = record("alice", "dev-1", 1_700_000_000);
    store.put(ANNOUNCEMENT_TABLE, &[first.clone()]).unwrap();

    // The second row collides on the primary key, so the whole chunk fails.
    let chunk = vec![record("bob", "dev-2", 1_700_000_000), first];
    let err = store.put(ANNOUNCEMENT_TABLE, &chunk).unwrap_err();
    assert!(matches!(err, StoreError::Database(_)), "got {err:?}");
    assert_eq!(row_count(&store), 1, "failed chunk should leave no rows");
}

#[test]
fn sqlite_rejects_non_identifier_table() {
    let store = sqlite_store();
    let err = store
        .put("announcement; DROP TABLE announcement", &[record("a", "b", 1)])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTable(_)));
    assert_eq!(row_count(&store), 0);
}

#[test]
fn sqlite_put_to_missing_table_fails() {
    let store = sqlite_store();
    let err = store.put("nowhere", &[record("a", "b", 1)]).unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}

#[test]
fn sqlite_count_distinct_seen_devices_after_since() {
    let store = sqlite_store();
    let records = vec![
        record("alice", "dev-1", 1_000),
        record("bob", "dev-1", 1_001),
        record("bob", "dev-2", 1_002),
        // At `since` exactly: excluded.
        record("carol", "dev-3", 900),
        record("carol", "dev-4", 500),
    ];
    store.insert(ANNOUNCEMENT_TABLE, &records).unwrap();

    assert_eq!(store.count_distinct_devices(900).unwrap(), 2);
    assert_eq!(store.count_distinct_devices(499).unwrap(), 4);
    assert_eq!(store.count_distinct_devices(2_000).unwrap(), 0);
}

#[test]
fn sqlite_count_excludes_simulator_traffic() {
    let store = sqlite_store();
    let records = vec![
        record("alice", "dev-1", 1_000),
        record(SIMULATOR_USER_ID, "sim-1", 1_000),
        record(SIMULATOR_USER_ID, "sim-2", 1_000),
        record(SIMULATOR_USER_ID, "sim-3", 5_000),
    ];
    store.insert(ANNOUNCEMENT_TABLE, &records).unwrap();

    assert_eq!(store.count_distinct_devices(0).unwrap(), 1);
}

#[test]
fn sqlite_count_against_missing_table_is_an_error() {
    let store = sqlite_store();
    store
        .pool()
        .get()
        .unwrap()
        .execute_batch("DROP TABLE announcement")
        .unwrap();
    let err = store.count_distinct_devices(0).unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}

// ── MemoryStore ──────────────────────────────────────────────────────

#[test]
fn memory_insert_records_chunk_sizes() {
    for (len, expected) in [
        (99, vec![99]),
        (100, vec![99, 1]),
        (150, vec![99, 51]),
    ] {
        let store = MemoryStore::new();
        let records: Vec<_> = (0..len).map(|i| record("u", &format!("d{i}"), 1)).collect();

        store.insert(ANNOUNCEMENT_TABLE, &records).unwrap();

        assert_eq!(store.chunk_sizes(), expected, "batch of {len}");
        assert_eq!(store.rows(ANNOUNCEMENT_TABLE), records);
    }
}

#[test]
fn memory_failure_keeps_earlier_chunks_only() {
    let store = MemoryStore::failing_on_put(2);
    let records: Vec<_> = (0..250).map(|i| record("u", &format!("d{i}"), 1)).collect();

    let err = store.insert(ANNOUNCEMENT_TABLE, &records).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert_eq!(store.chunk_sizes(), [99, 100], "third chunk is never attempted");
    assert_eq!(store.rows(ANNOUNCEMENT_TABLE), records[..99]);
}

#[test]
fn memory_count_matches_sqlite_semantics() {
    let store = MemoryStore::new();
    let records = vec![
        record("alice", "dev-1", 1_000),
        record("bob", "dev-1", 1_001),
        record(SIMULATOR_USER_ID, "sim-1", 1_001),
        record("carol", "dev-2", 10),
    ];
    store.insert(ANNOUNCEMENT_TABLE, &records).unwrap();

    assert_eq!(store.count_distinct_devices(10).unwrap(), 1);
    assert_eq!(store.count_distinct_devices(9).unwrap(), 2);
}

// ── Ingestor ─────────────────────────────────────────────────────────

#[test]
fn ingest_writes_valid_batch() {
    let store = Arc::new(MemoryStore::new());
    let start = now();

    let written = ingestor(store.clone())
        .ingest(vec![
            announcement("alice", "dev-1", start),
            announcement("bob", "dev-2", start),
        ])
        .expect("ingest should succeed");

    assert_eq!(written, 2);
    let rows = store.rows(ANNOUNCEMENT_TABLE);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.id.is_empty() && r.server_time >= start));
    assert_ne!(rows[0].id, rows[1].id);
}

#[test]
fn ingest_rejects_whole_batch_on_one_bad_record() {
    for bad_index in [0, 4, 9] {
        let store = Arc::new(MemoryStore::new());
        let mut batch: Vec<_> = (0..10)
            .map(|i| announcement("alice", &format!("dev-{i}"), now()))
            .collect();
        batch[bad_index].time = 0;

        let err = ingestor(store.clone()).ingest(batch).unwrap_err();

        match err {
            IngestError::Rejected(rejection) => {
                assert_eq!(rejection.index, bad_index);
                assert!(matches!(
                    rejection.reason,
                    ValidationError::TimeOutOfRange { time: 0, .. }
                ));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(store.chunk_sizes().is_empty(), "no write call expected");
    }
}

#[test]
fn ingest_surfaces_store_failure() {
    let store = Arc::new(MemoryStore::failing_on_put(1));
    let batch = (0..3)
        .map(|i| announcement("alice", &format!("dev-{i}"), now()))
        .collect();

    let err = ingestor(store.clone()).ingest(batch).unwrap_err();

    assert!(matches!(err, IngestError::Persist(StoreError::Unavailable(_))));
    assert!(store.rows(ANNOUNCEMENT_TABLE).is_empty());
}

#[test]
fn ingest_into_sqlite_then_count() {
    let store = Arc::new(sqlite_store());
    let ingestor = ingestor(store.clone());
    let t = now();

    ingestor
        .ingest(vec![
            announcement("alice", "dev-1", t),
            announcement("bob", "dev-1", t),
            announcement("bob", "dev-2", t),
            announcement(SIMULATOR_USER_ID, "sim-1", t),
        ])
        .unwrap();

    assert_eq!(row_count(&store), 4);
    assert_eq!(ingestor.count_distinct_devices(t - 1).unwrap(), 2);
    assert_eq!(ingestor.count_distinct_devices(t).unwrap(), 0);
}

#[test]
fn ingested_rows_are_visible_to_the_count_for_every_store() {
    let stores: [Arc<dyn AnnouncementStore>; 2] =
        [Arc::new(sqlite_store()), Arc::new(MemoryStore::new())];
    let t = now();

    for store in stores {
        let ingestor = ingestor(store);
        let written = ingestor
            .ingest(vec![
                announcement("alice", "dev-1", t),
                announcement("bob", "dev-2", t),
            ])
            .expect("ingest should succeed");

        assert_eq!(written, 2);
        assert_eq!(ingestor.count_distinct_devices(t - 1).unwrap(), 2);
    }
}

#[test]
fn count_failure_is_not_defaulted() {
    let ingestor = ingestor(Arc::new(MemoryStore::failing_count()));
    assert!(ingestor.count_distinct_devices(0).is_err());
}

// ── Diagnostics ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn rejection_detail_goes_to_the_injected_span() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let ingestor = Ingestor::new(
            Arc::new(MemoryStore::new()),
            ValidationPolicy::default(),
            tracing::info_span!("ingest_under_test"),
        );
        let mut bad = announcement("mallory", "dev-1", now());
        bad.seen_device.id = "x".repeat(49);
        assert!(ingestor.ingest(vec![bad]).is_err());
    });

    let output = logs.contents();
    assert!(output.contains("ingest_under_test"), "logs: {output}");
    assert!(output.contains("seen_device_id"), "logs: {output}");
    assert!(output.contains("mallory"), "logs: {output}");
}
