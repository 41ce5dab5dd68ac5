//! Pooled SQLite connections.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Pool of connections to the announcement database.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection tunables taken from the `[database]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database before the storage
    /// call fails, in milliseconds.
    pub busy_timeout_ms: u64,

    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open announcement database pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool over the database at `db_path`, creating the file if needed.
///
/// Every connection is switched to WAL so count queries never wait on
/// ingest writes. `:memory:` gives each connection a private database, so
/// use `pool_max_size = 1` to share one.
///
/// # Errors
///
/// `PoolError::PoolInit` if the initial connections cannot be opened or
/// configured.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| configure(conn, settings));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_size = settings.pool_max_size,
        "opened announcement database pool"
    );
    Ok(pool)
}

fn configure(conn: &Connection, settings: DbRuntimeSettings) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    // SQLite keeps in-memory databases in "memory" mode regardless.
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            Some(format!("journal_mode stayed {mode:?} instead of WAL")),
        ));
    }

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
}
