//! Schema upgrades.
//!
//! The schema version lives in SQLite's `user_version` header field. Step
//! `n` of [`SCHEMA`] upgrades a database from version `n` to `n + 1`, and
//! each step commits together with its version bump.

use rusqlite::Connection;
use thiserror::Error;

/// Upgrade steps, oldest first. Only ever append.
const SCHEMA: &[&str] = &[include_str!("migrations/v1_announcement.sql")];

/// Errors raised while bringing a database up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The upgrade to `version` failed and was rolled back.
    #[error("schema upgrade to version {version} failed: {source}")]
    Step {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// `user_version` could not be read.
    #[error("failed to read schema version: {0}")]
    Version(#[source] rusqlite::Error),

    /// The file was written by a build that knows more steps than this one.
    #[error("database schema version {found} is newer than supported version {supported}")]
    TooNew { found: u32, supported: u32 },
}

/// Upgrades the database behind `conn` to the current schema.
///
/// Returns how many upgrade steps ran; zero when already current.
///
/// # Errors
///
/// See [`MigrationError`]. A failed step leaves the database at the last
/// version that committed.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    upgrade(conn, SCHEMA)
}

fn upgrade(conn: &Connection, steps: &[&str]) -> Result<usize, MigrationError> {
    let found: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(MigrationError::Version)?;
    let supported = steps.len() as u32;

    if found > supported {
        return Err(MigrationError::TooNew { found, supported });
    }

    for (version, sql) in (found + 1..).zip(&steps[found as usize..]) {
        let step = |source| MigrationError::Step { version, source };

        // Dropping the transaction on error rolls the step back.
        let tx = conn.unchecked_transaction().map_err(step)?;
        tx.execute_batch(sql).map_err(step)?;
        tx.pragma_update(None, "user_version", version).map_err(step)?;
        tx.commit().map_err(step)?;

        tracing::info!(version, "upgraded announcement schema");
    }

    Ok((supported - found) as usize)
}
