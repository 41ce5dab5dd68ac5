//! Database layer for countmein.
//!
//! [`create_pool`] opens an `r2d2` pool of WAL-mode SQLite connections;
//! every request borrows one for the duration of a single storage call.
//! [`run_migrations`] brings the `announcement` table and its `user_time`
//! index up to date, tracking progress in SQLite's `user_version`. The SQL
//! is compiled in with `include_str!`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
