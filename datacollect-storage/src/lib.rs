//! Storage adapter contracts for the datacollect engine, with DuckDB and
//! SQLite reference implementations.
//!
//! # Architecture
//!
//! - The Entity Store holds the current-state projection (`EntityPair`,
//!   potential duplicates, external-id index) behind a per-guid striped
//!   lock.
//! - The Event Store holds the append-only event log, the audit trail
//!   derived from it, and the in-memory Merkle tree over the log, behind
//!   a single per-tenant lock.
//! - The Auth Store holds bearer tokens and the last-logged-in username,
//!   shared between the Auth Manager and the Internal Sync Coordinator.
//! - Each store is a thin wrapper around a `*StorageAdapter` trait;
//!   `DuckDb*`/`Sqlite*` are the reference implementations this engine
//!   ships, but a remote backend only has to implement the trait.

mod auth_store;
mod entity_store;
mod error;
mod event_store;
mod search;

pub use auth_store::{AuthStorageAdapter, SqliteAuthStore};
pub use entity_store::{DuckDbEntityStore, EntityStorageAdapter, EntityStore};
pub use error::{StorageError, StorageResult};
pub use event_store::{cursor_names, DuckDbEventStore, EventStorageAdapter, EventStore};
pub use search::{Criterion, Op, SearchQuery};

/// Open a DuckDB connection with stale WAL recovery.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is removed and the open is retried once. This handles the common case
/// where an unclean shutdown leaves a WAL file that prevents reopening.
pub fn open_duckdb_with_wal_recovery(path: &std::path::Path) -> StorageResult<duckdb::Connection> {
    match duckdb::Connection::open(path) {
        Ok(conn) => Ok(conn),
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                eprintln!(
                    "[WARN] DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    return duckdb::Connection::open(path).map_err(Into::into);
                }
            }
            Err(first_err.into())
        }
    }
}
