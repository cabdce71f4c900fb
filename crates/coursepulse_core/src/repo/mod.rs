//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate domain input before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`-shaped) in addition
//!   to DB transport errors.
//! - Multi-row mutations commit in a single transaction or not at all.

pub mod catalog_repo;
pub mod formation_repo;
pub mod publication_repo;
pub mod submission_repo;

use crate::db::DbResult;
use rusqlite::Connection;

/// Checks that a table exists in the connected schema.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Reads the applied schema version from `PRAGMA user_version`.
pub(crate) fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
