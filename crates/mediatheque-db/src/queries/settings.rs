//! Library settings singleton row.

use mediatheque_common::Result;
use rusqlite::Connection;

use crate::pool::map_sqlite_err;

/// The catalog schema version stored in the settings row.
pub fn db_model_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT db_model_version FROM settings", [], |row| row.get(0))
        .map_err(map_sqlite_err)
}

/// Record a new catalog schema version after a migration.
pub fn set_db_model_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute("UPDATE settings SET db_model_version = ?", [version])
        .map_err(map_sqlite_err)?;
    Ok(())
}
