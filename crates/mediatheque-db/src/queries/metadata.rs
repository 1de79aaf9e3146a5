//! Typed key/value metadata attached to catalog entities.

use mediatheque_common::{MetadataEntityType, Result};
use rusqlite::{params, Connection};

use crate::pool::map_sqlite_err;

/// Set (or replace) one metadata value for an entity.
pub fn set(
    conn: &Connection,
    entity_id: i64,
    entity_type: MetadataEntityType,
    meta_type: u32,
    value: &str,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (entity_id, entity_type, type, value)
         VALUES (?, ?, ?, ?)",
        params![entity_id, entity_type.to_string(), meta_type, value],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Fetch one metadata value, if set.
pub fn get(
    conn: &Connection,
    entity_id: i64,
    entity_type: MetadataEntityType,
    meta_type: u32,
) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM metadata WHERE entity_id = ? AND entity_type = ? AND type = ?",
        params![entity_id, entity_type.to_string(), meta_type],
        |row| row.get(0),
    ) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// All metadata rows for an entity as (type, value) pairs.
pub fn all_for_entity(
    conn: &Connection,
    entity_id: i64,
    entity_type: MetadataEntityType,
) -> Result<Vec<(u32, String)>> {
    let mut stmt = conn
        .prepare("SELECT type, value FROM metadata WHERE entity_id = ? AND entity_type = ? ORDER BY type")
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map(params![entity_id, entity_type.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Remove one metadata value.
pub fn unset(
    conn: &Connection,
    entity_id: i64,
    entity_type: MetadataEntityType,
    meta_type: u32,
) -> Result<()> {
    conn.execute(
        "DELETE FROM metadata WHERE entity_id = ? AND entity_type = ? AND type = ?",
        params![entity_id, entity_type.to_string(), meta_type],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}
