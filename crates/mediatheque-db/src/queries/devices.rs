//! Device query operations.
//!
//! A device is a mountpoint with a stable uuid. Presence flips on
//! mount/unmount; absent devices hide their media from ordinary listings.

use mediatheque_common::{DeviceId, Error, Result};
use rusqlite::{params, Connection, Row};

use crate::models::Device;
use crate::pool::map_sqlite_err;

const DEVICE_COLS: &str = "id_device, uuid, scheme, is_removable, is_present, last_seen";

fn device_from_row(row: &Row) -> rusqlite::Result<Device> {
    Ok(Device {
        id: DeviceId::new(row.get(0)?),
        uuid: row.get(1)?,
        scheme: row.get(2)?,
        is_removable: row.get::<_, i64>(3)? != 0,
        is_present: row.get::<_, i64>(4)? != 0,
        last_seen: row.get(5)?,
    })
}

/// Create a device. Newly created devices are present.
pub fn create(conn: &Connection, uuid: &str, scheme: &str, is_removable: bool) -> Result<Device> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO device (uuid, scheme, is_removable, is_present, last_seen)
         VALUES (?, ?, ?, 1, ?)",
        params![uuid, scheme, is_removable as i64, now],
    )
    .map_err(map_sqlite_err)?;

    Ok(Device {
        id: DeviceId::new(conn.last_insert_rowid()),
        uuid: uuid.to_string(),
        scheme: scheme.to_string(),
        is_removable,
        is_present: true,
        last_seen: now,
    })
}

/// Get a device by id.
pub fn get(conn: &Connection, id: DeviceId) -> Result<Device> {
    conn.query_row(
        &format!("SELECT {} FROM device WHERE id_device = ?", DEVICE_COLS),
        [id.raw()],
        device_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("device #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find a device by its uuid.
pub fn from_uuid(conn: &Connection, uuid: &str) -> Result<Option<Device>> {
    match conn.query_row(
        &format!("SELECT {} FROM device WHERE uuid = ?", DEVICE_COLS),
        [uuid],
        device_from_row,
    ) {
        Ok(device) => Ok(Some(device)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Flip a device's presence. Refreshes `last_seen` when it comes back.
pub fn set_present(conn: &Connection, uuid: &str, present: bool) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let updated = if present {
        conn.execute(
            "UPDATE device SET is_present = 1, last_seen = ? WHERE uuid = ?",
            params![now, uuid],
        )
    } else {
        conn.execute("UPDATE device SET is_present = 0 WHERE uuid = ?", [uuid])
    }
    .map_err(map_sqlite_err)?;

    if updated == 0 {
        return Err(Error::not_found(format!("device {}", uuid)));
    }
    Ok(())
}
