//! Folder query operations.

use mediatheque_common::{DeviceId, Error, FolderId, Result};
use rusqlite::{params, Connection, Row};

use crate::models::Folder;
use crate::pool::map_sqlite_err;

const FOLDER_COLS: &str = "id_folder, path, parent_id, device_id, is_removable";

fn folder_from_row(row: &Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId::new(row.get(0)?),
        path: row.get(1)?,
        parent_id: row.get::<_, Option<i64>>(2)?.map(FolderId::new),
        device_id: row.get::<_, Option<i64>>(3)?.map(DeviceId::new),
        is_removable: row.get::<_, i64>(4)? != 0,
    })
}

/// Create a folder.
pub fn create(
    conn: &Connection,
    path: &str,
    parent_id: Option<FolderId>,
    device_id: Option<DeviceId>,
    is_removable: bool,
) -> Result<Folder> {
    conn.execute(
        "INSERT INTO folder (path, parent_id, device_id, is_removable) VALUES (?, ?, ?, ?)",
        params![
            path,
            parent_id.map(i64::from),
            device_id.map(i64::from),
            is_removable as i64,
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(Folder {
        id: FolderId::new(conn.last_insert_rowid()),
        path: path.to_string(),
        parent_id,
        device_id,
        is_removable,
    })
}

/// Get a folder by id.
pub fn get(conn: &Connection, id: FolderId) -> Result<Folder> {
    conn.query_row(
        &format!("SELECT {} FROM folder WHERE id_folder = ?", FOLDER_COLS),
        [id.raw()],
        folder_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("folder #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find a folder by path.
pub fn from_path(conn: &Connection, path: &str) -> Result<Option<Folder>> {
    match conn.query_row(
        &format!("SELECT {} FROM folder WHERE path = ?", FOLDER_COLS),
        [path],
        folder_from_row,
    ) {
        Ok(folder) => Ok(Some(folder)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Whether the folder's device is currently present. Folders without a
/// device (non-removable storage) are always present.
pub fn is_present(conn: &Connection, id: FolderId) -> Result<bool> {
    conn.query_row(
        "SELECT CASE WHEN f.device_id IS NULL THEN 1 ELSE d.is_present END
         FROM folder f
         LEFT JOIN device d ON d.id_device = f.device_id
         WHERE f.id_folder = ?",
        [id.raw()],
        |row| row.get::<_, i64>(0).map(|v| v != 0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("folder #{}", id)),
        _ => map_sqlite_err(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::devices;

    #[test]
    fn test_create_and_lookup() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let root = create(&conn, "/music", None, None, false).unwrap();
        let sub = create(&conn, "/music/a", Some(root.id), None, false).unwrap();

        assert_eq!(get(&conn, sub.id).unwrap().parent_id, Some(root.id));
        assert_eq!(from_path(&conn, "/music").unwrap(), Some(root));
        assert!(from_path(&conn, "/videos").unwrap().is_none());
    }

    #[test]
    fn test_presence_follows_device() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let local = create(&conn, "/music", None, None, false).unwrap();
        assert!(is_present(&conn, local.id).unwrap());

        let dev = devices::create(&conn, "sd-1", "file://", true).unwrap();
        let removable = create(&conn, "/mnt/sd", None, Some(dev.id), true).unwrap();
        assert!(is_present(&conn, removable.id).unwrap());

        devices::set_present(&conn, "sd-1", false).unwrap();
        assert!(!is_present(&conn, removable.id).unwrap());
    }
}
