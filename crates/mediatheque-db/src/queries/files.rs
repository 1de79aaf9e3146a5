//! File query operations.
//!
//! Files back media (Main/Part/Disc/...) or playlists. The mrl is unique
//! across the catalog; the analyzer relies on the constraint violation to
//! detect duplicate discoveries.

use mediatheque_common::{Error, FileId, FileType, FolderId, MediaId, PlaylistId, Result};
use rusqlite::{params, Connection, Row};

use crate::models::File;
use crate::pool::map_sqlite_err;

const FILE_COLS: &str = "id_file, media_id, playlist_id, mrl, type, last_modification_date, \
     size, is_removable, folder_id, is_external";

fn file_from_row(row: &Row) -> rusqlite::Result<File> {
    Ok(File {
        id: FileId::new(row.get(0)?),
        media_id: row.get::<_, Option<i64>>(1)?.map(MediaId::new),
        playlist_id: row.get::<_, Option<i64>>(2)?.map(PlaylistId::new),
        mrl: row.get(3)?,
        file_type: row.get::<_, String>(4)?.parse().unwrap_or(FileType::Main),
        last_modification_date: row.get(5)?,
        size: row.get(6)?,
        is_removable: row.get::<_, i64>(7)? != 0,
        folder_id: row.get::<_, Option<i64>>(8)?.map(FolderId::new),
        is_external: row.get::<_, i64>(9)? != 0,
    })
}

/// Create a file backing a media.
#[allow(clippy::too_many_arguments)]
pub fn create(
    conn: &Connection,
    media_id: MediaId,
    mrl: &str,
    file_type: FileType,
    folder_id: Option<FolderId>,
    is_removable: bool,
    size: i64,
    last_modification_date: i64,
) -> Result<File> {
    conn.execute(
        "INSERT INTO file (media_id, mrl, type, last_modification_date, size, is_removable,
            folder_id, is_external)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        params![
            media_id.raw(),
            mrl,
            file_type.to_string(),
            last_modification_date,
            size,
            is_removable as i64,
            folder_id.map(i64::from),
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(File {
        id: FileId::new(conn.last_insert_rowid()),
        media_id: Some(media_id),
        playlist_id: None,
        mrl: mrl.to_string(),
        file_type,
        last_modification_date,
        size,
        is_removable,
        folder_id,
        is_external: false,
    })
}

/// Create an external file for a media the library does not manage (e.g. a
/// playlist entry pointing to an unreachable mrl).
pub fn add_external(
    conn: &Connection,
    media_id: MediaId,
    mrl: &str,
    file_type: FileType,
) -> Result<File> {
    conn.execute(
        "INSERT INTO file (media_id, mrl, type, is_external) VALUES (?, ?, ?, 1)",
        params![media_id.raw(), mrl, file_type.to_string()],
    )
    .map_err(map_sqlite_err)?;

    Ok(File {
        id: FileId::new(conn.last_insert_rowid()),
        media_id: Some(media_id),
        playlist_id: None,
        mrl: mrl.to_string(),
        file_type,
        last_modification_date: 0,
        size: 0,
        is_removable: false,
        folder_id: None,
        is_external: true,
    })
}

/// Create the file a playlist was imported from.
pub fn create_playlist_file(
    conn: &Connection,
    playlist_id: PlaylistId,
    mrl: &str,
    folder_id: Option<FolderId>,
    is_removable: bool,
) -> Result<File> {
    conn.execute(
        "INSERT INTO file (playlist_id, mrl, type, is_removable, folder_id)
         VALUES (?, ?, ?, ?, ?)",
        params![
            playlist_id.raw(),
            mrl,
            FileType::Playlist.to_string(),
            is_removable as i64,
            folder_id.map(i64::from),
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(File {
        id: FileId::new(conn.last_insert_rowid()),
        media_id: None,
        playlist_id: Some(playlist_id),
        mrl: mrl.to_string(),
        file_type: FileType::Playlist,
        last_modification_date: 0,
        size: 0,
        is_removable,
        folder_id,
        is_external: false,
    })
}

/// Get a file by id.
pub fn get(conn: &Connection, id: FileId) -> Result<File> {
    conn.query_row(
        &format!("SELECT {} FROM file WHERE id_file = ?", FILE_COLS),
        [id.raw()],
        file_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("file #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find a file by mrl.
pub fn from_mrl(conn: &Connection, mrl: &str) -> Result<Option<File>> {
    match conn.query_row(
        &format!("SELECT {} FROM file WHERE mrl = ?", FILE_COLS),
        [mrl],
        file_from_row,
    ) {
        Ok(file) => Ok(Some(file)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// List the files backing a media.
pub fn for_media(conn: &Connection, media_id: MediaId) -> Result<Vec<File>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM file WHERE media_id = ? ORDER BY id_file",
            FILE_COLS
        ))
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([media_id.raw()], file_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}
