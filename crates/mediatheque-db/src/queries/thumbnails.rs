//! Thumbnail query operations.
//!
//! Thumbnail rows are shared by media, albums, and artists; trigger-driven
//! cleanup removes a row once its last referent is deleted.

use mediatheque_common::{
    AlbumId, ArtistId, Error, MediaId, Result, ThumbnailId, ThumbnailOrigin,
};
use rusqlite::{params, Connection, Row};

use crate::models::Thumbnail;
use crate::pool::map_sqlite_err;

fn thumbnail_from_row(row: &Row) -> rusqlite::Result<Thumbnail> {
    Ok(Thumbnail {
        id: ThumbnailId::new(row.get(0)?),
        mrl: row.get(1)?,
        origin: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(ThumbnailOrigin::UserProvided),
        is_generated: row.get::<_, i64>(3)? != 0,
    })
}

/// Create a thumbnail row.
pub fn create(
    conn: &Connection,
    mrl: &str,
    origin: ThumbnailOrigin,
    is_generated: bool,
) -> Result<Thumbnail> {
    conn.execute(
        "INSERT INTO thumbnail (mrl, origin, is_generated) VALUES (?, ?, ?)",
        params![mrl, origin.to_string(), is_generated as i64],
    )
    .map_err(map_sqlite_err)?;

    Ok(Thumbnail {
        id: ThumbnailId::new(conn.last_insert_rowid()),
        mrl: mrl.to_string(),
        origin,
        is_generated,
    })
}

/// Get a thumbnail by id.
pub fn get(conn: &Connection, id: ThumbnailId) -> Result<Thumbnail> {
    conn.query_row(
        "SELECT id_thumbnail, mrl, origin, is_generated FROM thumbnail WHERE id_thumbnail = ?",
        [id.raw()],
        thumbnail_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("thumbnail #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Create a thumbnail and attach it to a media.
pub fn set_media_thumbnail(
    conn: &Connection,
    media_id: MediaId,
    mrl: &str,
    origin: ThumbnailOrigin,
    is_generated: bool,
) -> Result<Thumbnail> {
    let thumbnail = create(conn, mrl, origin, is_generated)?;
    conn.execute(
        "UPDATE media SET thumbnail_id = ? WHERE id_media = ?",
        params![thumbnail.id.raw(), media_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(thumbnail)
}

/// Create a thumbnail and attach it to an album.
pub fn set_album_thumbnail(
    conn: &Connection,
    album_id: AlbumId,
    mrl: &str,
    origin: ThumbnailOrigin,
) -> Result<Thumbnail> {
    let thumbnail = create(conn, mrl, origin, false)?;
    conn.execute(
        "UPDATE album SET thumbnail_id = ? WHERE id_album = ?",
        params![thumbnail.id.raw(), album_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(thumbnail)
}

/// Create a thumbnail and attach it to an artist.
pub fn set_artist_thumbnail(
    conn: &Connection,
    artist_id: ArtistId,
    mrl: &str,
    origin: ThumbnailOrigin,
) -> Result<Thumbnail> {
    let thumbnail = create(conn, mrl, origin, false)?;
    conn.execute(
        "UPDATE artist SET thumbnail_id = ? WHERE id_artist = ?",
        params![thumbnail.id.raw(), artist_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(thumbnail)
}

/// The thumbnail currently attached to a media, if any.
pub fn for_media(conn: &Connection, media_id: MediaId) -> Result<Option<Thumbnail>> {
    match conn.query_row(
        "SELECT t.id_thumbnail, t.mrl, t.origin, t.is_generated FROM thumbnail t
         INNER JOIN media m ON m.thumbnail_id = t.id_thumbnail
         WHERE m.id_media = ?",
        [media_id.raw()],
        thumbnail_from_row,
    ) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// The thumbnail currently attached to an album, if any.
pub fn for_album(conn: &Connection, album_id: AlbumId) -> Result<Option<Thumbnail>> {
    match conn.query_row(
        "SELECT t.id_thumbnail, t.mrl, t.origin, t.is_generated FROM thumbnail t
         INNER JOIN album a ON a.thumbnail_id = t.id_thumbnail
         WHERE a.id_album = ?",
        [album_id.raw()],
        thumbnail_from_row,
    ) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// The thumbnail currently attached to an artist, if any.
pub fn for_artist(conn: &Connection, artist_id: ArtistId) -> Result<Option<Thumbnail>> {
    match conn.query_row(
        "SELECT t.id_thumbnail, t.mrl, t.origin, t.is_generated FROM thumbnail t
         INNER JOIN artist a ON a.thumbnail_id = t.id_thumbnail
         WHERE a.id_artist = ?",
        [artist_id.raw()],
        thumbnail_from_row,
    ) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}
