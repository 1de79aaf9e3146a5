//! Artist query operations.
//!
//! Rows 1 and 2 are reserved: the unknown-artist and various-artists
//! sentinels, provisioned by the initial migration with a NULL name.

use mediatheque_common::{ArtistId, Error, MediaId, Result};
use rusqlite::{params, Connection, Row};

use crate::models::Artist;
use crate::pool::map_sqlite_err;

const ARTIST_COLS: &str = "id_artist, name, thumbnail_id, nb_tracks";

fn artist_from_row(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: ArtistId::new(row.get(0)?),
        name: row.get(1)?,
        thumbnail_id: row
            .get::<_, Option<i64>>(2)?
            .map(mediatheque_common::ThumbnailId::new),
        nb_tracks: row.get(3)?,
    })
}

/// Create an artist.
pub fn create(conn: &Connection, name: &str) -> Result<Artist> {
    conn.execute("INSERT INTO artist (name) VALUES (?)", [name])
        .map_err(map_sqlite_err)?;

    Ok(Artist {
        id: ArtistId::new(conn.last_insert_rowid()),
        name: Some(name.to_string()),
        thumbnail_id: None,
        nb_tracks: 0,
    })
}

/// Get an artist by id.
pub fn get(conn: &Connection, id: ArtistId) -> Result<Artist> {
    conn.query_row(
        &format!("SELECT {} FROM artist WHERE id_artist = ?", ARTIST_COLS),
        [id.raw()],
        artist_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("artist #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find an artist by name.
pub fn from_name(conn: &Connection, name: &str) -> Result<Option<Artist>> {
    match conn.query_row(
        &format!("SELECT {} FROM artist WHERE name = ?", ARTIST_COLS),
        [name],
        artist_from_row,
    ) {
        Ok(artist) => Ok(Some(artist)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Adjust an artist's track counter by `delta`.
pub fn update_nb_tracks(conn: &Connection, id: ArtistId, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE artist SET nb_tracks = nb_tracks + ? WHERE id_artist = ?",
        params![delta, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Add a media to the artist's media set.
pub fn add_media(conn: &Connection, id: ArtistId, media_id: MediaId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO media_artist_relation (media_id, artist_id) VALUES (?, ?)",
        params![media_id.raw(), id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// List the media attached to an artist.
pub fn media(conn: &Connection, id: ArtistId) -> Result<Vec<MediaId>> {
    let mut stmt = conn
        .prepare(
            "SELECT media_id FROM media_artist_relation WHERE artist_id = ? ORDER BY media_id",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([id.raw()], |row| row.get::<_, i64>(0).map(MediaId::new))
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Full-text name search over the artist FTS mirror.
pub fn search(conn: &Connection, pattern: &str) -> Result<Vec<Artist>> {
    let fts_query = format!("{}*", pattern);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM artist
             WHERE id_artist IN (SELECT rowid FROM artist_fts WHERE artist_fts MATCH ?)
             ORDER BY id_artist",
            ARTIST_COLS
        ))
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([fts_query], artist_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}
