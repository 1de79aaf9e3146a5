//! Album query operations.
//!
//! Albums are resolved and linked by the metadata analyzer. An album with a
//! NULL title is an artist's "unknown album" bucket, holding tracks whose
//! tags name no album.

use mediatheque_common::{
    AlbumId, AlbumTrackId, ArtistId, Error, GenreId, MediaId, MediaSubType, Result, ThumbnailId,
};
use rusqlite::{params, Connection, Row};

use crate::models::{Album, AlbumTrack};
use crate::pool::map_sqlite_err;
use crate::queries::media;

const ALBUM_COLS: &str = "id_album, title, artist_id, release_year, thumbnail_id, nb_tracks, \
     duration";

fn album_from_row(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: AlbumId::new(row.get(0)?),
        title: row.get(1)?,
        artist_id: row.get::<_, Option<i64>>(2)?.map(ArtistId::new),
        release_year: row.get(3)?,
        thumbnail_id: row.get::<_, Option<i64>>(4)?.map(ThumbnailId::new),
        nb_tracks: row.get(5)?,
        duration: row.get(6)?,
    })
}

fn track_from_row(row: &Row) -> rusqlite::Result<AlbumTrack> {
    Ok(AlbumTrack {
        id: AlbumTrackId::new(row.get(0)?),
        media_id: MediaId::new(row.get(1)?),
        album_id: AlbumId::new(row.get(2)?),
        artist_id: ArtistId::new(row.get(3)?),
        genre_id: row.get::<_, Option<i64>>(4)?.map(GenreId::new),
        track_number: row.get(5)?,
        disc_number: row.get(6)?,
        duration: row.get(7)?,
    })
}

/// Create an album.
pub fn create(
    conn: &Connection,
    title: Option<&str>,
    thumbnail_id: Option<ThumbnailId>,
) -> Result<Album> {
    conn.execute(
        "INSERT INTO album (title, thumbnail_id) VALUES (?, ?)",
        params![title, thumbnail_id.map(i64::from)],
    )
    .map_err(map_sqlite_err)?;

    Ok(Album {
        id: AlbumId::new(conn.last_insert_rowid()),
        title: title.map(str::to_string),
        artist_id: None,
        release_year: None,
        thumbnail_id,
        nb_tracks: 0,
        duration: 0,
    })
}

/// Get an album by id.
pub fn get(conn: &Connection, id: AlbumId) -> Result<Album> {
    conn.query_row(
        &format!("SELECT {} FROM album WHERE id_album = ?", ALBUM_COLS),
        [id.raw()],
        album_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("album #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// All albums sharing a title, in insertion order. Disambiguation between
/// them is the analyzer's job.
pub fn all_by_title(conn: &Connection, title: &str) -> Result<Vec<Album>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM album WHERE title = ? ORDER BY id_album",
            ALBUM_COLS
        ))
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([title], album_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Fetch or create the artist's unknown-album bucket.
pub fn unknown_album(conn: &Connection, artist_id: ArtistId) -> Result<Album> {
    match conn.query_row(
        &format!(
            "SELECT {} FROM album WHERE artist_id = ? AND title IS NULL",
            ALBUM_COLS
        ),
        [artist_id.raw()],
        album_from_row,
    ) {
        Ok(album) => Ok(album),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            conn.execute(
                "INSERT INTO album (title, artist_id) VALUES (NULL, ?)",
                [artist_id.raw()],
            )
            .map_err(map_sqlite_err)?;
            Ok(Album {
                id: AlbumId::new(conn.last_insert_rowid()),
                title: None,
                artist_id: Some(artist_id),
                release_year: None,
                thumbnail_id: None,
                nb_tracks: 0,
                duration: 0,
            })
        }
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Key a media into the album. Updates the album's track/duration counters
/// and flips the media's sub-type to AlbumTrack.
#[allow(clippy::too_many_arguments)]
pub fn add_track(
    conn: &Connection,
    album_id: AlbumId,
    media_id: MediaId,
    artist_id: ArtistId,
    genre_id: Option<GenreId>,
    track_number: i64,
    disc_number: i64,
    duration: i64,
) -> Result<AlbumTrack> {
    conn.execute(
        "INSERT INTO album_track (media_id, album_id, artist_id, genre_id, track_number,
            disc_number, duration)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            media_id.raw(),
            album_id.raw(),
            artist_id.raw(),
            genre_id.map(i64::from),
            track_number,
            disc_number,
            duration,
        ],
    )
    .map_err(map_sqlite_err)?;
    let id = AlbumTrackId::new(conn.last_insert_rowid());

    conn.execute(
        "UPDATE album SET nb_tracks = nb_tracks + 1, duration = duration + ?
         WHERE id_album = ?",
        params![duration.max(0), album_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    media::set_sub_type(conn, media_id, MediaSubType::AlbumTrack)?;

    Ok(AlbumTrack {
        id,
        media_id,
        album_id,
        artist_id,
        genre_id,
        track_number,
        disc_number,
        duration,
    })
}

/// The album's tracks, in disc/track order.
pub fn tracks(conn: &Connection, album_id: AlbumId) -> Result<Vec<AlbumTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT id_track, media_id, album_id, artist_id, genre_id, track_number,
                disc_number, duration
             FROM album_track WHERE album_id = ?
             ORDER BY disc_number, track_number, id_track",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([album_id.raw()], track_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// The album-track row keyed by a media, if any.
pub fn track_for_media(conn: &Connection, media_id: MediaId) -> Result<Option<AlbumTrack>> {
    match conn.query_row(
        "SELECT id_track, media_id, album_id, artist_id, genre_id, track_number,
            disc_number, duration
         FROM album_track WHERE media_id = ?",
        [media_id.raw()],
        track_from_row,
    ) {
        Ok(track) => Ok(Some(track)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Per-track facts the analyzer's disambiguation needs: disc number, track
/// artist, and the mrl of the backing main file.
pub struct CandidateTrack {
    pub disc_number: i64,
    pub artist_id: ArtistId,
    pub file_mrl: Option<String>,
}

/// Compact per-track view of an album for disambiguation.
pub fn candidate_tracks(conn: &Connection, album_id: AlbumId) -> Result<Vec<CandidateTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT at.disc_number, at.artist_id, f.mrl
             FROM album_track at
             LEFT JOIN file f ON f.media_id = at.media_id AND f.type IN ('main', 'disc')
             WHERE at.album_id = ?
             ORDER BY at.id_track",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([album_id.raw()], |row| {
            Ok(CandidateTrack {
                disc_number: row.get(0)?,
                artist_id: ArtistId::new(row.get(1)?),
                file_mrl: row.get(2)?,
            })
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Set the album artist.
pub fn set_album_artist(conn: &Connection, album_id: AlbumId, artist_id: ArtistId) -> Result<()> {
    conn.execute(
        "UPDATE album SET artist_id = ? WHERE id_album = ?",
        params![artist_id.raw(), album_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Add an artist to the album's artist set (featuring included).
pub fn add_artist(conn: &Connection, album_id: AlbumId, artist_id: ArtistId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO album_artist_relation (album_id, artist_id) VALUES (?, ?)",
        params![album_id.raw(), artist_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// The album's artist set.
pub fn artists(conn: &Connection, album_id: AlbumId) -> Result<Vec<ArtistId>> {
    let mut stmt = conn
        .prepare(
            "SELECT artist_id FROM album_artist_relation WHERE album_id = ? ORDER BY artist_id",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([album_id.raw()], |row| row.get::<_, i64>(0).map(ArtistId::new))
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Reconcile the album's release year with one more track's year.
///
/// First seen wins; a later, conflicting year clears the stored year, which
/// then stays unknown. `force` overwrites unconditionally.
pub fn set_release_year(conn: &Connection, album_id: AlbumId, year: i64, force: bool) -> Result<()> {
    let current: Option<i64> = conn
        .query_row(
            "SELECT release_year FROM album WHERE id_album = ?",
            [album_id.raw()],
            |row| row.get(0),
        )
        .map_err(map_sqlite_err)?;

    let new_year = if force {
        Some(year)
    } else {
        match current {
            None => Some(year),
            Some(y) if y == year => return Ok(()),
            Some(_) => None,
        }
    };

    conn.execute(
        "UPDATE album SET release_year = ? WHERE id_album = ?",
        params![new_year, album_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}
