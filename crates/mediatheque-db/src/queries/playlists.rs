//! Playlist query operations.
//!
//! Playlist membership is position-indexed from 1. The
//! `playlist_media_relation` triggers keep `media.nb_playlists` in sync.

use mediatheque_common::{Error, FileId, MediaId, PlaylistId, Result};
use rusqlite::{params, Connection, Row};

use crate::models::{Media, Playlist};
use crate::pool::map_sqlite_err;

fn playlist_from_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: PlaylistId::new(row.get(0)?),
        name: row.get(1)?,
        file_id: row.get::<_, Option<i64>>(2)?.map(FileId::new),
        creation_date: row.get(3)?,
    })
}

/// Create a playlist.
pub fn create(conn: &Connection, name: &str) -> Result<Playlist> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO playlist (name, creation_date) VALUES (?, ?)",
        params![name, now],
    )
    .map_err(map_sqlite_err)?;

    Ok(Playlist {
        id: PlaylistId::new(conn.last_insert_rowid()),
        name: name.to_string(),
        file_id: None,
        creation_date: now,
    })
}

/// Get a playlist by id.
pub fn get(conn: &Connection, id: PlaylistId) -> Result<Playlist> {
    conn.query_row(
        "SELECT id_playlist, name, file_id, creation_date FROM playlist WHERE id_playlist = ?",
        [id.raw()],
        playlist_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("playlist #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Link the playlist to the file it was imported from.
pub fn set_file(conn: &Connection, id: PlaylistId, file_id: FileId) -> Result<()> {
    conn.execute(
        "UPDATE playlist SET file_id = ? WHERE id_playlist = ?",
        params![file_id.raw(), id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Add a media at a 1-based position. Re-adding the same media keeps the
/// first position.
pub fn add_media(
    conn: &Connection,
    id: PlaylistId,
    media_id: MediaId,
    position: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO playlist_media_relation (media_id, playlist_id, position)
         VALUES (?, ?, ?)",
        params![media_id.raw(), id.raw(), position],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Remove a media from the playlist.
pub fn remove_media(conn: &Connection, id: PlaylistId, media_id: MediaId) -> Result<()> {
    conn.execute(
        "DELETE FROM playlist_media_relation WHERE playlist_id = ? AND media_id = ?",
        params![id.raw(), media_id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// The playlist's media in position order.
pub fn media(conn: &Connection, id: PlaylistId) -> Result<Vec<Media>> {
    let mut stmt = conn
        .prepare(
            "SELECT m.id_media, m.type, m.sub_type, m.duration, m.play_count,
                m.last_played_date, m.real_last_played_date, m.insertion_date,
                m.release_year, m.thumbnail_id, m.title, m.filename, m.is_favorite,
                m.nb_playlists, m.device_id, m.folder_id
             FROM media m
             INNER JOIN playlist_media_relation pmr ON pmr.media_id = m.id_media
             WHERE pmr.playlist_id = ?
             ORDER BY pmr.position",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([id.raw()], |row| {
            use mediatheque_common::{DeviceId, FolderId, MediaSubType, MediaType, ThumbnailId};
            Ok(Media {
                id: MediaId::new(row.get(0)?),
                media_type: row
                    .get::<_, String>(1)?
                    .parse()
                    .unwrap_or(MediaType::Unknown),
                sub_type: row
                    .get::<_, String>(2)?
                    .parse()
                    .unwrap_or(MediaSubType::Unknown),
                duration: row.get(3)?,
                play_count: row.get(4)?,
                last_played_date: row.get(5)?,
                real_last_played_date: row.get(6)?,
                insertion_date: row.get(7)?,
                release_year: row.get(8)?,
                thumbnail_id: row.get::<_, Option<i64>>(9)?.map(ThumbnailId::new),
                title: row.get(10)?,
                filename: row.get(11)?,
                is_favorite: row.get::<_, i64>(12)? != 0,
                nb_playlists: row.get(13)?,
                device_id: row.get::<_, Option<i64>>(14)?.map(DeviceId::new),
                folder_id: row.get::<_, Option<i64>>(15)?.map(FolderId::new),
            })
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// The positions stored for a playlist, ascending.
pub fn positions(conn: &Connection, id: PlaylistId) -> Result<Vec<i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT position FROM playlist_media_relation WHERE playlist_id = ?
             ORDER BY position",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([id.raw()], |row| row.get(0))
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::media as media_queries;
    use mediatheque_common::MediaType;

    #[test]
    fn test_membership_order_and_nb_playlists() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let playlist = create(&conn, "Morning").unwrap();
        let m1 = media_queries::create(&conn, MediaType::Audio, "a.mp3", None, None).unwrap();
        let m2 = media_queries::create(&conn, MediaType::Audio, "b.mp3", None, None).unwrap();

        add_media(&conn, playlist.id, m2.id, 2).unwrap();
        add_media(&conn, playlist.id, m1.id, 1).unwrap();

        let members = media(&conn, playlist.id).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, m1.id);
        assert_eq!(members[1].id, m2.id);

        // Trigger-maintained cache.
        assert_eq!(media_queries::get(&conn, m1.id).unwrap().nb_playlists, 1);

        remove_media(&conn, playlist.id, m1.id).unwrap();
        assert_eq!(media_queries::get(&conn, m1.id).unwrap().nb_playlists, 0);
    }

    #[test]
    fn test_nb_playlists_counts_all_memberships() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let p1 = create(&conn, "One").unwrap();
        let p2 = create(&conn, "Two").unwrap();
        let m = media_queries::create(&conn, MediaType::Audio, "a.mp3", None, None).unwrap();

        add_media(&conn, p1.id, m.id, 1).unwrap();
        add_media(&conn, p2.id, m.id, 1).unwrap();
        assert_eq!(media_queries::get(&conn, m.id).unwrap().nb_playlists, 2);

        conn.execute("DELETE FROM playlist WHERE id_playlist = ?", [p1.id.raw()])
            .unwrap();
        assert_eq!(media_queries::get(&conn, m.id).unwrap().nb_playlists, 1);
    }
}
