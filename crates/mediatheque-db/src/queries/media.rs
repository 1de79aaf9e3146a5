//! Media query operations.

use mediatheque_common::{
    DeviceId, Error, FolderId, MediaId, MediaSubType, MediaType, Result, ThumbnailId,
};
use rusqlite::{params, Connection, Row};

use crate::models::Media;
use crate::pool::map_sqlite_err;

const MEDIA_COLS: &str = "m.id_media, m.type, m.sub_type, m.duration, m.play_count, \
     m.last_played_date, m.real_last_played_date, m.insertion_date, m.release_year, \
     m.thumbnail_id, m.title, m.filename, m.is_favorite, m.nb_playlists, m.device_id, \
     m.folder_id";

fn media_from_row(row: &Row) -> rusqlite::Result<Media> {
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
}

/// Create a new media entry. The title defaults to the file name, which the
/// analyzer may later replace with the tagged title.
pub fn create(
    conn: &Connection,
    media_type: MediaType,
    filename: &str,
    folder_id: Option<FolderId>,
    device_id: Option<DeviceId>,
) -> Result<Media> {
    if filename.is_empty() {
        return Err(Error::invalid_input("media filename must not be empty"));
    }
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT INTO media (type, insertion_date, title, filename, device_id, folder_id)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            media_type.to_string(),
            now,
            filename,
            filename,
            device_id.map(i64::from),
            folder_id.map(i64::from),
        ],
    )
    .map_err(map_sqlite_err)?;

    let id = MediaId::new(conn.last_insert_rowid());
    Ok(Media {
        id,
        media_type,
        sub_type: MediaSubType::Unknown,
        duration: -1,
        play_count: 0,
        last_played_date: None,
        real_last_played_date: None,
        insertion_date: now,
        release_year: None,
        thumbnail_id: None,
        title: filename.to_string(),
        filename: filename.to_string(),
        is_favorite: false,
        nb_playlists: 0,
        device_id,
        folder_id,
    })
}

/// Get a media entry by id.
pub fn get(conn: &Connection, id: MediaId) -> Result<Media> {
    conn.query_row(
        &format!("SELECT {} FROM media m WHERE m.id_media = ?", MEDIA_COLS),
        [id.raw()],
        media_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("media #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find the media backed by the file with the given mrl, if any.
pub fn from_mrl(conn: &Connection, mrl: &str) -> Result<Option<Media>> {
    match conn.query_row(
        &format!(
            "SELECT {} FROM media m
             INNER JOIN file f ON f.media_id = m.id_media
             WHERE f.mrl = ?",
            MEDIA_COLS
        ),
        [mrl],
        media_from_row,
    ) {
        Ok(media) => Ok(Some(media)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// List media whose device, if any, is currently present. Media on absent
/// removable devices are hidden, not deleted.
pub fn list_present(conn: &Connection) -> Result<Vec<Media>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM media m
             LEFT JOIN device d ON d.id_device = m.device_id
             WHERE m.device_id IS NULL OR d.is_present != 0
             ORDER BY m.id_media",
            MEDIA_COLS
        ))
        .map_err(map_sqlite_err)?;

    let rows = stmt
        .query_map([], media_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Full-text title search over the media FTS mirror.
pub fn search(conn: &Connection, pattern: &str) -> Result<Vec<Media>> {
    let fts_query = format!("{}*", pattern);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM media m
             WHERE m.id_media IN (SELECT rowid FROM media_fts WHERE media_fts MATCH ?)
             ORDER BY m.id_media",
            MEDIA_COLS
        ))
        .map_err(map_sqlite_err)?;

    let rows = stmt
        .query_map([fts_query], media_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

pub fn set_type(conn: &Connection, id: MediaId, media_type: MediaType) -> Result<()> {
    conn.execute(
        "UPDATE media SET type = ? WHERE id_media = ?",
        params![media_type.to_string(), id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_sub_type(conn: &Connection, id: MediaId, sub_type: MediaSubType) -> Result<()> {
    conn.execute(
        "UPDATE media SET sub_type = ? WHERE id_media = ?",
        params![sub_type.to_string(), id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_duration(conn: &Connection, id: MediaId, duration: i64) -> Result<()> {
    conn.execute(
        "UPDATE media SET duration = ? WHERE id_media = ?",
        params![duration, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_release_year(conn: &Connection, id: MediaId, year: i64) -> Result<()> {
    conn.execute(
        "UPDATE media SET release_year = ? WHERE id_media = ?",
        params![year, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_title(conn: &Connection, id: MediaId, title: &str) -> Result<()> {
    conn.execute(
        "UPDATE media SET title = ? WHERE id_media = ?",
        params![title, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_favorite(conn: &Connection, id: MediaId, favorite: bool) -> Result<()> {
    conn.execute(
        "UPDATE media SET is_favorite = ? WHERE id_media = ?",
        params![favorite as i64, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Record an actual playback: bumps the play count and both played dates.
pub fn record_playback(conn: &Connection, id: MediaId, timestamp: i64) -> Result<()> {
    conn.execute(
        "UPDATE media SET play_count = play_count + 1, last_played_date = ?,
            real_last_played_date = ? WHERE id_media = ?",
        params![timestamp, timestamp, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Replay an imported history entry. `real_last_played_date` is left
/// untouched so cleanup heuristics keep seeing the genuine usage date.
pub fn replay_playback(conn: &Connection, id: MediaId, timestamp: i64) -> Result<()> {
    conn.execute(
        "UPDATE media SET play_count = play_count + 1, last_played_date = ?
         WHERE id_media = ?",
        params![timestamp, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::{devices, files, folders};
    use mediatheque_common::FileType;

    #[test]
    fn test_create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let media = create(&conn, MediaType::Unknown, "clip.mkv", None, None).unwrap();
        let fetched = get(&conn, media.id).unwrap();
        assert_eq!(media, fetched);
        assert_eq!(fetched.duration, -1);
        assert_eq!(fetched.title, "clip.mkv");
    }

    #[test]
    fn test_empty_filename_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();
        assert!(create(&conn, MediaType::Unknown, "", None, None).is_err());
    }

    #[test]
    fn test_from_mrl() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let media = create(&conn, MediaType::Unknown, "song.flac", None, None).unwrap();
        files::create(
            &conn,
            media.id,
            "file:///music/song.flac",
            FileType::Main,
            None,
            false,
            0,
            0,
        )
        .unwrap();

        let found = from_mrl(&conn, "file:///music/song.flac").unwrap().unwrap();
        assert_eq!(found.id, media.id);
        assert!(from_mrl(&conn, "file:///nope.flac").unwrap().is_none());
    }

    #[test]
    fn test_presence_filter_hides_absent_device_media() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let device = devices::create(&conn, "usb-1", "file://", true).unwrap();
        let folder = folders::create(&conn, "/mnt/usb", None, Some(device.id), true).unwrap();
        let on_usb = create(
            &conn,
            MediaType::Video,
            "movie.mkv",
            Some(folder.id),
            Some(device.id),
        )
        .unwrap();
        let local = create(&conn, MediaType::Video, "local.mkv", None, None).unwrap();

        assert_eq!(list_present(&conn).unwrap().len(), 2);

        devices::set_present(&conn, "usb-1", false).unwrap();
        let present = list_present(&conn).unwrap();
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].id, local.id);

        // The row is hidden, not deleted.
        assert!(get(&conn, on_usb.id).is_ok());
    }

    #[test]
    fn test_search_follows_title_updates() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let media = create(&conn, MediaType::Video, "some_file.mkv", None, None).unwrap();
        set_title(&conn, media.id, "The Third Man").unwrap();

        let hits = search(&conn, "Third").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, media.id);
        assert!(search(&conn, "some_file").unwrap().is_empty());
    }

    #[test]
    fn test_playback_accounting() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let media = create(&conn, MediaType::Audio, "a.mp3", None, None).unwrap();
        record_playback(&conn, media.id, 1000).unwrap();
        replay_playback(&conn, media.id, 2000).unwrap();

        let m = get(&conn, media.id).unwrap();
        assert_eq!(m.play_count, 2);
        assert_eq!(m.last_played_date, Some(2000));
        // History replay must not touch the real date.
        assert_eq!(m.real_last_played_date, Some(1000));
    }
}
