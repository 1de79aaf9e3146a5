//! Elementary stream (track) query operations.
//!
//! One row per audio/video/subtitle stream of a media, written by the
//! analyzer from the prober's output.

use mediatheque_common::{MediaId, Result};
use rusqlite::{params, Connection};

use crate::models::{AudioTrack, SubtitleTrack, VideoTrack};
use crate::pool::map_sqlite_err;

/// Add an audio stream row.
pub fn add_audio_track(
    conn: &Connection,
    media_id: MediaId,
    codec: &str,
    bitrate: i64,
    samplerate: i64,
    nb_channels: i64,
    language: &str,
    description: &str,
) -> Result<AudioTrack> {
    conn.execute(
        "INSERT INTO audio_track (codec, bitrate, samplerate, nb_channels, language,
            description, media_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            codec,
            bitrate,
            samplerate,
            nb_channels,
            language,
            description,
            media_id.raw(),
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(AudioTrack {
        id: conn.last_insert_rowid(),
        codec: Some(codec.to_string()),
        bitrate,
        samplerate,
        nb_channels,
        language: Some(language.to_string()),
        description: Some(description.to_string()),
        media_id,
    })
}

/// Add a video stream row.
#[allow(clippy::too_many_arguments)]
pub fn add_video_track(
    conn: &Connection,
    media_id: MediaId,
    codec: &str,
    bitrate: i64,
    width: i64,
    height: i64,
    fps_num: i64,
    fps_den: i64,
    sar_num: i64,
    sar_den: i64,
    language: &str,
    description: &str,
) -> Result<VideoTrack> {
    conn.execute(
        "INSERT INTO video_track (codec, bitrate, width, height, fps_num, fps_den, sar_num,
            sar_den, language, description, media_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            codec,
            bitrate,
            width,
            height,
            fps_num,
            fps_den,
            sar_num,
            sar_den,
            language,
            description,
            media_id.raw(),
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(VideoTrack {
        id: conn.last_insert_rowid(),
        codec: Some(codec.to_string()),
        bitrate,
        width,
        height,
        fps_num,
        fps_den,
        sar_num,
        sar_den,
        language: Some(language.to_string()),
        description: Some(description.to_string()),
        media_id,
    })
}

/// Add a subtitle stream row.
pub fn add_subtitle_track(
    conn: &Connection,
    media_id: MediaId,
    codec: &str,
    language: &str,
    description: &str,
    encoding: &str,
) -> Result<SubtitleTrack> {
    conn.execute(
        "INSERT INTO subtitle_track (codec, language, description, encoding, media_id)
         VALUES (?, ?, ?, ?, ?)",
        params![codec, language, description, encoding, media_id.raw()],
    )
    .map_err(map_sqlite_err)?;

    Ok(SubtitleTrack {
        id: conn.last_insert_rowid(),
        codec: Some(codec.to_string()),
        language: Some(language.to_string()),
        description: Some(description.to_string()),
        encoding: Some(encoding.to_string()),
        media_id,
    })
}

/// The audio streams of a media.
pub fn audio_tracks(conn: &Connection, media_id: MediaId) -> Result<Vec<AudioTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT id_track, codec, bitrate, samplerate, nb_channels, language, description,
                media_id
             FROM audio_track WHERE media_id = ? ORDER BY id_track",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([media_id.raw()], |row| {
            Ok(AudioTrack {
                id: row.get(0)?,
                codec: row.get(1)?,
                bitrate: row.get(2)?,
                samplerate: row.get(3)?,
                nb_channels: row.get(4)?,
                language: row.get(5)?,
                description: row.get(6)?,
                media_id: MediaId::new(row.get(7)?),
            })
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// The video streams of a media.
pub fn video_tracks(conn: &Connection, media_id: MediaId) -> Result<Vec<VideoTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT id_track, codec, bitrate, width, height, fps_num, fps_den, sar_num,
                sar_den, language, description, media_id
             FROM video_track WHERE media_id = ? ORDER BY id_track",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([media_id.raw()], |row| {
            Ok(VideoTrack {
                id: row.get(0)?,
                codec: row.get(1)?,
                bitrate: row.get(2)?,
                width: row.get(3)?,
                height: row.get(4)?,
                fps_num: row.get(5)?,
                fps_den: row.get(6)?,
                sar_num: row.get(7)?,
                sar_den: row.get(8)?,
                language: row.get(9)?,
                description: row.get(10)?,
                media_id: MediaId::new(row.get(11)?),
            })
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// The subtitle streams of a media.
pub fn subtitle_tracks(conn: &Connection, media_id: MediaId) -> Result<Vec<SubtitleTrack>> {
    let mut stmt = conn
        .prepare(
            "SELECT id_track, codec, language, description, encoding, media_id
             FROM subtitle_track WHERE media_id = ? ORDER BY id_track",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([media_id.raw()], |row| {
            Ok(SubtitleTrack {
                id: row.get(0)?,
                codec: row.get(1)?,
                language: row.get(2)?,
                description: row.get(3)?,
                encoding: row.get(4)?,
                media_id: MediaId::new(row.get(5)?),
            })
        })
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::media;
    use mediatheque_common::MediaType;

    #[test]
    fn test_stream_rows_round_trip() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let m = media::create(&conn, MediaType::Unknown, "movie.mkv", None, None).unwrap();
        add_video_track(&conn, m.id, "h264", 5_000_000, 1920, 1080, 24000, 1001, 1, 1, "", "")
            .unwrap();
        add_audio_track(&conn, m.id, "mp4a", 256_000, 48_000, 2, "eng", "Stereo").unwrap();
        add_subtitle_track(&conn, m.id, "subr", "fre", "", "UTF-8").unwrap();

        assert_eq!(video_tracks(&conn, m.id).unwrap().len(), 1);
        let audio = audio_tracks(&conn, m.id).unwrap();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].nb_channels, 2);
        let subs = subtitle_tracks(&conn, m.id).unwrap();
        assert_eq!(subs[0].encoding.as_deref(), Some("UTF-8"));
    }

    #[test]
    fn test_tracks_cascade_with_media() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let m = media::create(&conn, MediaType::Unknown, "movie.mkv", None, None).unwrap();
        add_audio_track(&conn, m.id, "mp4a", 0, 0, 0, "", "").unwrap();
        conn.execute("DELETE FROM media WHERE id_media = ?", [m.id.raw()])
            .unwrap();
        assert!(audio_tracks(&conn, m.id).unwrap().is_empty());
    }
}
