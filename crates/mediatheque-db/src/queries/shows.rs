//! Show and episode query operations.

use mediatheque_common::{Error, MediaId, MediaSubType, Result, ShowEpisodeId, ShowId};
use rusqlite::{params, Connection, Row};

use crate::models::{Show, ShowEpisode};
use crate::pool::map_sqlite_err;
use crate::queries::media;

const SHOW_COLS: &str = "id_show, name, release_date, short_summary, artwork_mrl, tvdb_id";

fn show_from_row(row: &Row) -> rusqlite::Result<Show> {
    Ok(Show {
        id: ShowId::new(row.get(0)?),
        name: row.get(1)?,
        release_date: row.get(2)?,
        short_summary: row.get(3)?,
        artwork_mrl: row.get(4)?,
        tvdb_id: row.get(5)?,
    })
}

fn episode_from_row(row: &Row) -> rusqlite::Result<ShowEpisode> {
    Ok(ShowEpisode {
        id: ShowEpisodeId::new(row.get(0)?),
        media_id: MediaId::new(row.get(1)?),
        show_id: ShowId::new(row.get(2)?),
        episode_number: row.get(3)?,
        season_number: row.get(4)?,
        title: row.get(5)?,
    })
}

/// Create a show.
pub fn create(conn: &Connection, name: &str) -> Result<Show> {
    conn.execute("INSERT INTO show (name) VALUES (?)", [name])
        .map_err(map_sqlite_err)?;
    Ok(Show {
        id: ShowId::new(conn.last_insert_rowid()),
        name: name.to_string(),
        release_date: None,
        short_summary: None,
        artwork_mrl: None,
        tvdb_id: None,
    })
}

/// Get a show by id.
pub fn get(conn: &Connection, id: ShowId) -> Result<Show> {
    conn.query_row(
        &format!("SELECT {} FROM show WHERE id_show = ?", SHOW_COLS),
        [id.raw()],
        show_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("show #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find a show by name.
pub fn from_name(conn: &Connection, name: &str) -> Result<Option<Show>> {
    match conn.query_row(
        &format!("SELECT {} FROM show WHERE name = ?", SHOW_COLS),
        [name],
        show_from_row,
    ) {
        Ok(show) => Ok(Some(show)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

/// Attach a media to the show as an episode and flip its sub-type.
pub fn add_episode(
    conn: &Connection,
    show_id: ShowId,
    media_id: MediaId,
    episode_number: i64,
    title: Option<&str>,
) -> Result<ShowEpisode> {
    conn.execute(
        "INSERT INTO show_episode (media_id, show_id, episode_number, title)
         VALUES (?, ?, ?, ?)",
        params![media_id.raw(), show_id.raw(), episode_number, title],
    )
    .map_err(map_sqlite_err)?;
    let id = ShowEpisodeId::new(conn.last_insert_rowid());
    media::set_sub_type(conn, media_id, MediaSubType::ShowEpisode)?;

    Ok(ShowEpisode {
        id,
        media_id,
        show_id,
        episode_number,
        season_number: None,
        title: title.map(str::to_string),
    })
}

/// The show's episodes ordered by season then episode number.
pub fn episodes(conn: &Connection, show_id: ShowId) -> Result<Vec<ShowEpisode>> {
    let mut stmt = conn
        .prepare(
            "SELECT id_episode, media_id, show_id, episode_number, season_number, title
             FROM show_episode WHERE show_id = ?
             ORDER BY season_number, episode_number",
        )
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([show_id.raw()], episode_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Number of episodes attached to the show.
pub fn nb_episodes(conn: &Connection, show_id: ShowId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM show_episode WHERE show_id = ?",
        [show_id.raw()],
        |row| row.get(0),
    )
    .map_err(map_sqlite_err)
}

/// Number of distinct seasons attached to the show. Episodes without a
/// season number count as one bucket.
pub fn nb_seasons(conn: &Connection, show_id: ShowId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(DISTINCT coalesce(season_number, 0)) FROM show_episode WHERE show_id = ?",
        [show_id.raw()],
        |row| row.get(0),
    )
    .map_err(map_sqlite_err)
}

pub fn set_release_date(conn: &Connection, id: ShowId, date: i64) -> Result<()> {
    conn.execute(
        "UPDATE show SET release_date = ? WHERE id_show = ?",
        params![date, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_short_summary(conn: &Connection, id: ShowId, summary: &str) -> Result<()> {
    conn.execute(
        "UPDATE show SET short_summary = ? WHERE id_show = ?",
        params![summary, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_artwork_mrl(conn: &Connection, id: ShowId, mrl: &str) -> Result<()> {
    conn.execute(
        "UPDATE show SET artwork_mrl = ? WHERE id_show = ?",
        params![mrl, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

pub fn set_tvdb_id(conn: &Connection, id: ShowId, tvdb_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE show SET tvdb_id = ? WHERE id_show = ?",
        params![tvdb_id, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}
