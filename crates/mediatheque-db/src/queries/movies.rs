//! Movie query operations.
//!
//! Movies have no automatic ingestion path; the rows exist so a media can
//! be promoted to the Movie sub-type by outer layers.

use mediatheque_common::{Error, MediaId, MediaSubType, MovieId, Result};
use rusqlite::{params, Connection, Row};

use crate::models::Movie;
use crate::pool::map_sqlite_err;
use crate::queries::media;

fn movie_from_row(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: MovieId::new(row.get(0)?),
        media_id: MediaId::new(row.get(1)?),
        title: row.get(2)?,
    })
}

/// Create a movie row for a media and flip its sub-type.
pub fn create(conn: &Connection, media_id: MediaId, title: &str) -> Result<Movie> {
    conn.execute(
        "INSERT INTO movie (media_id, title) VALUES (?, ?)",
        params![media_id.raw(), title],
    )
    .map_err(map_sqlite_err)?;
    let id = MovieId::new(conn.last_insert_rowid());
    media::set_sub_type(conn, media_id, MediaSubType::Movie)?;

    Ok(Movie {
        id,
        media_id,
        title: title.to_string(),
    })
}

/// Get a movie by id.
pub fn get(conn: &Connection, id: MovieId) -> Result<Movie> {
    conn.query_row(
        "SELECT id_movie, media_id, title FROM movie WHERE id_movie = ?",
        [id.raw()],
        movie_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("movie #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// The movie row for a media, if any.
pub fn from_media(conn: &Connection, media_id: MediaId) -> Result<Option<Movie>> {
    match conn.query_row(
        "SELECT id_movie, media_id, title FROM movie WHERE media_id = ?",
        [media_id.raw()],
        movie_from_row,
    ) {
        Ok(movie) => Ok(Some(movie)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::media as media_queries;
    use mediatheque_common::MediaType;

    #[test]
    fn test_create_and_fetch() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let m = media_queries::create(&conn, MediaType::Video, "stalker.mkv", None, None).unwrap();
        let movie = create(&conn, m.id, "Stalker").unwrap();

        assert_eq!(get(&conn, movie.id).unwrap(), movie);
        assert_eq!(from_media(&conn, m.id).unwrap(), Some(movie));
        assert_eq!(
            media_queries::get(&conn, m.id).unwrap().sub_type,
            MediaSubType::Movie
        );
    }
}
