//! Genre query operations.

use mediatheque_common::{Error, GenreId, Result};
use rusqlite::{Connection, Row};

use crate::models::Genre;
use crate::pool::map_sqlite_err;

fn genre_from_row(row: &Row) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: GenreId::new(row.get(0)?),
        name: row.get(1)?,
    })
}

/// Create a genre.
pub fn create(conn: &Connection, name: &str) -> Result<Genre> {
    conn.execute("INSERT INTO genre (name) VALUES (?)", [name])
        .map_err(map_sqlite_err)?;
    Ok(Genre {
        id: GenreId::new(conn.last_insert_rowid()),
        name: name.to_string(),
    })
}

/// Get a genre by id.
pub fn get(conn: &Connection, id: GenreId) -> Result<Genre> {
    conn.query_row(
        "SELECT id_genre, name FROM genre WHERE id_genre = ?",
        [id.raw()],
        genre_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("genre #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Find a genre by name. The name column is case-insensitive.
pub fn from_name(conn: &Connection, name: &str) -> Result<Option<Genre>> {
    match conn.query_row(
        "SELECT id_genre, name FROM genre WHERE name = ?",
        [name],
        genre_from_row,
    ) {
        Ok(genre) => Ok(Some(genre)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(map_sqlite_err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    #[test]
    fn test_create_and_find_case_insensitive() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let genre = create(&conn, "Ambient").unwrap();
        assert_eq!(from_name(&conn, "ambient").unwrap(), Some(genre.clone()));
        assert_eq!(get(&conn, genre.id).unwrap().name, "Ambient");

        assert!(create(&conn, "AMBIENT").unwrap_err().is_constraint_violation());
    }
}
