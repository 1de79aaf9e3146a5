//! Database connection pool management.
//!
//! Connection pooling for SQLite using r2d2. Each pipeline thread checks its
//! own connection out of the pool; transactions therefore never span
//! threads. The pool also hosts the busy-retry helper used around write
//! paths that can collide.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use mediatheque_common::{Error, Result};

use crate::migrations;

/// Type alias for the database connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled database connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initialize a new database pool with the given file path.
///
/// This function will:
/// - Create the SQLite database file if it doesn't exist
/// - Enable foreign key constraints on all connections
/// - Run pending database migrations
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(DbPool)` - Initialized connection pool
/// * `Err(Error)` - If pool creation or migration fails
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA recursive_triggers = ON;")
    });

    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Initialize an in-memory database pool for testing.
///
/// The pool is restricted to a single connection so that every checkout
/// observes the same in-memory database.
pub fn init_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA recursive_triggers = ON;")
    });

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create in-memory pool: {}", e)))?;

    let conn = pool
        .get()
        .map_err(|e| Error::database(format!("Failed to get connection for migrations: {}", e)))?;

    migrations::run_migrations(&conn)
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}

/// Map a rusqlite error to the common error type, preserving the classes the
/// pipeline reacts to: busy/locked (retried) and constraint violations
/// (interpreted as duplicates by the analyzer).
pub fn map_sqlite_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("query returned no rows"),
        rusqlite::Error::SqliteFailure(inner, _) => match inner.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                Error::DatabaseBusy
            }
            rusqlite::ErrorCode::ConstraintViolation => Error::constraint(e.to_string()),
            _ => Error::database(e.to_string()),
        },
        _ => Error::database(e.to_string()),
    }
}

/// Re-invoke `op` for as long as it fails with a transient busy/locked
/// error, up to `nb_retries` attempts. Any other error propagates
/// immediately.
pub fn with_retries<T, F>(nb_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_busy() && attempt < nb_retries => {
                attempt += 1;
                tracing::warn!("Database busy, retrying ({}/{})", attempt, nb_retries);
            }
            res => return res,
        }
    }
}
