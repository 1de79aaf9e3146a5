//! Parser task store.
//!
//! Tasks persist pipeline state across restarts. A worker owns the task it
//! is currently running; step bits are persisted before the owning service
//! reports success, and the retry counter is incremented before a step
//! runs so a crash mid-step still counts against the budget.

use mediatheque_common::{
    Error, FileId, FolderId, MediaId, PlaylistId, Result, StepMask, TaskId, MAX_TASK_RETRIES,
};
use rusqlite::{params, Connection, Row};

use crate::models::TaskRow;
use crate::pool::map_sqlite_err;

const TASK_COLS: &str = "id_task, step_done, retry_count, mrl, file_id, media_id, \
     parent_folder_id, parent_playlist_id, parent_playlist_index, is_refresh";

fn task_from_row(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: TaskId::new(row.get(0)?),
        step_done: StepMask::from_raw(row.get::<_, i64>(1)? as u8),
        retry_count: row.get(2)?,
        mrl: row.get(3)?,
        file_id: row.get::<_, Option<i64>>(4)?.map(FileId::new),
        media_id: row.get::<_, Option<i64>>(5)?.map(MediaId::new),
        parent_folder_id: FolderId::new(row.get(6)?),
        parent_playlist_id: row.get::<_, Option<i64>>(7)?.map(PlaylistId::new),
        parent_playlist_index: row.get(8)?,
        is_refresh: row.get::<_, i64>(9)? != 0,
    })
}

/// Insert a new task with its coordinates. A task for the same mrl under
/// the same parent playlist is a constraint violation.
#[allow(clippy::too_many_arguments)]
pub fn create(
    conn: &Connection,
    mrl: &str,
    file_id: Option<FileId>,
    media_id: Option<MediaId>,
    parent_folder_id: FolderId,
    parent_playlist_id: Option<PlaylistId>,
    parent_playlist_index: Option<i64>,
    is_refresh: bool,
) -> Result<TaskRow> {
    conn.execute(
        "INSERT INTO task (mrl, file_id, media_id, parent_folder_id, parent_playlist_id,
            parent_playlist_index, is_refresh)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            mrl,
            file_id.map(i64::from),
            media_id.map(i64::from),
            parent_folder_id.raw(),
            parent_playlist_id.map(i64::from),
            parent_playlist_index,
            is_refresh as i64,
        ],
    )
    .map_err(map_sqlite_err)?;

    Ok(TaskRow {
        id: TaskId::new(conn.last_insert_rowid()),
        step_done: StepMask::NONE,
        retry_count: 0,
        mrl: mrl.to_string(),
        file_id,
        media_id,
        parent_folder_id,
        parent_playlist_id,
        parent_playlist_index,
        is_refresh,
    })
}

/// Get a task by id.
pub fn get(conn: &Connection, id: TaskId) -> Result<TaskRow> {
    conn.query_row(
        &format!("SELECT {} FROM task WHERE id_task = ?", TASK_COLS),
        [id.raw()],
        task_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(format!("task #{}", id)),
        _ => map_sqlite_err(e),
    })
}

/// Tasks that still have pipeline work to do: not Completed and within the
/// retry budget, oldest first.
pub fn fetch_uncompleted(conn: &Connection) -> Result<Vec<TaskRow>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM task
             WHERE step_done & {} = 0 AND retry_count < ?
             ORDER BY id_task",
            TASK_COLS,
            mediatheque_common::Step::Completed as u8,
        ))
        .map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map([MAX_TASK_RETRIES], task_from_row)
        .map_err(map_sqlite_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(map_sqlite_err)?;
    Ok(rows)
}

/// Durably persist the task's step bitmask.
pub fn save_steps(conn: &Connection, id: TaskId, step_done: StepMask) -> Result<()> {
    conn.execute(
        "UPDATE task SET step_done = ? WHERE id_task = ?",
        params![step_done.raw() as i64, id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Increment the retry counter before a step runs. Returns the new value.
pub fn start_step(conn: &Connection, id: TaskId) -> Result<i64> {
    conn.execute(
        "UPDATE task SET retry_count = retry_count + 1 WHERE id_task = ?",
        [id.raw()],
    )
    .map_err(map_sqlite_err)?;
    conn.query_row(
        "SELECT retry_count FROM task WHERE id_task = ?",
        [id.raw()],
        |row| row.get(0),
    )
    .map_err(map_sqlite_err)
}

/// Decrement the retry counter, floored at zero. Returns the new value.
pub fn decrement_retry(conn: &Connection, id: TaskId) -> Result<i64> {
    conn.execute(
        "UPDATE task SET retry_count = max(retry_count - 1, 0) WHERE id_task = ?",
        [id.raw()],
    )
    .map_err(map_sqlite_err)?;
    conn.query_row(
        "SELECT retry_count FROM task WHERE id_task = ?",
        [id.raw()],
        |row| row.get(0),
    )
    .map_err(map_sqlite_err)
}

/// Record the created file/media rows on the task.
pub fn set_entities(
    conn: &Connection,
    id: TaskId,
    file_id: FileId,
    media_id: MediaId,
) -> Result<()> {
    conn.execute(
        "UPDATE task SET file_id = ?, media_id = ? WHERE id_task = ?",
        params![file_id.raw(), media_id.raw(), id.raw()],
    )
    .map_err(map_sqlite_err)?;
    Ok(())
}

/// Delete the task row.
pub fn destroy(conn: &Connection, id: TaskId) -> Result<()> {
    conn.execute("DELETE FROM task WHERE id_task = ?", [id.raw()])
        .map_err(map_sqlite_err)?;
    Ok(())
}
