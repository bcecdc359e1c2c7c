//! Project queries and the per-project item position counter.

use rusqlite::{Connection, OptionalExtension, ffi, params};
use uuid::Uuid;

use super::{get_ts, get_uuid, is_constraint};
use crate::clock;
use crate::error::{BacklogError, Result};
use crate::model::page::PageRequest;
use crate::model::project::{NewProject, Project, ProjectUpdate};

const PROJECT_COLUMNS: &str =
    "id, name, key, description, created_by, created_at_us, updated_at_us";

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        key: row.get(2)?,
        description: row.get(3)?,
        created_by_id: get_uuid(row, 4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

/// Insert a validated project. A duplicate key maps to
/// [`BacklogError::ProjectKeyExists`].
pub fn insert(conn: &Connection, new: &NewProject, created_by: Uuid) -> Result<Project> {
    let id = Uuid::new_v4();
    let now = clock::next_timestamp_us();
    conn.execute(
        "INSERT INTO projects (id, name, key, description, created_by, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id.to_string(),
            new.name,
            new.key,
            new.description,
            created_by.to_string(),
            now
        ],
    )
    .map_err(|e| {
        if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) {
            BacklogError::ProjectKeyExists(new.key.clone())
        } else {
            BacklogError::from(e)
        }
    })?;

    get(conn, id)?.ok_or_else(|| BacklogError::project_not_found(id))
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Project>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            [id.to_string()],
            row_to_project,
        )
        .optional()?)
}

/// `key` must already be canonical (upper-case).
pub fn get_by_key(conn: &Connection, key: &str) -> Result<Option<Project>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE key = ?1"),
            [key],
            row_to_project,
        )
        .optional()?)
}

pub fn exists(conn: &Connection, id: Uuid) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
        [id.to_string()],
        |row| row.get(0),
    )?)
}

/// Newest first; `page = None` returns every project.
pub fn list(conn: &Connection, page: Option<PageRequest>) -> Result<Vec<Project>> {
    let limit_clause = page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.limit, p.offset()))
        .unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at_us DESC{limit_clause}"
    ))?;
    let rows = stmt.query_map([], row_to_project)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?)
}

/// Apply a validated update. Returns `false` when the project is missing.
pub fn update(conn: &Connection, id: Uuid, update: &ProjectUpdate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE projects SET
             name = COALESCE(?2, name),
             description = COALESCE(?3, description),
             updated_at_us = ?4
         WHERE id = ?1",
        params![
            id.to_string(),
            update.name,
            update.description,
            clock::next_timestamp_us()
        ],
    )?;
    Ok(changed > 0)
}

/// Hard delete; sprints, items and both ledgers cascade.
pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
    Ok(conn.execute("DELETE FROM projects WHERE id = ?1", [id.to_string()])? > 0)
}

/// Reserve the next item position for a project. Positions come from a
/// high-water mark and are never reused after deletions.
pub fn next_item_position(conn: &Connection, project_id: Uuid) -> Result<i64> {
    conn.query_row(
        "UPDATE projects SET last_item_position = last_item_position + 1
         WHERE id = ?1
         RETURNING last_item_position",
        [project_id.to_string()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| BacklogError::project_not_found(project_id))
}
