//! User directory queries.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{get_ts, get_uuid};
use crate::clock;
use crate::error::Result;
use crate::model::user::{IdentityClaims, User};

const USER_COLUMNS: &str =
    "id, google_id, email, name, avatar_url, created_at_us, updated_at_us";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        google_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        avatar_url: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

/// Insert a new user or refresh name, email and avatar of the user with the
/// same `google_id`. Returns the stored row.
pub fn upsert(conn: &Connection, claims: &IdentityClaims) -> Result<User> {
    let now = clock::next_timestamp_us();
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, google_id, email, name, avatar_url, created_at_us, updated_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(google_id) DO UPDATE SET
             email = excluded.email,
             name = excluded.name,
             avatar_url = excluded.avatar_url,
             updated_at_us = excluded.updated_at_us",
        params![
            id.to_string(),
            claims.google_id,
            claims.email,
            claims.name,
            claims.avatar_url,
            now
        ],
    )?;

    let user = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = ?1"),
        [&claims.google_id],
        row_to_user,
    )?;
    Ok(user)
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id.to_string()],
            row_to_user,
        )
        .optional()?)
}

/// Email lookup is case-insensitive.
pub fn get_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE
                 ORDER BY created_at_us LIMIT 1"
            ),
            [email.trim()],
            row_to_user,
        )
        .optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at_us DESC"
    ))?;
    let rows = stmt.query_map([], row_to_user)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
