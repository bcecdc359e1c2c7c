//! Append-only ledgers for items and sprints.
//!
//! Rows are only ever inserted here; deletion happens through the parent
//! cascade. Reads are newest first, ties broken by insertion sequence.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{decode_json, encode_json, get_opt_uuid, get_parsed, get_ts, get_uuid};
use crate::clock;
use crate::error::Result;
use crate::model::history::{ItemHistory, NewItemHistory, NewSprintHistory, SprintHistory};
use crate::model::item::ItemSummary;
use crate::model::sprint::SprintSummary;
use crate::model::user::UserSummary;

const ITEM_HISTORY_SELECT: &str = "SELECT h.id, h.item_id, h.user_id, h.action, h.field_name, \
     h.old_value, h.new_value, h.comment, h.created_at_us, \
     u.name, u.email, u.avatar_url, i.title, i.item_type \
     FROM item_history h \
     LEFT JOIN users u ON u.id = h.user_id \
     LEFT JOIN items i ON i.id = h.item_id";

const SPRINT_HISTORY_SELECT: &str = "SELECT h.id, h.sprint_id, h.user_id, h.item_id, h.action, \
     h.old_value, h.new_value, h.created_at_us, \
     u.name, u.email, u.avatar_url, i.title, i.item_type, s.name \
     FROM sprint_history h \
     LEFT JOIN users u ON u.id = h.user_id \
     LEFT JOIN items i ON i.id = h.item_id \
     LEFT JOIN sprints s ON s.id = h.sprint_id";

const NEWEST_FIRST: &str = " ORDER BY h.created_at_us DESC, h.seq DESC";

fn user_summary(
    row: &rusqlite::Row<'_>,
    id: Uuid,
    first: usize,
) -> rusqlite::Result<Option<UserSummary>> {
    let name: Option<String> = row.get(first)?;
    name.map(|name| {
        Ok(UserSummary {
            id,
            name,
            email: row.get(first + 1)?,
            avatar_url: row.get(first + 2)?,
        })
    })
    .transpose()
}

fn item_summary(
    row: &rusqlite::Row<'_>,
    id: Option<Uuid>,
    first: usize,
) -> rusqlite::Result<Option<ItemSummary>> {
    let title: Option<String> = row.get(first)?;
    match (id, title) {
        (Some(id), Some(title)) => Ok(Some(ItemSummary {
            id,
            title,
            item_type: get_parsed(row, first + 1)?,
        })),
        _ => Ok(None),
    }
}

fn row_to_item_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemHistory> {
    let item_id = get_uuid(row, 1)?;
    let user_id = get_uuid(row, 2)?;
    Ok(ItemHistory {
        id: get_uuid(row, 0)?,
        item_id,
        user_id,
        action: get_parsed(row, 3)?,
        field_name: row.get(4)?,
        old_value: decode_json(row.get(5)?, "old_value"),
        new_value: decode_json(row.get(6)?, "new_value"),
        comment: row.get(7)?,
        created_at: get_ts(row, 8)?,
        user: user_summary(row, user_id, 9)?,
        item: item_summary(row, Some(item_id), 12)?,
    })
}

fn row_to_sprint_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<SprintHistory> {
    let sprint_id = get_uuid(row, 1)?;
    let user_id = get_uuid(row, 2)?;
    let item_id = get_opt_uuid(row, 3)?;
    let sprint_name: Option<String> = row.get(13)?;
    Ok(SprintHistory {
        id: get_uuid(row, 0)?,
        sprint_id,
        user_id,
        item_id,
        action: get_parsed(row, 4)?,
        old_value: decode_json(row.get(5)?, "old_value"),
        new_value: decode_json(row.get(6)?, "new_value"),
        created_at: get_ts(row, 7)?,
        user: user_summary(row, user_id, 8)?,
        item: item_summary(row, item_id, 11)?,
        sprint: sprint_name.map(|name| SprintSummary {
            id: sprint_id,
            name,
        }),
    })
}

/// Append one entry to an item's ledger. Returns the new entry's id.
pub fn append_item(conn: &Connection, entry: &NewItemHistory) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO item_history (
            id, item_id, user_id, action, field_name, old_value, new_value, comment, created_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id.to_string(),
            entry.item_id.to_string(),
            entry.user_id.to_string(),
            entry.action.as_str(),
            entry.field_name,
            encode_json(entry.old_value.as_ref()),
            encode_json(entry.new_value.as_ref()),
            entry.comment,
            clock::next_timestamp_us(),
        ],
    )?;
    tracing::debug!(
        item_id = %entry.item_id,
        user_id = %entry.user_id,
        action = entry.action.as_str(),
        "item history recorded"
    );
    Ok(id)
}

/// Append one entry to a sprint's ledger. Returns the new entry's id.
pub fn append_sprint(conn: &Connection, entry: &NewSprintHistory) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO sprint_history (
            id, sprint_id, user_id, item_id, action, old_value, new_value, created_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            entry.sprint_id.to_string(),
            entry.user_id.to_string(),
            entry.item_id.map(|i| i.to_string()),
            entry.action.as_str(),
            encode_json(entry.old_value.as_ref()),
            encode_json(entry.new_value.as_ref()),
            clock::next_timestamp_us(),
        ],
    )?;
    tracing::debug!(
        sprint_id = %entry.sprint_id,
        user_id = %entry.user_id,
        action = entry.action.as_str(),
        "sprint history recorded"
    );
    Ok(id)
}

fn limit_clause(limit: Option<u32>) -> String {
    limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default()
}

/// One item-ledger entry by id.
pub fn item_entry(conn: &Connection, id: Uuid) -> Result<Option<ItemHistory>> {
    Ok(conn
        .query_row(
            &format!("{ITEM_HISTORY_SELECT} WHERE h.id = ?1"),
            [id.to_string()],
            row_to_item_history,
        )
        .optional()?)
}

pub fn by_item(conn: &Connection, item_id: Uuid) -> Result<Vec<ItemHistory>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_HISTORY_SELECT} WHERE h.item_id = ?1{NEWEST_FIRST}"
    ))?;
    let rows = stmt.query_map([item_id.to_string()], row_to_item_history)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn by_sprint(conn: &Connection, sprint_id: Uuid) -> Result<Vec<SprintHistory>> {
    let mut stmt = conn.prepare(&format!(
        "{SPRINT_HISTORY_SELECT} WHERE h.sprint_id = ?1{NEWEST_FIRST}"
    ))?;
    let rows = stmt.query_map([sprint_id.to_string()], row_to_sprint_history)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Item-ledger entries written by `user_id`, newest first.
pub fn item_by_user(
    conn: &Connection,
    user_id: Uuid,
    limit: Option<u32>,
) -> Result<Vec<ItemHistory>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_HISTORY_SELECT} WHERE h.user_id = ?1{NEWEST_FIRST}{}",
        limit_clause(limit)
    ))?;
    let rows = stmt.query_map([user_id.to_string()], row_to_item_history)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Sprint-ledger entries written by `user_id`, newest first.
pub fn sprint_by_user(
    conn: &Connection,
    user_id: Uuid,
    limit: Option<u32>,
) -> Result<Vec<SprintHistory>> {
    let mut stmt = conn.prepare(&format!(
        "{SPRINT_HISTORY_SELECT} WHERE h.user_id = ?1{NEWEST_FIRST}{}",
        limit_clause(limit)
    ))?;
    let rows = stmt.query_map([user_id.to_string()], row_to_sprint_history)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
