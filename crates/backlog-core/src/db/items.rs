//! Backlog item queries.
//!
//! Reads join the sprint name and creator so callers get display-ready
//! items; labels come from the `item_labels` edge table in insertion order.

use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use std::fmt::Write as _;
use uuid::Uuid;

use super::{get_opt_uuid, get_parsed, get_ts, get_uuid, like_pattern};
use crate::error::Result;
use crate::model::item::{BacklogItem, ItemFilter, ItemStatus, SprintFilter};
use crate::model::page::PageRequest;
use crate::model::sprint::SprintSummary;
use crate::model::user::UserSummary;

const ITEM_SELECT: &str = "SELECT i.id, i.project_id, i.sprint_id, i.created_by, i.title, \
     i.description, i.item_type, i.priority, i.status, i.story_points, i.position, \
     i.created_at_us, i.updated_at_us, s.name, u.name, u.email, u.avatar_url \
     FROM items i \
     LEFT JOIN sprints s ON s.id = i.sprint_id \
     LEFT JOIN users u ON u.id = i.created_by";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<BacklogItem> {
    let sprint_id = get_opt_uuid(row, 2)?;
    let created_by_id = get_uuid(row, 3)?;
    let sprint_name: Option<String> = row.get(13)?;
    let user_name: Option<String> = row.get(14)?;

    Ok(BacklogItem {
        id: get_uuid(row, 0)?,
        project_id: get_uuid(row, 1)?,
        sprint_id,
        created_by_id,
        title: row.get(4)?,
        description: row.get(5)?,
        item_type: get_parsed(row, 6)?,
        priority: get_parsed(row, 7)?,
        status: get_parsed(row, 8)?,
        story_points: row.get(9)?,
        labels: Vec::new(),
        position: row.get(10)?,
        created_at: get_ts(row, 11)?,
        updated_at: get_ts(row, 12)?,
        created_by: match user_name {
            Some(name) => Some(UserSummary {
                id: created_by_id,
                name,
                email: row.get(15)?,
                avatar_url: row.get(16)?,
            }),
            None => None,
        },
        sprint: sprint_id
            .zip(sprint_name)
            .map(|(id, name)| SprintSummary { id, name }),
    })
}

/// Labels of one item, in the order they were added.
pub fn labels(conn: &Connection, item_id: Uuid) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT label FROM item_labels WHERE item_id = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map([item_id.to_string()], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn attach_labels(conn: &Connection, items: &mut [BacklogItem]) -> Result<()> {
    for item in items {
        item.labels = labels(conn, item.id)?;
    }
    Ok(())
}

fn query_items(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<BacklogItem>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), row_to_item)?;
    let mut items = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    attach_labels(conn, &mut items)?;
    Ok(items)
}

/// Insert a fully built item and its labels.
pub fn insert(conn: &Connection, item: &BacklogItem) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO items (
            id, project_id, sprint_id, created_by, title, description,
            item_type, priority, status, story_points, position,
            created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            item.id.to_string(),
            item.project_id.to_string(),
            item.sprint_id.map(|id| id.to_string()),
            item.created_by_id.to_string(),
            item.title,
            item.description,
            item.item_type.as_str(),
            item.priority.as_str(),
            item.status.as_str(),
            item.story_points,
            item.position,
            item.created_at.timestamp_micros(),
            item.updated_at.timestamp_micros(),
        ],
    )?;
    for label in &item.labels {
        add_label(conn, item.id, label)?;
    }
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<BacklogItem>> {
    let item = conn
        .query_row(
            &format!("{ITEM_SELECT} WHERE i.id = ?1"),
            [id.to_string()],
            row_to_item,
        )
        .optional()?;
    match item {
        Some(mut item) => {
            item.labels = labels(conn, item.id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Overwrite the mutable scalar columns of an item with `item`'s values.
pub fn save(conn: &Connection, item: &BacklogItem) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE items SET
             sprint_id = ?2,
             title = ?3,
             description = ?4,
             item_type = ?5,
             priority = ?6,
             status = ?7,
             story_points = ?8,
             updated_at_us = ?9
         WHERE id = ?1",
        params![
            item.id.to_string(),
            item.sprint_id.map(|id| id.to_string()),
            item.title,
            item.description,
            item.item_type.as_str(),
            item.priority.as_str(),
            item.status.as_str(),
            item.story_points,
            item.updated_at.timestamp_micros(),
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_sprint(
    conn: &Connection,
    item_id: Uuid,
    sprint_id: Option<Uuid>,
    now_us: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE items SET sprint_id = ?2, updated_at_us = ?3 WHERE id = ?1",
        params![item_id.to_string(), sprint_id.map(|id| id.to_string()), now_us],
    )?;
    Ok(changed > 0)
}

pub fn touch(conn: &Connection, item_id: Uuid, now_us: i64) -> Result<()> {
    conn.execute(
        "UPDATE items SET updated_at_us = ?2 WHERE id = ?1",
        params![item_id.to_string(), now_us],
    )?;
    Ok(())
}

/// Returns `true` only when the label was not already present.
pub fn add_label(conn: &Connection, item_id: Uuid, label: &str) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO item_labels (item_id, label) VALUES (?1, ?2)",
        params![item_id.to_string(), label],
    )?;
    Ok(inserted > 0)
}

/// Returns `true` only when the label was present.
pub fn remove_label(conn: &Connection, item_id: Uuid, label: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM item_labels WHERE item_id = ?1 AND label = ?2",
        params![item_id.to_string(), label],
    )?;
    Ok(removed > 0)
}

pub fn replace_labels(conn: &Connection, item_id: Uuid, new_labels: &[String]) -> Result<()> {
    conn.execute(
        "DELETE FROM item_labels WHERE item_id = ?1",
        [item_id.to_string()],
    )?;
    for label in new_labels {
        add_label(conn, item_id, label)?;
    }
    Ok(())
}

/// Hard delete; the item ledger and labels cascade.
pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
    Ok(conn.execute("DELETE FROM items WHERE id = ?1", [id.to_string()])? > 0)
}

/// Items currently assigned to a sprint, in backlog order.
pub fn list_by_sprint(conn: &Connection, sprint_id: Uuid) -> Result<Vec<BacklogItem>> {
    let id = sprint_id.to_string();
    query_items(
        conn,
        &format!("{ITEM_SELECT} WHERE i.sprint_id = ?1 ORDER BY i.position ASC, i.created_at_us DESC"),
        &[&id],
    )
}

/// Sum of story points over Done items currently in the sprint.
pub fn done_points(conn: &Connection, sprint_id: Uuid) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(story_points), 0) FROM items WHERE sprint_id = ?1 AND status = ?2",
        params![sprint_id.to_string(), ItemStatus::Done.as_str()],
        |row| row.get(0),
    )?)
}

struct WhereClause {
    sql: String,
    values: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    fn params(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(AsRef::as_ref).collect()
    }
}

fn push_in(
    conditions: &mut Vec<String>,
    values: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    members: impl IntoIterator<Item = String>,
) {
    let mut placeholders = String::new();
    for member in members {
        values.push(Box::new(member));
        if !placeholders.is_empty() {
            placeholders.push_str(", ");
        }
        let _ = write!(placeholders, "?{}", values.len());
    }
    if !placeholders.is_empty() {
        conditions.push(format!("{column} IN ({placeholders})"));
    }
}

fn build_where(filter: &ItemFilter) -> WhereClause {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(project_id) = filter.project_id {
        values.push(Box::new(project_id.to_string()));
        conditions.push(format!("i.project_id = ?{}", values.len()));
    }

    if let Some(ref search) = filter.search {
        values.push(Box::new(like_pattern(search)));
        let n = values.len();
        conditions.push(format!(
            "(i.title LIKE ?{n} ESCAPE '\\' OR i.description LIKE ?{n} ESCAPE '\\')"
        ));
    }

    push_in(
        &mut conditions,
        &mut values,
        "i.item_type",
        filter.types.iter().map(|t| t.as_str().to_string()),
    );
    push_in(
        &mut conditions,
        &mut values,
        "i.priority",
        filter.priorities.iter().map(|p| p.as_str().to_string()),
    );
    push_in(
        &mut conditions,
        &mut values,
        "i.status",
        filter.statuses.iter().map(|s| s.as_str().to_string()),
    );

    match filter.sprint {
        Some(SprintFilter::Unassigned) => conditions.push("i.sprint_id IS NULL".to_string()),
        Some(SprintFilter::Sprint(id)) => {
            values.push(Box::new(id.to_string()));
            conditions.push(format!("i.sprint_id = ?{}", values.len()));
        }
        None => {}
    }

    if !filter.labels.is_empty() {
        let mut label_conditions = Vec::new();
        push_in(
            &mut label_conditions,
            &mut values,
            "l.label",
            filter.labels.iter().cloned(),
        );
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM item_labels l WHERE l.item_id = i.id AND {})",
            label_conditions.join(" AND ")
        ));
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    WhereClause { sql, values }
}

/// List items matching `filter`. With a project filter results follow
/// backlog order (position ascending), otherwise newest first.
pub fn list(
    conn: &Connection,
    filter: &ItemFilter,
    page: Option<PageRequest>,
) -> Result<Vec<BacklogItem>> {
    let clause = build_where(filter);
    let order = if filter.project_id.is_some() {
        " ORDER BY i.position ASC, i.created_at_us DESC"
    } else {
        " ORDER BY i.created_at_us DESC"
    };
    let limit_clause = page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.limit, p.offset()))
        .unwrap_or_default();

    query_items(
        conn,
        &format!("{ITEM_SELECT}{}{order}{limit_clause}", clause.sql),
        &clause.params(),
    )
}

pub fn count(conn: &Connection, filter: &ItemFilter) -> Result<u64> {
    let clause = build_where(filter);
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM items i{}", clause.sql),
        params_from_iter(clause.params()),
        |row| row.get(0),
    )?)
}
