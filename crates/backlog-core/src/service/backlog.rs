//! Backlog item store.
//!
//! Field changes are diffed against the stored row and each changed field
//! gets its own item-ledger entry. Sprint reference changes go through
//! [`ledger::reassign`] so both ledgers stay in step.

use rusqlite::Connection;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ledger, validate};
use crate::clock;
use crate::config::PaginationConfig;
use crate::db::{Database, history, items, projects, sprints};
use crate::error::{BacklogError, Result};
use crate::model::history::{ItemAction, ItemHistory, NewItemHistory};
use crate::model::item::{
    BacklogItem, BacklogItemUpdate, ItemQuery, ItemStatus, NewBacklogItem, SprintChange,
};
use crate::model::page::{Page, PageRequest};

pub trait BacklogService: Send + Sync {
    fn create(&self, actor: Uuid, new: NewBacklogItem) -> Result<BacklogItem>;
    fn get(&self, id: Uuid) -> Result<BacklogItem>;
    fn list(&self, query: &ItemQuery) -> Result<Page<BacklogItem>>;
    fn update(&self, actor: Uuid, id: Uuid, update: BacklogItemUpdate) -> Result<BacklogItem>;
    fn delete(&self, actor: Uuid, id: Uuid) -> Result<()>;

    fn update_status(&self, actor: Uuid, id: Uuid, status: &str) -> Result<BacklogItem>;
    fn update_priority(&self, actor: Uuid, id: Uuid, priority: &str) -> Result<BacklogItem>;

    /// Adding a label the item already carries changes nothing and records
    /// nothing.
    fn add_label(&self, actor: Uuid, id: Uuid, label: &str) -> Result<BacklogItem>;
    fn remove_label(&self, actor: Uuid, id: Uuid, label: &str) -> Result<BacklogItem>;

    /// Append a comment to the item's ledger and return the new entry.
    fn add_comment(&self, actor: Uuid, id: Uuid, text: &str) -> Result<ItemHistory>;
    fn history(&self, id: Uuid) -> Result<Vec<ItemHistory>>;
}

#[derive(Debug, Clone)]
pub struct SqliteBacklogService {
    db: Database,
    pagination: PaginationConfig,
}

impl SqliteBacklogService {
    #[must_use]
    pub const fn new(db: Database, pagination: PaginationConfig) -> Self {
        Self { db, pagination }
    }
}

fn load(conn: &Connection, id: Uuid) -> Result<BacklogItem> {
    items::get(conn, id)?.ok_or(BacklogError::ItemNotFound(id))
}

fn ensure_sprint(conn: &Connection, sprint_id: Uuid) -> Result<()> {
    match sprints::get(conn, sprint_id)? {
        Some(_) => Ok(()),
        None => Err(BacklogError::sprint_not_found(sprint_id)),
    }
}

/// Present, non-blank text from a partial update.
fn provided(raw: Option<&str>) -> Option<&str> {
    raw.filter(|v| !v.trim().is_empty())
}

/// One recorded field change.
struct Change {
    field: &'static str,
    old: Value,
    new: Value,
}

impl Change {
    fn entry(&self, item_id: Uuid, actor: Uuid) -> NewItemHistory {
        NewItemHistory::new(item_id, actor, ItemAction::for_field(self.field))
            .field(self.field)
            .old(self.old.clone())
            .new_value(self.new.clone())
    }
}

fn track<T: PartialEq + serde::Serialize>(
    changes: &mut Vec<Change>,
    field: &'static str,
    old: &T,
    new: &T,
) {
    if old != new {
        changes.push(Change {
            field,
            old: json!(old),
            new: json!(new),
        });
    }
}

impl SqliteBacklogService {
    /// Shared body of the single-field status and priority updates.
    fn set_field<F>(&self, actor: Uuid, id: Uuid, field: &'static str, apply: F) -> Result<BacklogItem>
    where
        F: FnOnce(&mut BacklogItem) -> (Value, Value),
    {
        self.db.write(|tx| {
            let current = load(tx, id)?;
            let mut next = current.clone();
            let (old, new) = apply(&mut next);
            if old == new {
                return Ok(current);
            }
            next.updated_at = clock::now();
            items::save(tx, &next)?;
            history::append_item(
                tx,
                &NewItemHistory::new(id, actor, ItemAction::for_field(field))
                    .field(field)
                    .old(old)
                    .new_value(new),
            )?;
            tracing::debug!(item_id = %id, user_id = %actor, field, "item field updated");
            load(tx, id)
        })
    }
}

impl BacklogService for SqliteBacklogService {
    fn create(&self, actor: Uuid, new: NewBacklogItem) -> Result<BacklogItem> {
        let title = validate::required("title", &new.title, validate::TITLE_MAX)?;
        let description = validate::optional(
            "description",
            new.description.as_deref(),
            validate::DESCRIPTION_MAX,
        )?;
        let item_type = validate::item_type(&new.item_type)?;
        let priority = validate::priority(&new.priority)?;
        let status = match provided(new.status.as_deref()) {
            Some(raw) => validate::status(raw)?,
            None => ItemStatus::New,
        };
        let story_points = validate::story_points(new.story_points)?;
        let labels = validate::labels(&new.labels)?;

        self.db.write(|tx| {
            if let Some(sprint_id) = new.sprint_id {
                ensure_sprint(tx, sprint_id)?;
            }
            let position = projects::next_item_position(tx, new.project_id)?;
            let now = clock::now();
            let item = BacklogItem {
                id: Uuid::new_v4(),
                project_id: new.project_id,
                sprint_id: None,
                created_by_id: actor,
                title,
                description,
                item_type,
                priority,
                status,
                story_points,
                labels,
                position,
                created_at: now,
                updated_at: now,
                created_by: None,
                sprint: None,
            };
            items::insert(tx, &item)?;
            history::append_item(tx, &NewItemHistory::new(item.id, actor, ItemAction::Created))?;
            ledger::reassign(tx, actor, &item, new.sprint_id)?;
            tracing::debug!(
                item_id = %item.id,
                project_id = %item.project_id,
                user_id = %actor,
                position,
                "backlog item created"
            );
            load(tx, item.id)
        })
    }

    fn get(&self, id: Uuid) -> Result<BacklogItem> {
        self.db.read(|conn| load(conn, id))
    }

    fn list(&self, query: &ItemQuery) -> Result<Page<BacklogItem>> {
        let req = PageRequest::normalize(query.page, query.limit, &self.pagination);
        let filter = query.to_filter();
        self.db.read(|conn| {
            let total = items::count(conn, &filter)?;
            let rows = items::list(conn, &filter, Some(req))?;
            Ok(Page::new(rows, total, req))
        })
    }

    fn update(&self, actor: Uuid, id: Uuid, update: BacklogItemUpdate) -> Result<BacklogItem> {
        let title = provided(update.title.as_deref())
            .map(|t| validate::required("title", t, validate::TITLE_MAX))
            .transpose()?;
        let description = validate::optional(
            "description",
            update.description.as_deref(),
            validate::DESCRIPTION_MAX,
        )?;
        let item_type = provided(update.item_type.as_deref())
            .map(validate::item_type)
            .transpose()?;
        let priority = provided(update.priority.as_deref())
            .map(validate::priority)
            .transpose()?;
        let status = provided(update.status.as_deref())
            .map(validate::status)
            .transpose()?;
        let story_points = validate::story_points(update.story_points)?;
        let labels = update
            .labels
            .as_deref()
            .map(validate::labels)
            .transpose()?;

        self.db.write(|tx| {
            let current = load(tx, id)?;
            let mut next = current.clone();
            if let Some(title) = title {
                next.title = title;
            }
            if description.is_some() {
                next.description = description;
            }
            if let Some(item_type) = item_type {
                next.item_type = item_type;
            }
            if let Some(priority) = priority {
                next.priority = priority;
            }
            if let Some(status) = status {
                next.status = status;
            }
            if story_points.is_some() {
                next.story_points = story_points;
            }
            if let Some(labels) = labels {
                next.labels = labels;
            }

            let mut changes = Vec::new();
            track(&mut changes, "title", &current.title, &next.title);
            track(&mut changes, "description", &current.description, &next.description);
            track(&mut changes, "type", &current.item_type, &next.item_type);
            track(&mut changes, "priority", &current.priority, &next.priority);
            track(&mut changes, "status", &current.status, &next.status);
            track(&mut changes, "story_points", &current.story_points, &next.story_points);
            track(&mut changes, "labels", &current.labels, &next.labels);

            if !changes.is_empty() {
                next.updated_at = clock::now();
                items::save(tx, &next)?;
                if current.labels != next.labels {
                    items::replace_labels(tx, id, &next.labels)?;
                }
                for change in &changes {
                    history::append_item(tx, &change.entry(id, actor))?;
                }
            }

            let target = match update.sprint {
                Some(SprintChange::Assign(sprint_id)) => {
                    ensure_sprint(tx, sprint_id)?;
                    Some(sprint_id)
                }
                Some(SprintChange::Unassign) => None,
                None => current.sprint_id,
            };
            ledger::reassign(tx, actor, &next, target)?;

            tracing::debug!(
                item_id = %id,
                user_id = %actor,
                changed = changes.len(),
                "backlog item updated"
            );
            load(tx, id)
        })
    }

    fn delete(&self, actor: Uuid, id: Uuid) -> Result<()> {
        self.db.write(|tx| {
            let item = load(tx, id)?;
            ledger::reassign(tx, actor, &item, None)?;
            items::delete(tx, id)?;
            tracing::debug!(item_id = %id, user_id = %actor, "backlog item deleted");
            Ok(())
        })
    }

    fn update_status(&self, actor: Uuid, id: Uuid, status: &str) -> Result<BacklogItem> {
        let status = validate::status(status)?;
        self.set_field(actor, id, "status", |item| {
            let old = json!(item.status);
            item.status = status;
            (old, json!(status))
        })
    }

    fn update_priority(&self, actor: Uuid, id: Uuid, priority: &str) -> Result<BacklogItem> {
        let priority = validate::priority(priority)?;
        self.set_field(actor, id, "priority", |item| {
            let old = json!(item.priority);
            item.priority = priority;
            (old, json!(priority))
        })
    }

    fn add_label(&self, actor: Uuid, id: Uuid, label: &str) -> Result<BacklogItem> {
        let label = validate::label(label)?;
        self.db.write(|tx| {
            load(tx, id)?;
            if items::add_label(tx, id, &label)? {
                items::touch(tx, id, clock::next_timestamp_us())?;
                history::append_item(
                    tx,
                    &NewItemHistory::new(id, actor, ItemAction::LabelAdded).new_value(json!(label)),
                )?;
                tracing::debug!(item_id = %id, user_id = %actor, label, "label added");
            }
            load(tx, id)
        })
    }

    fn remove_label(&self, actor: Uuid, id: Uuid, label: &str) -> Result<BacklogItem> {
        let label = label.trim();
        self.db.write(|tx| {
            load(tx, id)?;
            if items::remove_label(tx, id, label)? {
                items::touch(tx, id, clock::next_timestamp_us())?;
                history::append_item(
                    tx,
                    &NewItemHistory::new(id, actor, ItemAction::LabelRemoved).old(json!(label)),
                )?;
                tracing::debug!(item_id = %id, user_id = %actor, label, "label removed");
            }
            load(tx, id)
        })
    }

    fn add_comment(&self, actor: Uuid, id: Uuid, text: &str) -> Result<ItemHistory> {
        let text = validate::required("comment", text, validate::COMMENT_MAX)?;
        self.db.write(|tx| {
            load(tx, id)?;
            let entry_id = history::append_item(
                tx,
                &NewItemHistory::new(id, actor, ItemAction::CommentAdded).comment(text),
            )?;
            history::item_entry(tx, entry_id)?.ok_or(BacklogError::ItemNotFound(id))
        })
    }

    fn history(&self, id: Uuid) -> Result<Vec<ItemHistory>> {
        self.db.read(|conn| {
            load(conn, id)?;
            history::by_item(conn, id)
        })
    }
}
