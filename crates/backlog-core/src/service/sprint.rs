//! Sprint lifecycle: `Planning -> Active -> {Completed, Cancelled}`, with
//! `Planning -> Cancelled` allowed before start.
//!
//! Every operation that changes state runs inside one write transaction
//! together with its ledger rows. The at-most-one-Active-sprint rule is
//! checked inside that transaction and backed by a partial unique index, so
//! two racing starts on sibling sprints cannot both commit.

use rusqlite::Connection;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::{ledger, validate};
use crate::clock;
use crate::config::PaginationConfig;
use crate::db::{Database, history, items, projects, sprints};
use crate::error::{BacklogError, Result};
use crate::model::history::{NewSprintHistory, SprintAction, SprintHistory};
use crate::model::page::{Page, PageRequest};
use crate::model::sprint::{
    NewSprint, Sprint, SprintQuery, SprintReport, SprintStatus, SprintUpdate, SprintWithItems,
};

pub trait SprintService: Send + Sync {
    fn create(&self, actor: Uuid, new: NewSprint) -> Result<Sprint>;
    fn get(&self, id: Uuid) -> Result<Sprint>;
    fn list(&self, query: &SprintQuery) -> Result<Page<Sprint>>;
    fn get_with_items(&self, id: Uuid) -> Result<SprintWithItems>;
    /// The project's Active sprint, `None` when no sprint is running.
    fn get_active(&self, project_id: Uuid) -> Result<Option<Sprint>>;
    fn update(&self, actor: Uuid, id: Uuid, update: SprintUpdate) -> Result<Sprint>;
    fn delete(&self, actor: Uuid, id: Uuid) -> Result<()>;

    fn start(&self, actor: Uuid, id: Uuid) -> Result<Sprint>;
    /// Freeze velocity from the Done items currently in the sprint.
    fn complete(&self, actor: Uuid, id: Uuid) -> Result<Sprint>;
    fn cancel(&self, actor: Uuid, id: Uuid) -> Result<Sprint>;

    fn add_item(&self, actor: Uuid, sprint_id: Uuid, item_id: Uuid) -> Result<SprintWithItems>;
    fn remove_item(&self, actor: Uuid, sprint_id: Uuid, item_id: Uuid)
    -> Result<SprintWithItems>;

    fn history(&self, id: Uuid) -> Result<Vec<SprintHistory>>;
    fn report(&self, id: Uuid) -> Result<SprintReport>;
}

#[derive(Debug, Clone)]
pub struct SqliteSprintService {
    db: Database,
    pagination: PaginationConfig,
}

impl SqliteSprintService {
    #[must_use]
    pub const fn new(db: Database, pagination: PaginationConfig) -> Self {
        Self { db, pagination }
    }
}

fn load(conn: &Connection, id: Uuid) -> Result<Sprint> {
    sprints::get(conn, id)?.ok_or_else(|| BacklogError::sprint_not_found(id))
}

fn with_items(conn: &Connection, sprint: Sprint) -> Result<SprintWithItems> {
    let members = items::list_by_sprint(conn, sprint.id)?;
    Ok(SprintWithItems::new(sprint, members))
}

/// Record `field: [old, new]` into `changes` when the values differ.
fn diff<T: PartialEq + serde::Serialize>(
    changes: &mut Map<String, Value>,
    field: &str,
    old: &T,
    new: &T,
) {
    if old != new {
        changes.insert(field.to_string(), json!([old, new]));
    }
}

impl SprintService for SqliteSprintService {
    fn create(&self, actor: Uuid, new: NewSprint) -> Result<Sprint> {
        let name = validate::required("name", &new.name, validate::SPRINT_NAME_MAX)?;
        let goal = validate::optional("goal", new.goal.as_deref(), validate::GOAL_MAX)?;
        if new.end_date <= new.start_date {
            return Err(BacklogError::InvalidDateRange);
        }

        self.db.write(|tx| {
            let now = clock::now();
            let sprint = Sprint {
                id: Uuid::new_v4(),
                project_id: new.project_id,
                created_by_id: actor,
                name,
                goal,
                start_date: new.start_date,
                end_date: new.end_date,
                status: SprintStatus::Planning,
                velocity: None,
                created_at: now,
                updated_at: now,
                created_by: None,
                project: None,
            };
            sprints::insert(tx, &sprint)?;
            history::append_sprint(
                tx,
                &NewSprintHistory::new(sprint.id, actor, SprintAction::Created),
            )?;
            tracing::debug!(
                sprint_id = %sprint.id,
                project_id = %sprint.project_id,
                user_id = %actor,
                "sprint created"
            );
            load(tx, sprint.id)
        })
    }

    fn get(&self, id: Uuid) -> Result<Sprint> {
        self.db.read(|conn| load(conn, id))
    }

    fn list(&self, query: &SprintQuery) -> Result<Page<Sprint>> {
        let req = PageRequest::normalize(query.page, query.limit, &self.pagination);
        let filter = query.to_filter();
        self.db.read(|conn| {
            let total = sprints::count(conn, &filter)?;
            let rows = sprints::list(conn, &filter, Some(req))?;
            Ok(Page::new(rows, total, req))
        })
    }

    fn get_with_items(&self, id: Uuid) -> Result<SprintWithItems> {
        self.db.read(|conn| {
            let sprint = load(conn, id)?;
            with_items(conn, sprint)
        })
    }

    fn get_active(&self, project_id: Uuid) -> Result<Option<Sprint>> {
        self.db.read(|conn| {
            if !projects::exists(conn, project_id)? {
                return Err(BacklogError::project_not_found(project_id));
            }
            sprints::active_for_project(conn, project_id)
        })
    }

    fn update(&self, actor: Uuid, id: Uuid, update: SprintUpdate) -> Result<Sprint> {
        // Empty strings mean "leave unchanged".
        let name = update
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| validate::required("name", n, validate::SPRINT_NAME_MAX))
            .transpose()?;
        let goal = validate::optional("goal", update.goal.as_deref(), validate::GOAL_MAX)?;

        self.db.write(|tx| {
            let current = load(tx, id)?;
            let mut next = current.clone();
            if let Some(name) = name {
                next.name = name;
            }
            if goal.is_some() {
                next.goal = goal;
            }
            if let Some(start) = update.start_date {
                next.start_date = start;
            }
            if let Some(end) = update.end_date {
                next.end_date = end;
            }
            if next.end_date <= next.start_date {
                return Err(BacklogError::InvalidDateRange);
            }

            let mut changes = Map::new();
            diff(&mut changes, "name", &current.name, &next.name);
            diff(&mut changes, "goal", &current.goal, &next.goal);
            diff(&mut changes, "start_date", &current.start_date, &next.start_date);
            diff(&mut changes, "end_date", &current.end_date, &next.end_date);
            if changes.is_empty() {
                return Ok(current);
            }

            next.updated_at = clock::now();
            sprints::save(tx, &next)?;
            history::append_sprint(
                tx,
                &NewSprintHistory::new(id, actor, SprintAction::Updated)
                    .new_value(Value::Object(changes)),
            )?;
            tracing::debug!(sprint_id = %id, user_id = %actor, "sprint updated");
            load(tx, id)
        })
    }

    fn delete(&self, actor: Uuid, id: Uuid) -> Result<()> {
        self.db.write(|tx| {
            let sprint = load(tx, id)?;
            let members = items::list_by_sprint(tx, sprint.id)?;
            for item in &members {
                ledger::reassign(tx, actor, item, None)?;
            }
            sprints::delete(tx, sprint.id)?;
            tracing::debug!(
                sprint_id = %id,
                user_id = %actor,
                released = members.len(),
                "sprint deleted"
            );
            Ok(())
        })
    }

    fn start(&self, actor: Uuid, id: Uuid) -> Result<Sprint> {
        self.db.write(|tx| {
            let sprint = load(tx, id)?;
            if !sprint.status.can_transition_to(SprintStatus::Active) {
                return Err(BacklogError::SprintNotPlanning {
                    status: sprint.status,
                });
            }
            if sprints::active_for_project(tx, sprint.project_id)?.is_some() {
                return Err(BacklogError::SprintAlreadyActive {
                    project_id: sprint.project_id,
                });
            }

            sprints::set_status(
                tx,
                &sprint,
                SprintStatus::Active,
                None,
                clock::next_timestamp_us(),
            )?;
            history::append_sprint(
                tx,
                &NewSprintHistory::new(id, actor, SprintAction::Started)
                    .old(json!(sprint.status))
                    .new_value(json!(SprintStatus::Active)),
            )?;
            tracing::info!(
                sprint_id = %id,
                project_id = %sprint.project_id,
                user_id = %actor,
                "sprint started"
            );
            load(tx, id)
        })
    }

    fn complete(&self, actor: Uuid, id: Uuid) -> Result<Sprint> {
        self.db.write(|tx| {
            let sprint = load(tx, id)?;
            if !sprint.status.can_transition_to(SprintStatus::Completed) {
                return Err(BacklogError::SprintNotActive {
                    status: sprint.status,
                });
            }

            let velocity = items::done_points(tx, id)?;
            sprints::set_status(
                tx,
                &sprint,
                SprintStatus::Completed,
                Some(velocity),
                clock::next_timestamp_us(),
            )?;
            history::append_sprint(
                tx,
                &NewSprintHistory::new(id, actor, SprintAction::Completed)
                    .old(json!(sprint.status))
                    .new_value(json!({
                        "status": SprintStatus::Completed,
                        "velocity": velocity,
                    })),
            )?;
            tracing::info!(
                sprint_id = %id,
                project_id = %sprint.project_id,
                user_id = %actor,
                velocity,
                "sprint completed"
            );
            load(tx, id)
        })
    }

    fn cancel(&self, actor: Uuid, id: Uuid) -> Result<Sprint> {
        self.db.write(|tx| {
            let sprint = load(tx, id)?;
            if !sprint.status.can_transition_to(SprintStatus::Cancelled) {
                return Err(BacklogError::SprintNotActive {
                    status: sprint.status,
                });
            }

            sprints::set_status(
                tx,
                &sprint,
                SprintStatus::Cancelled,
                None,
                clock::next_timestamp_us(),
            )?;
            history::append_sprint(
                tx,
                &NewSprintHistory::new(id, actor, SprintAction::Cancelled)
                    .old(json!(sprint.status))
                    .new_value(json!(SprintStatus::Cancelled)),
            )?;
            tracing::info!(
                sprint_id = %id,
                project_id = %sprint.project_id,
                user_id = %actor,
                "sprint cancelled"
            );
            load(tx, id)
        })
    }

    fn add_item(&self, actor: Uuid, sprint_id: Uuid, item_id: Uuid) -> Result<SprintWithItems> {
        self.db.write(|tx| {
            let sprint = load(tx, sprint_id)?;
            let item = items::get(tx, item_id)?.ok_or(BacklogError::ItemNotFound(item_id))?;
            if item.sprint_id == Some(sprint_id) {
                return Err(BacklogError::ItemAlreadyInSprint { item_id, sprint_id });
            }
            ledger::reassign(tx, actor, &item, Some(sprint_id))?;
            with_items(tx, sprint)
        })
    }

    fn remove_item(
        &self,
        actor: Uuid,
        sprint_id: Uuid,
        item_id: Uuid,
    ) -> Result<SprintWithItems> {
        self.db.write(|tx| {
            let sprint = load(tx, sprint_id)?;
            let item = items::get(tx, item_id)?.ok_or(BacklogError::ItemNotFound(item_id))?;
            if item.sprint_id != Some(sprint_id) {
                return Err(BacklogError::ItemNotInSprint { item_id, sprint_id });
            }
            ledger::reassign(tx, actor, &item, None)?;
            with_items(tx, sprint)
        })
    }

    fn history(&self, id: Uuid) -> Result<Vec<SprintHistory>> {
        self.db.read(|conn| {
            load(conn, id)?;
            history::by_sprint(conn, id)
        })
    }

    fn report(&self, id: Uuid) -> Result<SprintReport> {
        self.db.read(|conn| {
            let sprint = load(conn, id)?;
            let members = items::list_by_sprint(conn, id)?;
            Ok(SprintReport::compute(sprint, &members))
        })
    }
}
