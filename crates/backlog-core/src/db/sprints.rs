//! Sprint queries.

use rusqlite::{Connection, OptionalExtension, ToSql, ffi, params, params_from_iter};
use std::fmt::Write as _;
use uuid::Uuid;

use super::{get_parsed, get_ts, get_uuid, is_constraint};
use crate::error::{BacklogError, Result};
use crate::model::page::PageRequest;
use crate::model::project::ProjectSummary;
use crate::model::sprint::{Sprint, SprintFilter, SprintStatus};
use crate::model::user::UserSummary;

const SPRINT_SELECT: &str = "SELECT s.id, s.project_id, s.created_by, s.name, s.goal, \
     s.start_date_us, s.end_date_us, s.status, s.velocity, s.created_at_us, s.updated_at_us, \
     p.name, p.key, u.name, u.email, u.avatar_url \
     FROM sprints s \
     LEFT JOIN projects p ON p.id = s.project_id \
     LEFT JOIN users u ON u.id = s.created_by";

fn row_to_sprint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sprint> {
    let project_id = get_uuid(row, 1)?;
    let created_by_id = get_uuid(row, 2)?;
    let project_name: Option<String> = row.get(11)?;
    let user_name: Option<String> = row.get(13)?;

    Ok(Sprint {
        id: get_uuid(row, 0)?,
        project_id,
        created_by_id,
        name: row.get(3)?,
        goal: row.get(4)?,
        start_date: get_ts(row, 5)?,
        end_date: get_ts(row, 6)?,
        status: get_parsed(row, 7)?,
        velocity: row.get(8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
        project: match project_name {
            Some(name) => Some(ProjectSummary {
                id: project_id,
                name,
                key: row.get(12)?,
            }),
            None => None,
        },
        created_by: match user_name {
            Some(name) => Some(UserSummary {
                id: created_by_id,
                name,
                email: row.get(14)?,
                avatar_url: row.get(15)?,
            }),
            None => None,
        },
    })
}

/// Insert a fully built sprint. A missing project maps to
/// [`BacklogError::ProjectNotFound`].
pub fn insert(conn: &Connection, sprint: &Sprint) -> Result<()> {
    conn.execute(
        "INSERT INTO sprints (
            id, project_id, created_by, name, goal, start_date_us, end_date_us,
            status, velocity, created_at_us, updated_at_us
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            sprint.id.to_string(),
            sprint.project_id.to_string(),
            sprint.created_by_id.to_string(),
            sprint.name,
            sprint.goal,
            sprint.start_date.timestamp_micros(),
            sprint.end_date.timestamp_micros(),
            sprint.status.as_str(),
            sprint.velocity,
            sprint.created_at.timestamp_micros(),
            sprint.updated_at.timestamp_micros(),
        ],
    )
    .map_err(|e| {
        if is_constraint(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
            BacklogError::project_not_found(sprint.project_id)
        } else {
            BacklogError::from(e)
        }
    })?;
    Ok(())
}

pub fn get(conn: &Connection, id: Uuid) -> Result<Option<Sprint>> {
    Ok(conn
        .query_row(
            &format!("{SPRINT_SELECT} WHERE s.id = ?1"),
            [id.to_string()],
            row_to_sprint,
        )
        .optional()?)
}

/// The project's Active sprint, if any.
pub fn active_for_project(conn: &Connection, project_id: Uuid) -> Result<Option<Sprint>> {
    Ok(conn
        .query_row(
            &format!("{SPRINT_SELECT} WHERE s.project_id = ?1 AND s.status = ?2"),
            params![project_id.to_string(), SprintStatus::Active.as_str()],
            row_to_sprint,
        )
        .optional()?)
}

/// Write a status change (and, on completion, the frozen velocity).
///
/// The partial unique index over Active sprints turns a racing second start
/// into [`BacklogError::SprintAlreadyActive`].
pub fn set_status(
    conn: &Connection,
    sprint: &Sprint,
    status: SprintStatus,
    velocity: Option<u64>,
    now_us: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE sprints SET status = ?2, velocity = COALESCE(?3, velocity), updated_at_us = ?4
         WHERE id = ?1",
        params![sprint.id.to_string(), status.as_str(), velocity, now_us],
    )
    .map_err(|e| {
        if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) {
            BacklogError::SprintAlreadyActive {
                project_id: sprint.project_id,
            }
        } else {
            BacklogError::from(e)
        }
    })?;
    Ok(())
}

/// Overwrite name, goal and dates.
pub fn save(conn: &Connection, sprint: &Sprint) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sprints SET name = ?2, goal = ?3, start_date_us = ?4, end_date_us = ?5,
             updated_at_us = ?6
         WHERE id = ?1",
        params![
            sprint.id.to_string(),
            sprint.name,
            sprint.goal,
            sprint.start_date.timestamp_micros(),
            sprint.end_date.timestamp_micros(),
            sprint.updated_at.timestamp_micros(),
        ],
    )?;
    Ok(changed > 0)
}

/// Hard delete; the sprint ledger cascades and member items are unassigned.
pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
    Ok(conn.execute("DELETE FROM sprints WHERE id = ?1", [id.to_string()])? > 0)
}

fn build_where(filter: &SprintFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(project_id) = filter.project_id {
        values.push(Box::new(project_id.to_string()));
        conditions.push(format!("s.project_id = ?{}", values.len()));
    }

    if !filter.statuses.is_empty() {
        let mut placeholders = String::new();
        for status in &filter.statuses {
            values.push(Box::new(status.as_str()));
            if !placeholders.is_empty() {
                placeholders.push_str(", ");
            }
            let _ = write!(placeholders, "?{}", values.len());
        }
        conditions.push(format!("s.status IN ({placeholders})"));
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (sql, values)
}

/// Sprints matching `filter`, latest start date first.
pub fn list(
    conn: &Connection,
    filter: &SprintFilter,
    page: Option<PageRequest>,
) -> Result<Vec<Sprint>> {
    let (where_sql, values) = build_where(filter);
    let limit_clause = page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.limit, p.offset()))
        .unwrap_or_default();
    let mut stmt = conn.prepare(&format!(
        "{SPRINT_SELECT}{where_sql} ORDER BY s.start_date_us DESC, s.created_at_us DESC{limit_clause}"
    ))?;
    let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(params_from_iter(params), row_to_sprint)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count(conn: &Connection, filter: &SprintFilter) -> Result<u64> {
    let (where_sql, values) = build_where(filter);
    let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
    Ok(conn.query_row(
        &format!("SELECT COUNT(*) FROM sprints s{where_sql}"),
        params_from_iter(params),
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::db::{projects, test_support::test_db};
    use crate::model::project::NewProject;
    use chrono::Duration;

    fn project(conn: &Connection, key: &str) -> Uuid {
        projects::insert(
            conn,
            &NewProject {
                name: key.into(),
                key: key.into(),
                description: None,
            },
            Uuid::new_v4(),
        )
        .expect("project")
        .id
    }

    fn sprint(project_id: Uuid, name: &str, offset_days: i64) -> Sprint {
        let now = clock::now();
        let start = now + Duration::days(offset_days);
        Sprint {
            id: Uuid::new_v4(),
            project_id,
            created_by_id: Uuid::new_v4(),
            name: name.into(),
            goal: None,
            start_date: start,
            end_date: start + Duration::days(14),
            status: SprintStatus::Planning,
            velocity: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            project: None,
        }
    }

    #[test]
    fn insert_into_missing_project_is_not_found() {
        let conn = test_db();
        let err = insert(&conn, &sprint(Uuid::new_v4(), "orphan", 0)).expect_err("fk");
        assert!(matches!(err, BacklogError::ProjectNotFound(_)));
    }

    #[test]
    fn second_active_sprint_maps_to_conflict() {
        let conn = test_db();
        let p = project(&conn, "ACT");
        let a = sprint(p, "a", 0);
        let b = sprint(p, "b", 14);
        insert(&conn, &a).expect("a");
        insert(&conn, &b).expect("b");

        set_status(&conn, &a, SprintStatus::Active, None, clock::next_timestamp_us())
            .expect("start a");
        let err = set_status(&conn, &b, SprintStatus::Active, None, clock::next_timestamp_us())
            .expect_err("second start");
        assert!(matches!(err, BacklogError::SprintAlreadyActive { project_id } if project_id == p));

        let active = active_for_project(&conn, p).expect("query").expect("one active");
        assert_eq!(active.id, a.id);
        assert_eq!(active.project.as_ref().map(|s| s.key.as_str()), Some("ACT"));
    }

    #[test]
    fn list_orders_by_start_date_and_filters_status() {
        let conn = test_db();
        let p = project(&conn, "LST");
        let early = sprint(p, "early", 0);
        let late = sprint(p, "late", 30);
        insert(&conn, &early).expect("early");
        insert(&conn, &late).expect("late");
        set_status(&conn, &early, SprintStatus::Cancelled, None, clock::next_timestamp_us())
            .expect("cancel");

        let all = list(&conn, &SprintFilter::default(), None).expect("list");
        assert_eq!(all[0].name, "late");
        assert_eq!(all[1].name, "early");

        let planning = SprintFilter {
            project_id: Some(p),
            statuses: vec![SprintStatus::Planning],
        };
        assert_eq!(count(&conn, &planning).expect("count"), 1);
        assert_eq!(list(&conn, &planning, None).expect("list")[0].id, late.id);
    }

    #[test]
    fn completion_freezes_velocity() {
        let conn = test_db();
        let p = project(&conn, "VEL");
        let s = sprint(p, "s", 0);
        insert(&conn, &s).expect("insert");
        set_status(&conn, &s, SprintStatus::Completed, Some(21), clock::next_timestamp_us())
            .expect("complete");
        let stored = get(&conn, s.id).expect("get").expect("exists");
        assert_eq!(stored.status, SprintStatus::Completed);
        assert_eq!(stored.velocity, Some(21));
    }
}
