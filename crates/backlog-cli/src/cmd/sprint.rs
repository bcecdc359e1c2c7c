//! `bl sprint`: plan sprints, run their lifecycle and report on them.

use anyhow::Result;
use backlog_core::model::history::SprintHistory;
use backlog_core::model::sprint::{
    NewSprint, Sprint, SprintQuery, SprintReport, SprintUpdate, SprintWithItems,
};
use backlog_core::service::SprintService;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde_json::json;
use std::io::{self, Write};
use uuid::Uuid;

use super::Session;
use crate::output::{
    date, plain, pretty_kv, pretty_rule, pretty_section, render, render_mode, short_id, timestamp,
};

#[derive(Subcommand, Debug)]
pub enum SprintCommand {
    /// Create a sprint in Planning.
    Create(CreateArgs),
    /// List sprints, latest start date first.
    List(ListArgs),
    /// Show a sprint with its items.
    Show {
        id: Uuid,
    },
    /// Show the project's running sprint, if any.
    Active {
        /// Project id or key.
        project: String,
    },
    /// Change name, goal or dates.
    Update(UpdateArgs),
    /// Delete a sprint; its items return to the backlog.
    Delete {
        id: Uuid,
    },
    /// Planning -> Active. A project runs at most one sprint at a time.
    Start {
        id: Uuid,
    },
    /// Active -> Completed, freezing velocity from the Done items.
    Complete {
        id: Uuid,
    },
    /// Planning|Active -> Cancelled.
    Cancel {
        id: Uuid,
    },
    /// Put an item into the sprint.
    Add {
        sprint: Uuid,
        item: Uuid,
    },
    /// Take an item out of the sprint.
    Remove {
        sprint: Uuid,
        item: Uuid,
    },
    /// Show the sprint's history, newest first.
    History {
        id: Uuid,
    },
    /// Item counts, points, velocity and completion percentage.
    Report {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project id or key.
    #[arg(long)]
    pub project: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub goal: Option<String>,

    /// YYYY-MM-DD or RFC 3339.
    #[arg(long, value_parser = parse_date)]
    pub start: DateTime<Utc>,

    /// YYYY-MM-DD or RFC 3339; must be after the start.
    #[arg(long, value_parser = parse_date)]
    pub end: DateTime<Utc>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project id or key.
    #[arg(long)]
    pub project: Option<String>,

    #[arg(long = "status")]
    pub statuses: Vec<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub page: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: Uuid,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub goal: Option<String>,

    #[arg(long, value_parser = parse_date)]
    pub start: Option<DateTime<Utc>>,

    #[arg(long, value_parser = parse_date)]
    pub end: Option<DateTime<Utc>>,
}

/// Accept a bare date (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got '{raw}'"))
}

pub fn run(command: &SprintCommand, session: &Session<'_>) -> Result<()> {
    let output = session.output();
    let sprints = &session.services.sprints;
    match command {
        SprintCommand::Create(args) => {
            let actor = session.actor()?;
            let project = session.project(&args.project)?;
            let sprint = sprints.create(
                actor,
                NewSprint {
                    project_id: project.id,
                    name: args.name.clone(),
                    goal: args.goal.clone(),
                    start_date: args.start,
                    end_date: args.end,
                },
            )?;
            render(output, &sprint, write_sprint)
        }
        SprintCommand::List(args) => {
            let project_id = match &args.project {
                Some(raw) => Some(session.project(raw)?.id),
                None => None,
            };
            let page = sprints.list(&SprintQuery {
                project_id,
                statuses: args.statuses.clone(),
                page: args.page,
                limit: args.limit,
            })?;
            render_mode(
                output,
                &page,
                |page, w| write_rows(&page.items, w),
                |page, w| {
                    pretty_section(
                        w,
                        &format!(
                            "Sprints (page {}/{}, {} total)",
                            page.page,
                            page.total_pages.max(1),
                            page.total
                        ),
                    )?;
                    write_rows(&page.items, w)
                },
            )
        }
        SprintCommand::Show { id } => {
            let sprint = sprints.get_with_items(*id)?;
            render(output, &sprint, write_sprint_with_items)
        }
        SprintCommand::Active { project } => {
            let project = session.project(project)?;
            let active = sprints.get_active(project.id)?;
            render(output, &active, |active, w| match active {
                Some(sprint) => write_sprint(sprint, w),
                None => writeln!(w, "No active sprint in {}", project.key),
            })
        }
        SprintCommand::Update(args) => {
            let actor = session.actor()?;
            let sprint = sprints.update(
                actor,
                args.id,
                SprintUpdate {
                    name: args.name.clone(),
                    goal: args.goal.clone(),
                    start_date: args.start,
                    end_date: args.end,
                },
            )?;
            render(output, &sprint, write_sprint)
        }
        SprintCommand::Delete { id } => {
            let actor = session.actor()?;
            sprints.delete(actor, *id)?;
            render(output, &json!({ "id": id, "deleted": true }), |_, w| {
                writeln!(w, "Deleted sprint {id}")
            })
        }
        SprintCommand::Start { id } => {
            let sprint = sprints.start(session.actor()?, *id)?;
            render(output, &sprint, write_sprint)
        }
        SprintCommand::Complete { id } => {
            let sprint = sprints.complete(session.actor()?, *id)?;
            render(output, &sprint, write_sprint)
        }
        SprintCommand::Cancel { id } => {
            let sprint = sprints.cancel(session.actor()?, *id)?;
            render(output, &sprint, write_sprint)
        }
        SprintCommand::Add { sprint, item } => {
            let sprint = sprints.add_item(session.actor()?, *sprint, *item)?;
            render(output, &sprint, write_sprint_with_items)
        }
        SprintCommand::Remove { sprint, item } => {
            let sprint = sprints.remove_item(session.actor()?, *sprint, *item)?;
            render(output, &sprint, write_sprint_with_items)
        }
        SprintCommand::History { id } => {
            let history = sprints.history(*id)?;
            render(output, &history, |history, w| {
                for entry in history {
                    write_history_line(entry, w)?;
                }
                Ok(())
            })
        }
        SprintCommand::Report { id } => {
            let report = sprints.report(*id)?;
            render_mode(
                output,
                &report,
                |r, w| {
                    writeln!(
                        w,
                        "{}\t{}\t{}\t{}\t{}\t{}\t{:.1}",
                        r.sprint.id,
                        r.total_items,
                        r.completed_items,
                        r.total_story_points,
                        r.completed_story_points,
                        r.velocity,
                        r.completion_percentage
                    )
                },
                write_report,
            )
        }
    }
}

fn write_sprint(sprint: &Sprint, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "id", sprint.id.to_string())?;
    pretty_kv(w, "name", &sprint.name)?;
    if let Some(project) = &sprint.project {
        pretty_kv(w, "project", &project.key)?;
    }
    pretty_kv(w, "status", sprint.status.as_str())?;
    pretty_kv(
        w,
        "dates",
        format!("{} .. {}", date(&sprint.start_date), date(&sprint.end_date)),
    )?;
    if let Some(goal) = &sprint.goal {
        pretty_kv(w, "goal", goal)?;
    }
    if let Some(velocity) = sprint.velocity {
        pretty_kv(w, "velocity", velocity.to_string())?;
    }
    pretty_kv(w, "updated", timestamp(&sprint.updated_at))
}

fn write_sprint_with_items(sprint: &SprintWithItems, w: &mut dyn Write) -> io::Result<()> {
    write_sprint(&sprint.sprint, w)?;
    pretty_kv(
        w,
        "items",
        format!("{} ({} points)", sprint.total_items, sprint.total_points),
    )?;
    if sprint.items.is_empty() {
        return Ok(());
    }
    pretty_rule(w)?;
    for item in &sprint.items {
        writeln!(
            w,
            "{}  {:<11} {}",
            short_id(&item.id),
            item.status.as_str(),
            item.title
        )?;
    }
    Ok(())
}

fn write_rows(sprints: &[Sprint], w: &mut dyn Write) -> io::Result<()> {
    for s in sprints {
        writeln!(
            w,
            "{}  {:<9} {} .. {}  {}",
            short_id(&s.id),
            s.status.as_str(),
            date(&s.start_date),
            date(&s.end_date),
            s.name
        )?;
    }
    Ok(())
}

fn write_report(report: &SprintReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Sprint report: {}", report.sprint.name))?;
    pretty_kv(w, "status", report.sprint.status.as_str())?;
    pretty_kv(
        w,
        "items",
        format!("{}/{} done", report.completed_items, report.total_items),
    )?;
    pretty_kv(
        w,
        "points",
        format!(
            "{}/{} done",
            report.completed_story_points, report.total_story_points
        ),
    )?;
    pretty_kv(w, "velocity", report.velocity.to_string())?;
    pretty_kv(w, "completion", format!("{:.1}%", report.completion_percentage))
}

fn write_history_line(entry: &SprintHistory, w: &mut dyn Write) -> io::Result<()> {
    let who = entry
        .user
        .as_ref()
        .map_or_else(|| short_id(&entry.user_id), |u| u.name.clone());
    let subject = entry
        .item
        .as_ref()
        .map(|i| i.title.clone())
        .or_else(|| entry.item_id.map(|id| short_id(&id)))
        .unwrap_or_default();
    let change = if entry.old_value.is_none() && entry.new_value.is_none() {
        String::new()
    } else {
        format!(
            "{} -> {}",
            plain(entry.old_value.as_ref()),
            plain(entry.new_value.as_ref())
        )
    };
    writeln!(
        w,
        "{}  {:<12} {:<12} {} {}",
        timestamp(&entry.created_at),
        entry.action.as_str(),
        who,
        subject,
        change
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_date_accepts_bare_dates_and_rfc3339() {
        let midnight = Utc
            .with_ymd_and_hms(2026, 3, 2, 0, 0, 0)
            .single()
            .expect("valid date");
        assert_eq!(parse_date("2026-03-02").expect("bare"), midnight);
        assert_eq!(
            parse_date("2026-03-02T02:00:00+02:00").expect("rfc3339"),
            midnight
        );
        assert!(parse_date("next monday").is_err());
    }
}
