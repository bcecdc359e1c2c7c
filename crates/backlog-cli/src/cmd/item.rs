//! `bl item`: create, edit and inspect backlog items.

use anyhow::Result;
use backlog_core::model::history::ItemHistory;
use backlog_core::model::item::{
    BacklogItem, BacklogItemUpdate, ItemQuery, NewBacklogItem, SprintChange, UNASSIGNED_SPRINT,
};
use backlog_core::service::BacklogService;
use clap::{Args, Subcommand};
use serde_json::json;
use std::io::{self, Write};
use uuid::Uuid;

use super::Session;
use crate::output::{plain, pretty_kv, pretty_section, render, render_mode, short_id, timestamp};

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Create a backlog item at the end of its project's ordering.
    Create(CreateArgs),
    /// List items, filtered and paginated.
    List(ListArgs),
    /// Show one item.
    Show {
        id: Uuid,
    },
    /// Edit several fields at once; one history entry is written per change.
    Update(UpdateArgs),
    /// Delete an item and its history.
    Delete {
        id: Uuid,
    },
    /// Set the workflow status (New, Ready, "In Progress", Done, Archived).
    Status {
        id: Uuid,
        status: String,
    },
    /// Set the priority (Critical, High, Medium, Low).
    Priority {
        id: Uuid,
        priority: String,
    },
    /// Add labels to an item.
    Tag(LabelArgs),
    /// Remove labels from an item.
    Untag(LabelArgs),
    /// Add a comment to the item's history.
    Comment {
        id: Uuid,
        text: String,
    },
    /// Show the item's change history, newest first.
    History {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project id or key.
    #[arg(long)]
    pub project: String,

    #[arg(long)]
    pub title: String,

    /// Story, Bug, Task or Epic.
    #[arg(long = "type", default_value = "Story")]
    pub item_type: String,

    #[arg(long, default_value = "Medium")]
    pub priority: String,

    /// Initial status; defaults to New.
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub points: Option<u32>,

    /// Repeatable.
    #[arg(long = "label")]
    pub labels: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Place the item into this sprint straight away.
    #[arg(long)]
    pub sprint: Option<Uuid>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project id or key.
    #[arg(long)]
    pub project: Option<String>,

    /// Case-insensitive match on title or description.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long = "type")]
    pub types: Vec<String>,

    #[arg(long = "priority")]
    pub priorities: Vec<String>,

    #[arg(long = "status")]
    pub statuses: Vec<String>,

    /// Sprint id, or `none` for items outside any sprint.
    #[arg(long)]
    pub sprint: Option<String>,

    /// Items carrying any of these labels.
    #[arg(long = "label")]
    pub labels: Vec<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub page: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: Uuid,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long = "type")]
    pub item_type: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub points: Option<u32>,

    /// Replace the label set (comma separated).
    #[arg(long, value_delimiter = ',', conflicts_with = "clear_labels")]
    pub labels: Option<Vec<String>>,

    /// Remove every label.
    #[arg(long)]
    pub clear_labels: bool,

    /// Move to this sprint id, or `none` to take the item out of its sprint.
    #[arg(long)]
    pub sprint: Option<String>,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    pub id: Uuid,

    #[arg(required = true)]
    pub labels: Vec<String>,
}

/// Parse the `--sprint` value of `bl item update`.
fn sprint_change(raw: &str) -> Result<SprintChange> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(UNASSIGNED_SPRINT) {
        return Ok(SprintChange::Unassign);
    }
    let id = Uuid::parse_str(raw)
        .map_err(|e| anyhow::anyhow!("invalid sprint id '{raw}': {e}"))?;
    Ok(SprintChange::Assign(id))
}

pub fn run(command: &ItemCommand, session: &Session<'_>) -> Result<()> {
    let output = session.output();
    let backlog = &session.services.backlog;
    match command {
        ItemCommand::Create(args) => {
            let actor = session.actor()?;
            let project = session.project(&args.project)?;
            let item = backlog.create(
                actor,
                NewBacklogItem {
                    project_id: project.id,
                    title: args.title.clone(),
                    description: args.description.clone(),
                    item_type: args.item_type.clone(),
                    priority: args.priority.clone(),
                    status: args.status.clone(),
                    story_points: args.points,
                    labels: args.labels.clone(),
                    sprint_id: args.sprint,
                },
            )?;
            render(output, &item, write_item)
        }
        ItemCommand::List(args) => {
            let project_id = match &args.project {
                Some(raw) => Some(session.project(raw)?.id),
                None => None,
            };
            let page = backlog.list(&ItemQuery {
                project_id,
                search: args.search.clone(),
                types: args.types.clone(),
                priorities: args.priorities.clone(),
                statuses: args.statuses.clone(),
                sprint_id: args.sprint.clone(),
                labels: args.labels.clone(),
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
                            "Items (page {}/{}, {} total)",
                            page.page,
                            page.total_pages.max(1),
                            page.total
                        ),
                    )?;
                    write_rows(&page.items, w)
                },
            )
        }
        ItemCommand::Show { id } => {
            let item = backlog.get(*id)?;
            render(output, &item, write_item)
        }
        ItemCommand::Update(args) => {
            let actor = session.actor()?;
            let labels = if args.clear_labels {
                Some(Vec::new())
            } else {
                args.labels.clone()
            };
            let sprint = args.sprint.as_deref().map(sprint_change).transpose()?;
            let item = backlog.update(
                actor,
                args.id,
                BacklogItemUpdate {
                    title: args.title.clone(),
                    description: args.description.clone(),
                    item_type: args.item_type.clone(),
                    priority: args.priority.clone(),
                    status: args.status.clone(),
                    story_points: args.points,
                    labels,
                    sprint,
                },
            )?;
            render(output, &item, write_item)
        }
        ItemCommand::Delete { id } => {
            let actor = session.actor()?;
            backlog.delete(actor, *id)?;
            render(output, &json!({ "id": id, "deleted": true }), |_, w| {
                writeln!(w, "Deleted item {id}")
            })
        }
        ItemCommand::Status { id, status } => {
            let actor = session.actor()?;
            let item = backlog.update_status(actor, *id, status)?;
            render(output, &item, write_item)
        }
        ItemCommand::Priority { id, priority } => {
            let actor = session.actor()?;
            let item = backlog.update_priority(actor, *id, priority)?;
            render(output, &item, write_item)
        }
        ItemCommand::Tag(args) => {
            let actor = session.actor()?;
            let mut item = backlog.get(args.id)?;
            for label in &args.labels {
                item = backlog.add_label(actor, args.id, label)?;
            }
            render(output, &item, write_item)
        }
        ItemCommand::Untag(args) => {
            let actor = session.actor()?;
            let mut item = backlog.get(args.id)?;
            for label in &args.labels {
                item = backlog.remove_label(actor, args.id, label)?;
            }
            render(output, &item, write_item)
        }
        ItemCommand::Comment { id, text } => {
            let actor = session.actor()?;
            let entry = backlog.add_comment(actor, *id, text)?;
            render(output, &entry, |entry, w| {
                writeln!(
                    w,
                    "Comment added to item {} at {}",
                    entry.item_id,
                    timestamp(&entry.created_at)
                )
            })
        }
        ItemCommand::History { id } => {
            let history = backlog.history(*id)?;
            render(output, &history, |history, w| {
                for entry in history {
                    write_history_line(entry, w)?;
                }
                Ok(())
            })
        }
    }
}

fn write_item(item: &BacklogItem, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "id", item.id.to_string())?;
    pretty_kv(w, "title", &item.title)?;
    pretty_kv(w, "type", item.item_type.as_str())?;
    pretty_kv(w, "priority", item.priority.as_str())?;
    pretty_kv(w, "status", item.status.as_str())?;
    if let Some(points) = item.story_points {
        pretty_kv(w, "points", points.to_string())?;
    }
    if !item.labels.is_empty() {
        pretty_kv(w, "labels", item.labels.join(", "))?;
    }
    match &item.sprint {
        Some(sprint) => pretty_kv(w, "sprint", format!("{} ({})", sprint.name, sprint.id))?,
        None => pretty_kv(w, "sprint", "-")?,
    }
    pretty_kv(w, "position", item.position.to_string())?;
    if let Some(description) = &item.description {
        pretty_kv(w, "description", description)?;
    }
    pretty_kv(w, "updated", timestamp(&item.updated_at))
}

fn write_rows(items: &[BacklogItem], w: &mut dyn Write) -> io::Result<()> {
    for item in items {
        let points = item
            .story_points
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        writeln!(
            w,
            "{}  {:<11} {:<8} {:<5} {:>3}  {}",
            short_id(&item.id),
            item.status.as_str(),
            item.priority.as_str(),
            item.item_type.as_str(),
            points,
            item.title
        )?;
    }
    Ok(())
}

fn write_history_line(entry: &ItemHistory, w: &mut dyn Write) -> io::Result<()> {
    let who = entry
        .user
        .as_ref()
        .map_or_else(|| short_id(&entry.user_id), |u| u.name.clone());
    let detail = match (&entry.comment, &entry.field_name) {
        (Some(comment), _) => format!("\"{comment}\""),
        (None, Some(field)) => format!(
            "{field}: {} -> {}",
            plain(entry.old_value.as_ref()),
            plain(entry.new_value.as_ref())
        ),
        (None, None) => String::new(),
    };
    writeln!(
        w,
        "{}  {:<16} {:<12} {}",
        timestamp(&entry.created_at),
        entry.action.as_str(),
        who,
        detail
    )
}
