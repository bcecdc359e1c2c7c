//! `bl project`: manage the projects that own items and sprints.

use anyhow::Result;
use backlog_core::model::project::{NewProject, Project, ProjectUpdate};
use backlog_core::service::ProjectService;
use clap::{Args, Subcommand};
use serde_json::json;
use std::io::{self, Write};

use super::Session;
use crate::output::{pretty_kv, pretty_section, render, render_mode, timestamp};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project with a unique short key.
    Create(CreateArgs),
    /// List projects, newest first.
    List(ListArgs),
    /// Show a project by id or key.
    Show {
        /// Project id or key.
        project: String,
    },
    /// Rename a project or change its description.
    Update(UpdateArgs),
    /// Delete a project together with its items and sprints.
    Delete {
        /// Project id or key.
        project: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    /// 2-10 letters or digits; stored uppercase.
    #[arg(long)]
    pub key: String,

    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, allow_negative_numbers = true)]
    pub page: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Return every project without pagination.
    #[arg(long, conflicts_with_all = ["page", "limit"])]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Project id or key.
    pub project: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

pub fn run(command: &ProjectCommand, session: &Session<'_>) -> Result<()> {
    let output = session.output();
    let projects = &session.services.projects;
    match command {
        ProjectCommand::Create(args) => {
            let actor = session.actor()?;
            let project = projects.create(
                actor,
                NewProject {
                    name: args.name.clone(),
                    key: args.key.clone(),
                    description: args.description.clone(),
                },
            )?;
            render(output, &project, write_project)
        }
        ProjectCommand::List(args) => {
            if args.all {
                let all = projects.list_all()?;
                return render_mode(output, &all, |all, w| write_rows(all, w), |all, w| {
                    pretty_section(w, &format!("Projects ({})", all.len()))?;
                    write_rows(all, w)
                });
            }
            let page = projects.list(args.page, args.limit)?;
            render_mode(
                output,
                &page,
                |page, w| write_rows(&page.items, w),
                |page, w| {
                    pretty_section(
                        w,
                        &format!(
                            "Projects (page {}/{}, {} total)",
                            page.page,
                            page.total_pages.max(1),
                            page.total
                        ),
                    )?;
                    write_rows(&page.items, w)
                },
            )
        }
        ProjectCommand::Show { project } => {
            let project = session.project(project)?;
            render(output, &project, write_project)
        }
        ProjectCommand::Update(args) => {
            let project = session.project(&args.project)?;
            let project = projects.update(
                project.id,
                ProjectUpdate {
                    name: args.name.clone(),
                    description: args.description.clone(),
                },
            )?;
            render(output, &project, write_project)
        }
        ProjectCommand::Delete { project } => {
            let project = session.project(project)?;
            projects.delete(project.id)?;
            tracing::info!(project_id = %project.id, key = %project.key, "project deleted");
            render(
                output,
                &json!({ "id": project.id, "key": project.key, "deleted": true }),
                |_, w| writeln!(w, "Deleted project {}", project.key),
            )
        }
    }
}

fn write_project(project: &Project, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "id", project.id.to_string())?;
    pretty_kv(w, "key", &project.key)?;
    pretty_kv(w, "name", &project.name)?;
    if let Some(description) = &project.description {
        pretty_kv(w, "description", description)?;
    }
    pretty_kv(w, "created", timestamp(&project.created_at))?;
    pretty_kv(w, "updated", timestamp(&project.updated_at))
}

fn write_rows(projects: &[Project], w: &mut dyn Write) -> io::Result<()> {
    for p in projects {
        writeln!(w, "{:<10} {}\t{}", p.key, p.name, p.id)?;
    }
    Ok(())
}
