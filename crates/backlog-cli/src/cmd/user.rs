//! `bl user`: register users and inspect their activity.

use anyhow::Result;
use backlog_core::model::activity::{Activity, ActivityKind};
use backlog_core::model::user::{IdentityClaims, User};
use backlog_core::service::{ActivityService, UserService};
use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::Session;
use crate::output::{pretty_kv, pretty_section, render, render_mode, timestamp};

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user from identity-provider claims, or refresh the one
    /// with the same Google id.
    Register(RegisterArgs),
    /// List registered users.
    List,
    /// Show one user by id or email.
    Show {
        /// User id or email.
        user: String,
    },
    /// Show a user's merged activity timeline, newest first.
    Activity(ActivityArgs),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub google_id: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub avatar_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ActivityArgs {
    /// User id or email. Defaults to the acting user.
    pub user: Option<String>,

    /// Maximum entries to show; zero or less shows everything.
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

pub fn run(command: &UserCommand, session: &Session<'_>) -> Result<()> {
    let output = session.output();
    match command {
        UserCommand::Register(args) => {
            let user = session.services.users.register(&IdentityClaims {
                google_id: args.google_id.clone(),
                email: args.email.clone(),
                name: args.name.clone(),
                avatar_url: args.avatar_url.clone(),
            })?;
            render(output, &user, write_user)
        }
        UserCommand::List => {
            let users = session.services.users.list()?;
            render_mode(
                output,
                &users,
                |users, w| {
                    for u in users {
                        writeln!(w, "{}\t{}\t{}", u.id, u.email, u.name)?;
                    }
                    Ok(())
                },
                |users, w| {
                    pretty_section(w, &format!("Users ({})", users.len()))?;
                    for u in users {
                        writeln!(w, "{:<32} {}", u.email, u.name)?;
                    }
                    Ok(())
                },
            )
        }
        UserCommand::Show { user } => {
            let user = session.user(user)?;
            render(output, &user, write_user)
        }
        UserCommand::Activity(args) => {
            let user_id = match &args.user {
                Some(raw) => session.user(raw)?.id,
                None => session.actor()?,
            };
            let limit = args
                .limit
                .unwrap_or(session.ctx.config.project.activity.default_limit);
            let feed = session.services.activity.user_activity(user_id, limit)?;
            render_mode(
                output,
                &feed,
                |feed, w| {
                    for a in &feed.activities {
                        writeln!(
                            w,
                            "{}\t{}\t{}\t{}",
                            a.created_at.to_rfc3339(),
                            kind_label(a.kind),
                            a.action,
                            subject(a)
                        )?;
                    }
                    Ok(())
                },
                |feed, w| {
                    pretty_section(
                        w,
                        &format!(
                            "Activity ({} of {})",
                            feed.activities.len(),
                            feed.total
                        ),
                    )?;
                    for a in &feed.activities {
                        writeln!(
                            w,
                            "{}  {:<6} {:<16} {}",
                            timestamp(&a.created_at),
                            kind_label(a.kind),
                            a.action,
                            subject(a)
                        )?;
                    }
                    Ok(())
                },
            )
        }
    }
}

fn write_user(user: &User, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "id", user.id.to_string())?;
    pretty_kv(w, "name", &user.name)?;
    pretty_kv(w, "email", &user.email)?;
    if let Some(avatar) = &user.avatar_url {
        pretty_kv(w, "avatar", avatar)?;
    }
    pretty_kv(w, "registered", timestamp(&user.created_at))
}

const fn kind_label(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Item => "item",
        ActivityKind::Sprint => "sprint",
    }
}

/// What an activity entry is about, for one-line listings.
fn subject(activity: &Activity) -> String {
    let mut parts = Vec::new();
    if let Some(sprint) = &activity.sprint {
        parts.push(format!("[{}]", sprint.name));
    }
    if let Some(item) = &activity.item {
        parts.push(item.title.clone());
    }
    if let Some(comment) = &activity.comment {
        parts.push(format!("\"{comment}\""));
    }
    parts.join(" ")
}
