//! Command handlers, one module per command group.

pub mod init;
pub mod item;
pub mod project;
pub mod sprint;
pub mod user;

use anyhow::{Context as _, Result};
use backlog_core::config::{self, EffectiveConfig};
use backlog_core::db::Database;
use backlog_core::model::project::Project;
use backlog_core::model::user::User;
use backlog_core::service::{ProjectService, UserService};
use backlog_core::Services;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::actor;
use crate::output::{CliError, OutputMode, resolve_output_mode};

/// Resolved configuration and flags shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: EffectiveConfig,
    pub output: OutputMode,
    pub project_root: PathBuf,
    user_flag: Option<String>,
}

impl Context {
    /// Resolve config files, environment and global flags. `--db` replaces
    /// whatever database path the config layer settled on.
    pub fn load(
        project_root: &Path,
        json: bool,
        format: Option<OutputMode>,
        user_flag: Option<String>,
        db_override: Option<&Path>,
    ) -> Result<Self> {
        let mut config = config::resolve_config(project_root, json)?;
        if let Some(db) = db_override {
            config.db_path = if db.is_absolute() {
                db.to_path_buf()
            } else {
                project_root.join(db)
            };
        }
        let output = resolve_output_mode(format, &config.resolved_output);
        Ok(Self {
            config,
            output,
            project_root: project_root.to_path_buf(),
            user_flag,
        })
    }

    pub fn open_database(&self) -> Result<Database> {
        Database::open(&self.config.db_path, &self.config.project.database)
            .with_context(|| format!("open backlog at {}", self.config.db_path.display()))
    }
}

/// An open database plus the services built on it.
pub struct Session<'a> {
    pub ctx: &'a Context,
    pub services: Services,
}

impl<'a> Session<'a> {
    pub fn open(ctx: &'a Context) -> Result<Self> {
        let db = ctx.open_database()?;
        let services = Services::new(&db, &ctx.config.project);
        Ok(Self { ctx, services })
    }

    pub const fn output(&self) -> OutputMode {
        self.ctx.output
    }

    /// The acting user's id. A UUID is taken as-is; anything else is looked
    /// up as a registered email.
    pub fn actor(&self) -> Result<Uuid> {
        let raw = actor::require_actor(
            self.ctx.user_flag.as_deref(),
            self.ctx.config.user.user.as_deref(),
        )
        .map_err(|e| {
            CliError::with_details(
                e.message,
                "Pass --user <id|email> or set BACKLOG_USER",
                e.code,
            )
        })?;
        if let Ok(id) = Uuid::parse_str(&raw) {
            return Ok(id);
        }
        Ok(self.services.users.get_by_email(&raw)?.id)
    }

    /// Look a project up by id or key.
    pub fn project(&self, raw: &str) -> Result<Project> {
        let project = match Uuid::parse_str(raw) {
            Ok(id) => self.services.projects.get(id)?,
            Err(_) => self.services.projects.get_by_key(raw)?,
        };
        Ok(project)
    }

    pub fn user(&self, raw: &str) -> Result<User> {
        Ok(self.services.users.resolve(raw)?)
    }
}
