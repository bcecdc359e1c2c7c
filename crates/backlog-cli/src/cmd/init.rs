use anyhow::{Context as _, Result};
use backlog_core::config::BACKLOG_DIR;
use clap::Args;
use serde::Serialize;

use super::Context;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.backlog/config.toml` with the default template.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[database]\n\
    path = \".backlog/backlog.db\"\n\
    pool_size = 8\n\
    busy_timeout_ms = 5000\n\
    \n\
    [pagination]\n\
    default_limit = 10\n\
    max_limit = 100\n\
    \n\
    [activity]\n\
    default_limit = 20\n";

const GITIGNORE: &str = "backlog.db\nbacklog.db-wal\nbacklog.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    directory: String,
    config: String,
    database: String,
    config_written: bool,
}

/// Execute `bl init`. Creates the project skeleton and migrates the database:
///
/// ```text
/// .backlog/
///   config.toml   (default project config template)
///   .gitignore    (database files)
///   backlog.db    (unless the database path points elsewhere)
/// ```
///
/// Re-running is safe: the schema migrator is idempotent and an existing
/// config is kept unless `--force` is set.
///
/// # Errors
///
/// Returns an error if any filesystem operation or the migration fails.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let dir = ctx.project_root.join(BACKLOG_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    let config_written = args.force || !config_path.exists();
    if config_written {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        std::fs::write(&gitignore, GITIGNORE)
            .with_context(|| format!("Failed to write {}", gitignore.display()))?;
    }

    ctx.open_database()?;
    tracing::info!(path = %ctx.config.db_path.display(), "backlog initialized");

    let report = InitReport {
        directory: dir.display().to_string(),
        config: config_path.display().to_string(),
        database: ctx.config.db_path.display().to_string(),
        config_written,
    };
    render_mode(
        ctx.output,
        &report,
        |r, w| writeln!(w, "{}\t{}", r.directory, r.database),
        |r, w| {
            writeln!(w, "Initialized backlog in {}", r.directory)?;
            pretty_kv(w, "config", &r.config)?;
            pretty_kv(w, "database", &r.database)?;
            if !r.config_written {
                writeln!(w, "(kept existing config; use --force to reset it)")?;
            }
            Ok(())
        },
    )
}
