#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmd::{Context, Session};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "bl: sprint and backlog tracker with an auditable history",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format; overrides --json, FORMAT and the user config.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Acting user as id or email (skips env and config resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Database file; overrides BACKLOG_DB and the project config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Output mode from flags alone, used when config resolution itself fails.
    fn flag_output_mode(&self) -> OutputMode {
        self.format.unwrap_or(if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a backlog in the current directory",
        after_help = "EXAMPLES:\n    # Create .backlog/ with a default config and database\n    bl init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Register users and show their activity",
        after_help = "EXAMPLES:\n    bl user register --google-id g-1 --email ada@example.com --name Ada\n    bl user activity ada@example.com --limit 10"
    )]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },

    #[command(
        about = "Manage projects",
        after_help = "EXAMPLES:\n    bl project create --name Core --key core\n    bl project list --all"
    )]
    Project {
        #[command(subcommand)]
        command: cmd::project::ProjectCommand,
    },

    #[command(
        about = "Manage backlog items",
        after_help = "EXAMPLES:\n    bl item create --project CORE --title \"Login page\" --type Story --points 3\n    bl item status <ID> \"In Progress\"\n    bl item list --project CORE --sprint none"
    )]
    Item {
        #[command(subcommand)]
        command: cmd::item::ItemCommand,
    },

    #[command(
        about = "Plan and run sprints",
        after_help = "EXAMPLES:\n    bl sprint create --project CORE --name \"Sprint 1\" --start 2026-03-02 --end 2026-03-16\n    bl sprint start <ID>\n    bl sprint report <ID>"
    )]
    Sprint {
        #[command(subcommand)]
        command: cmd::sprint::SprintCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BACKLOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "backlog=debug,bl=debug,info"
        } else {
            "backlog=info,bl=info,warn"
        })
    });

    let format = env::var("BACKLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn dispatch(command: &Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => cmd::init::run_init(args, ctx),
        Commands::User { command } => cmd::user::run(command, &Session::open(ctx)?),
        Commands::Project { command } => cmd::project::run(command, &Session::open(ctx)?),
        Commands::Item { command } => cmd::item::run(command, &Session::open(ctx)?),
        Commands::Sprint { command } => cmd::sprint::run(command, &Session::open(ctx)?),
    }
}

fn fail(output: OutputMode, err: &anyhow::Error) -> ExitCode {
    tracing::debug!(error = %format!("{err:#}"), "command failed");
    let error = CliError::from_anyhow(err);
    if render_error(output, &error).is_err() {
        eprintln!("error: {}", error.message);
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => return fail(cli.flag_output_mode(), &anyhow::Error::from(e)),
    };

    let ctx = match Context::load(
        &project_root,
        cli.json,
        cli.format,
        cli.user.clone(),
        cli.db.as_deref(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => return fail(cli.flag_output_mode(), &e),
    };

    match dispatch(&cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(ctx.output, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::item::ItemCommand;
    use crate::cmd::sprint::SprintCommand;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["bl", "--json", "project", "list"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["bl", "project", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn format_flag_wins_for_early_errors() {
        let cli = Cli::parse_from(["bl", "--json", "--format", "text", "project", "list"]);
        assert_eq!(cli.flag_output_mode(), OutputMode::Text);
        let cli = Cli::parse_from(["bl", "--json", "project", "list"]);
        assert_eq!(cli.flag_output_mode(), OutputMode::Json);
    }

    #[test]
    fn user_and_db_flags_are_global() {
        let cli = Cli::parse_from([
            "bl",
            "item",
            "list",
            "--user",
            "ada@example.com",
            "--db",
            "/tmp/x.db",
        ]);
        assert_eq!(cli.user.as_deref(), Some("ada@example.com"));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn item_update_parses_label_list_and_sprint_sentinel() {
        let id = uuid::Uuid::new_v4().to_string();
        let cli = Cli::parse_from([
            "bl", "item", "update", id.as_str(), "--labels", "ui,auth", "--sprint", "none",
        ]);
        let Commands::Item {
            command: ItemCommand::Update(args),
        } = cli.command
        else {
            panic!("expected item update");
        };
        assert_eq!(args.labels, Some(vec!["ui".to_string(), "auth".to_string()]));
        assert_eq!(args.sprint.as_deref(), Some("none"));
    }

    #[test]
    fn item_update_rejects_labels_with_clear() {
        let id = uuid::Uuid::new_v4().to_string();
        let res = Cli::try_parse_from([
            "bl",
            "item",
            "update",
            id.as_str(),
            "--labels",
            "ui",
            "--clear-labels",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn sprint_dates_are_parsed_by_clap() {
        let cli = Cli::parse_from([
            "bl",
            "sprint",
            "create",
            "--project",
            "CORE",
            "--name",
            "S1",
            "--start",
            "2026-03-02",
            "--end",
            "2026-03-16",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Sprint {
                command: SprintCommand::Create(_)
            }
        ));

        let bad = Cli::try_parse_from([
            "bl", "sprint", "create", "--project", "CORE", "--name", "S1", "--start", "soon",
            "--end", "2026-03-16",
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(Cli::try_parse_from(["bl", "sprint", "start", "not-a-uuid"]).is_err());
    }

    #[test]
    fn tag_requires_labels() {
        let id = uuid::Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["bl", "item", "tag", id.as_str()]).is_err());
    }
}
