use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Directory under the project root holding the database and project config.
pub const BACKLOG_DIR: &str = ".backlog";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Relative paths resolve against the project root.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_activity_limit")]
    pub default_limit: i64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            default_limit: default_activity_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Default actor, as a user id or email.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
    pub db_path: PathBuf,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(BACKLOG_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    load_user_config_from(&config_dir.join("backlog/config.toml"))
}

pub fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Combine project config, user config and environment overrides.
///
/// `BACKLOG_DB` replaces the configured database path and `FORMAT` the
/// configured output mode; `--json` beats both.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format)?;
    let db_path = resolve_db_path(
        project_root,
        &project.database,
        env::var_os("BACKLOG_DB").map(PathBuf::from),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
        db_path,
    })
}

fn resolve_db_path(
    project_root: &Path,
    database: &DatabaseConfig,
    env_db: Option<PathBuf>,
) -> PathBuf {
    let path = env_db.unwrap_or_else(|| database.path.clone());
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> Result<String> {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return Ok("json".to_string());
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if std::io::stdout().is_terminal() {
        Ok("pretty".to_string())
    } else {
        Ok("text".to_string())
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(BACKLOG_DIR).join("backlog.db")
}

const fn default_pool_size() -> u32 {
    8
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_page_limit() -> u32 {
    10
}

const fn default_max_limit() -> u32 {
    100
}

const fn default_activity_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.database.path, PathBuf::from(".backlog/backlog.db"));
        assert_eq!(cfg.database.pool_size, 8);
        assert_eq!(cfg.database.busy_timeout_ms, 5_000);
        assert_eq!(cfg.pagination.default_limit, 10);
        assert_eq!(cfg.pagination.max_limit, 100);
        assert_eq!(cfg.activity.default_limit, 20);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(BACKLOG_DIR);
        std::fs::create_dir_all(&dir).expect("create .backlog");
        std::fs::write(
            dir.join("config.toml"),
            "[pagination]\nmax_limit = 50\n\n[database]\npool_size = 2\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg.pagination.max_limit, 50);
        assert_eq!(cfg.pagination.default_limit, 10);
        assert_eq!(cfg.database.pool_size, 2);
        assert_eq!(cfg.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn malformed_project_config_names_the_file() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(BACKLOG_DIR);
        std::fs::create_dir_all(&dir).expect("create .backlog");
        std::fs::write(dir.join("config.toml"), "[pagination\n").expect("write config");

        let err = load_project_config(root.path()).expect_err("parse must fail");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn user_config_parses_actor_and_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "user = \"ada@example.com\"\noutput = \"json\"\n")
            .expect("write config");

        let cfg = load_user_config_from(&path).expect("parse");
        assert_eq!(cfg.user.as_deref(), Some("ada@example.com"));
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty".to_string()), Some("text".to_string()))
            .expect("resolve should succeed");
        assert_eq!(output, "json");
    }

    #[test]
    fn env_format_beats_user_config() {
        let output = resolve_output(false, Some("pretty".to_string()), Some("table".to_string()))
            .expect("resolve should succeed");
        assert_eq!(output, "text");
    }

    #[test]
    fn db_path_env_override_and_relative_resolution() {
        let root = Path::new("/work/proj");
        let db = DatabaseConfig::default();
        assert_eq!(
            resolve_db_path(root, &db, None),
            PathBuf::from("/work/proj/.backlog/backlog.db")
        );
        assert_eq!(
            resolve_db_path(root, &db, Some(PathBuf::from("/tmp/other.db"))),
            PathBuf::from("/tmp/other.db")
        );
    }
}
