//! Actor identity resolution for CLI commands.
//!
//! The resolution chain: `--user` flag > `BACKLOG_USER` env > `user` key in
//! the user config file. The resolved value is a user id or an email.
//! Mutating commands require an actor; read-only commands work without one.

use std::env;

/// Errors from actor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorResolutionError {
    /// Human-readable description.
    pub message: String,
    /// Machine error code.
    pub code: &'static str,
}

impl std::fmt::Display for ActorResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActorResolutionError {}

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

fn resolve_actor_with(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = cli_flag.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }

    if let Some(val) = env.get("BACKLOG_USER") {
        return Some(val);
    }

    config_user
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Resolve the actor following the chain:
///
/// 1. `--user` CLI flag (passed as `cli_flag`)
/// 2. `BACKLOG_USER` environment variable
/// 3. `user` from `~/.config/backlog/config.toml` (passed as `config_user`)
///
/// Returns `None` if no identity could be resolved.
pub fn resolve_actor(cli_flag: Option<&str>, config_user: Option<&str>) -> Option<String> {
    resolve_actor_with(cli_flag, config_user, &RealEnv)
}

/// Resolve the actor, returning an error if not found.
///
/// Use this for mutating commands that require an actor.
pub fn require_actor(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
) -> Result<String, ActorResolutionError> {
    resolve_actor(cli_flag, config_user).ok_or_else(|| ActorResolutionError {
        message: "User identity required for this command. \
                  Set --user, BACKLOG_USER, or `user` in the user config."
            .to_string(),
        code: "missing_user",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Test environment reader with configurable values.
    struct MockEnv {
        vars: HashMap<String, String>,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("BACKLOG_USER", "env@example.com");
        let result = resolve_actor_with(Some("flag@example.com"), Some("cfg@example.com"), &env);
        assert_eq!(result.as_deref(), Some("flag@example.com"));
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("BACKLOG_USER", "env@example.com");
        let result = resolve_actor_with(None, Some("cfg@example.com"), &env);
        assert_eq!(result.as_deref(), Some("env@example.com"));
    }

    #[test]
    fn config_is_last_resort() {
        let result = resolve_actor_with(None, Some("cfg@example.com"), &MockEnv::new());
        assert_eq!(result.as_deref(), Some("cfg@example.com"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let env = MockEnv::new().var("BACKLOG_USER", "");
        assert_eq!(resolve_actor_with(Some("  "), Some(""), &env), None);

        let result = resolve_actor_with(Some(""), Some("cfg@example.com"), &env);
        assert_eq!(result.as_deref(), Some("cfg@example.com"));
    }

    #[test]
    fn missing_actor_error_has_machine_code() {
        let err = ActorResolutionError {
            message: "no user".to_string(),
            code: "missing_user",
        };
        assert_eq!(err.code, "missing_user");
        assert_eq!(format!("{err}"), "no user");
    }
}
