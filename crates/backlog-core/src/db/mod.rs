//! SQLite persistence for the backlog store.
//!
//! Runtime defaults for every pooled connection:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout` (5s unless configured) to ride out writer contention
//! - `foreign_keys = ON` for project/sprint/item cascades
//!
//! Repository modules expose free functions over `&Connection`, so the same
//! function runs standalone or inside a service's write transaction.

pub mod history;
pub mod items;
pub mod migrations;
pub mod projects;
pub mod schema;
pub mod sprints;
pub mod users;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior, types::Type};
use serde_json::Value;
use std::{path::Path, time::Duration};
use uuid::Uuid;

use crate::clock;
use crate::config::DatabaseConfig;
use crate::error::BacklogError;

/// Pool of configured, migrated SQLite connections.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("state", &self.pool.state())
            .finish()
    }
}

impl Database {
    /// Open (or create) the database at `path`, configure pragmas on every
    /// pooled connection and migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or opening,
    /// configuring or migrating the database fails.
    pub fn open(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .build(manager)
            .with_context(|| format!("open database {}", path.display()))?;

        let mut conn = pool.get().context("acquire migration connection")?;
        let version = migrations::migrate(&mut conn).context("apply schema migrations")?;
        tracing::debug!(path = %path.display(), version, "database ready");

        Ok(Self { pool })
    }

    /// Check out a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`BacklogError::Pool`] when no connection becomes available.
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BacklogError> {
        Ok(self.pool.get()?)
    }

    /// Run a read-only closure on a pooled connection.
    ///
    /// # Errors
    ///
    /// Propagates pool errors and whatever the closure returns.
    pub fn read<T, F>(&self, f: F) -> Result<T, BacklogError>
    where
        F: FnOnce(&Connection) -> Result<T, BacklogError>,
    {
        let conn = self.conn()?;
        f(&conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. The write lock is
    /// taken up front, so check-then-set sequences inside `f` cannot
    /// interleave with another writer. Any error rolls the whole unit back.
    ///
    /// # Errors
    ///
    /// Propagates pool, transaction and closure errors.
    pub fn write<T, F>(&self, f: F) -> Result<T, BacklogError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, BacklogError>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

/// Read a TEXT column holding a UUID.
pub(crate) fn get_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_opt_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a `*_us` column as a UTC timestamp.
pub(crate) fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(clock::from_micros(row.get(idx)?))
}

/// Read a TEXT column through `FromStr`, surfacing parse failures as
/// conversion errors.
pub(crate) fn get_parsed<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a stored JSON payload. Malformed payloads degrade to `None` with a
/// warning instead of failing the read.
pub(crate) fn decode_json(raw: Option<String>, column: &'static str) -> Option<Value> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(column, %error, "dropping malformed history payload");
            None
        }
    }
}

pub(crate) fn encode_json(value: Option<&Value>) -> Option<String> {
    value.map(Value::to_string)
}

/// True when the error is a SQLite constraint violation of the given
/// extended code (e.g. `SQLITE_CONSTRAINT_UNIQUE`).
pub(crate) fn is_constraint(error: &rusqlite::Error, extended: std::ffi::c_int) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended
    )
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
