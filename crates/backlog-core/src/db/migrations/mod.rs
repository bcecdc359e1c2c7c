//! Forward-only schema upgrades.
//!
//! The schema version lives in `PRAGMA user_version` and is mirrored into
//! `schema_meta` so it can be read with plain SQL. Each step commits on its
//! own, so a failure leaves the database at the last good version.

use super::schema;
use rusqlite::{Connection, types::Type};

/// One schema upgrade.
struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "tables",
        sql: schema::MIGRATION_V1_SQL,
    },
    Step {
        version: 2,
        name: "indexes and single active sprint",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Schema version a freshly migrated database ends up at.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Version recorded in `PRAGMA user_version`.
///
/// # Errors
///
/// Fails when the pragma cannot be read or holds a value outside `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))
}

fn apply(conn: &mut Connection, step: &Step) -> rusqlite::Result<()> {
    let version = i64::from(step.version);
    let tx = conn.transaction()?;
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.execute(
        "UPDATE schema_meta SET schema_version = ?1 WHERE id = 1",
        [version],
    )?;
    tx.commit()
}

/// Bring `conn` up to [`LATEST_SCHEMA_VERSION`] and return the version it
/// ends at. Steps at or below the stored version are skipped.
///
/// # Errors
///
/// Stops at the first step that fails; steps before it remain committed.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let from = current_schema_version(conn)?;
    let mut at = from;
    for step in STEPS.iter().filter(|s| s.version > from) {
        apply(conn, step)?;
        tracing::info!(version = step.version, step = step.name, "schema upgraded");
        at = step.version;
    }
    Ok(at)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, STEPS, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn sqlite_object_exists(
        conn: &Connection,
        object_type: &str,
        object_name: &str,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            )",
            params![object_type, object_name],
            |row| row.get(0),
        )
    }

    #[test]
    fn steps_ascend_and_end_at_latest() {
        assert!(STEPS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(STEPS.last().map(|s| s.version), Some(LATEST_SCHEMA_VERSION));
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        for table in [
            "users",
            "projects",
            "sprints",
            "items",
            "item_labels",
            "item_history",
            "sprint_history",
            "schema_meta",
        ] {
            assert!(sqlite_object_exists(&conn, "table", table)?, "missing table {table}");
        }

        for index in schema::REQUIRED_INDEXES {
            assert!(
                sqlite_object_exists(&conn, "index", index)?,
                "missing expected index {index}"
            );
        }

        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);

        let schema_version: i64 = conn.query_row(
            "SELECT schema_version FROM schema_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(schema_version, i64::from(LATEST_SCHEMA_VERSION));

        Ok(())
    }

    #[test]
    fn migrate_upgrades_from_v1() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        assert!(!sqlite_object_exists(&conn, "index", schema::ACTIVE_SPRINT_INDEX)?);

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert!(sqlite_object_exists(&conn, "index", schema::ACTIVE_SPRINT_INDEX)?);
        Ok(())
    }

    #[test]
    fn active_sprint_index_rejects_second_active_sprint() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn)?;

        conn.execute(
            "INSERT INTO projects (id, name, key, created_by, created_at_us, updated_at_us)
             VALUES ('p1', 'Core', 'CORE', 'u1', 0, 0)",
            [],
        )?;
        for id in ["s1", "s2"] {
            conn.execute(
                "INSERT INTO sprints (id, project_id, created_by, name, start_date_us,
                                      end_date_us, created_at_us, updated_at_us)
                 VALUES (?1, 'p1', 'u1', ?1, 0, 10, 0, 0)",
                [id],
            )?;
        }

        conn.execute("UPDATE sprints SET status = 'Active' WHERE id = 's1'", [])?;
        let err = conn
            .execute("UPDATE sprints SET status = 'Active' WHERE id = 's2'", [])
            .expect_err("second active sprint must be rejected");
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );

        conn.execute("UPDATE sprints SET status = 'Completed' WHERE id = 's1'", [])?;
        conn.execute("UPDATE sprints SET status = 'Active' WHERE id = 's2'", [])?;
        Ok(())
    }
}
