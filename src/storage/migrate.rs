//! Embedded schema migrations.
//!
//! Migrations are numbered and applied in order inside one transaction.
//! Applied versions are recorded in a bookkeeping table whose name is
//! configurable, so re-running is a no-op.

use rusqlite::Connection;

/// Default name of the bookkeeping table.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                pass_hash BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS apps (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                secret TEXT NOT NULL
            );",
    },
    Migration {
        version: 2,
        name: "users_admin_flag",
        sql: "ALTER TABLE users ADD COLUMN is_admin INTEGER NOT NULL DEFAULT 0;",
    },
];

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<i64>,
    pub current_version: i64,
}

impl MigrationReport {
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Apply every pending migration.
pub fn run(conn: &mut Connection, table: &str) -> rusqlite::Result<MigrationReport> {
    let table = sanitize_table_name(table)?;
    let tx = conn.transaction()?;

    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        );"
    ))?;

    let current: i64 = tx.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM \"{table}\""),
        [],
        |row| row.get(0),
    )?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute(
            &format!("INSERT INTO \"{table}\" (version, name, applied_at) VALUES (?1, ?2, ?3)"),
            rusqlite::params![
                migration.version,
                migration.name,
                chrono::Utc::now().timestamp()
            ],
        )?;
        tracing::info!(version = migration.version, name = migration.name, "Applied migration");
        applied.push(migration.version);
    }

    tx.commit()?;

    let current_version = applied.last().copied().unwrap_or(current);
    Ok(MigrationReport {
        applied,
        current_version,
    })
}

/// Table names are interpolated into SQL, so only identifier characters pass.
fn sanitize_table_name(table: &str) -> rusqlite::Result<&str> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table)
    } else {
        Err(rusqlite::Error::InvalidParameterName(table.to_string()))
    }
}
