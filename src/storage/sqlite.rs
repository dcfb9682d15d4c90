//! SQLite-backed credential and tenant store.
//!
//! Tables (see [`super::migrate`]):
//! - `users`: id, email (unique), pass_hash, is_admin
//! - `apps`: id, name (unique), secret
//!
//! Connections come from an r2d2 pool and every query runs on the blocking
//! thread pool. Email uniqueness is enforced by the `UNIQUE` constraint, so
//! concurrent registrations of one address yield exactly one row.

use super::{migrate, CredentialStore, StorageError, StorageResult, TenantStore};
use crate::config::StorageConfig;
use crate::domain::{Tenant, TenantId, User, UserId};
use async_trait::async_trait;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

type Pool = r2d2::Pool<SqliteConnectionManager>;

/// SQLite's name for a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Pooled SQLite store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open(path: &Path, config: &StorageConfig) -> StorageResult<Self> {
        let store = Self::open_unmigrated(path, config)?;
        let report = store.migrate(&config.migrations_table)?;
        if report.is_up_to_date() {
            tracing::debug!(version = report.current_version, "migrations are up to date");
        }
        Ok(store)
    }

    /// Open the database without touching the schema.
    pub fn open_unmigrated(path: &Path, config: &StorageConfig) -> StorageResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(StorageError::backend)?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            // WAL mode for concurrent reads + crash safety
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
            )?;
            conn.busy_timeout(busy_timeout)
        });

        // Every `:memory:` connection is a separate database, so the pool
        // must hold exactly one and never recycle it.
        let pool = if path.as_os_str() == IN_MEMORY_PATH {
            r2d2::Pool::builder()
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .build(manager)?
        } else {
            r2d2::Pool::builder()
                .max_size(config.max_connections)
                .build(manager)?
        };

        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    pub fn migrate(&self, table: &str) -> StorageResult<migrate::MigrationReport> {
        let mut conn = self.pool.get()?;
        Ok(migrate::run(&mut *conn, table)?)
    }

    /// Provision a tenant. Tenants are administered out of band, so this is
    /// not part of [`TenantStore`].
    pub fn create_tenant(&self, name: &str, secret: &str) -> StorageResult<TenantId> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO apps (name, secret) VALUES (?1, ?2)",
            rusqlite::params![name, secret],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(app_id = id, name, "Tenant provisioned");
        Ok(id)
    }

    /// Grant or revoke the admin flag.
    pub fn set_admin(&self, user_id: UserId, is_admin: bool) -> StorageResult<()> {
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2",
            rusqlite::params![is_admin, user_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound);
        }
        tracing::info!(uid = user_id, is_admin, "Admin flag updated");
        Ok(())
    }

    /// Count registered users.
    pub fn user_count(&self) -> StorageResult<u64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&*conn)
        })
        .await?
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn save_user(&self, email: &str, password_hash: &[u8]) -> StorageResult<UserId> {
        let email = email.to_owned();
        let password_hash = password_hash.to_vec();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (email, pass_hash) VALUES (?1, ?2)",
                rusqlite::params![email, password_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn user(&self, email: &str) -> StorageResult<User> {
        let email = email.to_owned();
        self.with_conn(move |conn| {
            let user = conn.query_row(
                "SELECT id, email, pass_hash, is_admin FROM users WHERE email = ?1",
                rusqlite::params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        is_admin: row.get(3)?,
                    })
                },
            )?;
            Ok(user)
        })
        .await
    }

    async fn is_admin(&self, user_id: UserId) -> StorageResult<bool> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT is_admin FROM users WHERE id = ?1",
                rusqlite::params![user_id],
                |row| row.get::<_, bool>(0),
            )
            .optional()?
            .ok_or(StorageError::NotFound)
        })
        .await
    }
}

#[async_trait]
impl TenantStore for SqliteStore {
    async fn tenant(&self, tenant_id: TenantId) -> StorageResult<Tenant> {
        self.with_conn(move |conn| {
            let tenant = conn.query_row(
                "SELECT id, name, secret FROM apps WHERE id = ?1",
                rusqlite::params![tenant_id],
                |row| {
                    Ok(Tenant {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        secret: row.get(2)?,
                    })
                },
            )?;
            Ok(tenant)
        })
        .await
    }
}
