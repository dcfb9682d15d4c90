//! Persistence capabilities used by the auth service.
//!
//! Provides:
//! - [`CredentialStore`]: user records and admin flags
//! - [`TenantStore`]: tenant ("app") records with their signing secrets
//! - [`SqliteStore`]: pooled SQLite backend implementing both
//! - [`MemoryStore`]: in-process backend with the same semantics
//!
//! Backends translate their native conditions into [`StorageError`]; no
//! driver error type crosses this boundary.

pub mod memory;
pub mod migrate;
pub mod sqlite;

use crate::domain::{Tenant, TenantId, User, UserId};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Failure reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StorageError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Backend(err.into())
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        Self::backend(err)
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::backend(err)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::AlreadyExists
            }
            other => Self::backend(other),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// User persistence. Pure data-layer calls; no business logic.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new user and return its assigned id.
    /// Fails with [`StorageError::AlreadyExists`] when the email is taken.
    async fn save_user(&self, email: &str, password_hash: &[u8]) -> StorageResult<UserId>;

    /// Fetch a user by exact email.
    async fn user(&self, email: &str) -> StorageResult<User>;

    /// Admin flag of the given user.
    async fn is_admin(&self, user_id: UserId) -> StorageResult<bool>;
}

/// Read-only access to tenants provisioned out of band.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn tenant(&self, tenant_id: TenantId) -> StorageResult<Tenant>;
}
