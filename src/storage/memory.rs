//! In-process store with the same semantics as the SQLite backend.

use super::{CredentialStore, StorageError, StorageResult, TenantStore};
use crate::domain::{Tenant, TenantId, User, UserId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Users {
    by_id: HashMap<UserId, User>,
    id_by_email: HashMap<String, UserId>,
    next_id: UserId,
}

/// Map-backed store. A single write lock covers the uniqueness check and the
/// insert, so concurrent saves of one email yield exactly one user.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Users>,
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tenant under an explicit id, replacing any previous entry.
    pub fn insert_tenant(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id, tenant);
    }

    pub fn set_admin(&self, user_id: UserId, is_admin: bool) -> StorageResult<()> {
        let mut users = self.users.write();
        let user = users.by_id.get_mut(&user_id).ok_or(StorageError::NotFound)?;
        user.is_admin = is_admin;
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.read().by_id.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn save_user(&self, email: &str, password_hash: &[u8]) -> StorageResult<UserId> {
        let mut users = self.users.write();
        if users.id_by_email.contains_key(email) {
            return Err(StorageError::AlreadyExists);
        }

        users.next_id += 1;
        let id = users.next_id;
        users.id_by_email.insert(email.to_owned(), id);
        users.by_id.insert(
            id,
            User {
                id,
                email: email.to_owned(),
                password_hash: password_hash.to_vec(),
                is_admin: false,
            },
        );
        Ok(id)
    }

    async fn user(&self, email: &str) -> StorageResult<User> {
        let users = self.users.read();
        users
            .id_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn is_admin(&self, user_id: UserId) -> StorageResult<bool> {
        self.users
            .read()
            .by_id
            .get(&user_id)
            .map(|u| u.is_admin)
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn tenant(&self, tenant_id: TenantId) -> StorageResult<Tenant> {
        self.tenants
            .read()
            .get(&tenant_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_assigned_sequentially_from_one() {
        let store = MemoryStore::new();
        assert_eq!(store.save_user("a@x.io", b"h").await.unwrap(), 1);
        assert_eq!(store.save_user("b@x.io", b"h").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_rejected_without_new_row() {
        let store = MemoryStore::new();
        store.save_user("a@x.io", b"h").await.unwrap();
        assert!(matches!(
            store.save_user("a@x.io", b"other").await,
            Err(StorageError::AlreadyExists)
        ));
        assert_eq!(store.user_count(), 1);
        assert_eq!(store.user("a@x.io").await.unwrap().password_hash, b"h");
    }

    #[tokio::test]
    async fn admin_flag_and_missing_records() {
        let store = MemoryStore::new();
        let id = store.save_user("a@x.io", b"h").await.unwrap();

        assert!(!store.is_admin(id).await.unwrap());
        store.set_admin(id, true).unwrap();
        assert!(store.is_admin(id).await.unwrap());

        assert!(matches!(store.is_admin(99).await, Err(StorageError::NotFound)));
        assert!(matches!(store.user("nobody@x.io").await, Err(StorageError::NotFound)));
        assert!(matches!(store.tenant(1).await, Err(StorageError::NotFound)));
    }
}
