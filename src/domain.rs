//! Core records shared by the stores, the token issuer and the service.

/// Store-assigned user identifier.
pub type UserId = i64;

/// Tenant ("app") identifier.
pub type TenantId = i64;

/// A registered account.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique key, compared case-sensitively as stored.
    pub email: String,
    /// PHC-encoded adaptive hash. Never the plaintext password.
    pub password_hash: Vec<u8>,
    pub is_admin: bool,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// An application that requests tokens. Each tenant signs with its own secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_credentials() {
        let user = User {
            id: 7,
            email: "a@b.c".into(),
            password_hash: b"$pbkdf2-sha256$i=1$salt$hash".to_vec(),
            is_admin: false,
        };
        let tenant = Tenant {
            id: 1,
            name: "web".into(),
            secret: "top-secret".into(),
        };

        let rendered = format!("{user:?} {tenant:?}");
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("pbkdf2"));
        assert!(!rendered.contains("top-secret"));
    }
}
