//! Login, registration and admin checks.
//!
//! [`AuthService`] is stateless between calls: it only holds shared handles to
//! the stores, the token issuer and the password hasher, so one instance can
//! serve any number of concurrent requests. Every storage error is mapped to
//! exactly one [`ErrorKind`] before it is returned.

use super::context::RequestContext;
use super::password::PasswordHasher;
use super::token::TokenIssuer;
use crate::domain::{TenantId, UserId};
use crate::error::{AuthError, ErrorKind, Result};
use crate::storage::{CredentialStore, StorageError, TenantStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Credential-based authentication service.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    tenants: Arc<dyn TenantStore>,
    issuer: TokenIssuer,
    hasher: PasswordHasher,
    token_ttl: Duration,
    span: tracing::Span,
}

impl AuthService {
    /// `span` is the parent for every operation span this service emits.
    pub fn new(
        users: Arc<dyn CredentialStore>,
        tenants: Arc<dyn TenantStore>,
        issuer: TokenIssuer,
        hasher: PasswordHasher,
        token_ttl: Duration,
        span: tracing::Span,
    ) -> Self {
        Self {
            users,
            tenants,
            issuer,
            hasher,
            token_ttl,
            span,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Verify `email`/`password` and issue a token scoped to `app_id`.
    ///
    /// Unknown email and wrong password both yield
    /// [`ErrorKind::InvalidCredentials`]; an unknown tenant yields
    /// [`ErrorKind::InvalidAppId`].
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        app_id: TenantId,
    ) -> Result<String> {
        let span = tracing::info_span!(
            parent: &self.span,
            "auth.login",
            request_id = %ctx.request_id(),
            app_id
        );
        self.login_inner(ctx, email, password, app_id)
            .instrument(span)
            .await
    }

    async fn login_inner(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
        app_id: TenantId,
    ) -> Result<String> {
        const OP: &str = "auth.login";
        tracing::info!(email, "logging in user");

        let user = match ctx
            .run(OP, self.users.user(email))
            .await
            .inspect_err(log_interrupted)?
        {
            Ok(user) => Some(user),
            Err(StorageError::NotFound) => None,
            Err(e) => {
                tracing::error!(error = %e, "failed to get user");
                return Err(AuthError::new(ErrorKind::Internal, OP).with_source(e));
            }
        };

        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password_ok = ctx
            .run(OP, self.verify_password(OP, password, stored_hash))
            .await
            .inspect_err(log_interrupted)??;

        let user = match user {
            Some(user) if password_ok => user,
            Some(_) => {
                tracing::warn!("invalid credentials: password mismatch");
                return Err(AuthError::new(ErrorKind::InvalidCredentials, OP));
            }
            None => {
                tracing::warn!("invalid credentials: user not found");
                return Err(AuthError::new(ErrorKind::InvalidCredentials, OP));
            }
        };

        let tenant = match ctx
            .run(OP, self.tenants.tenant(app_id))
            .await
            .inspect_err(log_interrupted)?
        {
            Ok(tenant) => tenant,
            Err(StorageError::NotFound) => {
                tracing::warn!("app not found");
                return Err(AuthError::new(ErrorKind::InvalidAppId, OP));
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to get app");
                return Err(AuthError::new(ErrorKind::Internal, OP).with_source(e));
            }
        };

        let token = self
            .issuer
            .issue(&user, &tenant, self.token_ttl)
            .map_err(|e| {
                tracing::error!(error = %e, "failed to generate token");
                AuthError::new(ErrorKind::Internal, OP).with_source(e)
            })?;

        // A cancelled login must not hand out a token.
        ctx.check(OP).inspect_err(log_interrupted)?;

        tracing::info!(uid = user.id, "user is logged in");
        Ok(token)
    }

    /// Hash `password` and persist a new account. Returns the assigned id.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<UserId> {
        let span = tracing::info_span!(
            parent: &self.span,
            "auth.register",
            request_id = %ctx.request_id()
        );
        self.register_inner(ctx, email, password)
            .instrument(span)
            .await
    }

    async fn register_inner(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<UserId> {
        const OP: &str = "auth.register";
        tracing::info!(email, "registering new user");

        let password_hash = ctx
            .run(OP, self.hash_password(OP, password))
            .await
            .inspect_err(log_interrupted)??;

        // Once the insert starts, the store's committed-or-not state is authoritative.
        let uid = match ctx
            .run(OP, self.users.save_user(email, &password_hash))
            .await
            .inspect_err(log_interrupted)?
        {
            Ok(uid) => uid,
            Err(StorageError::AlreadyExists) => {
                tracing::warn!("user already exists");
                return Err(AuthError::new(ErrorKind::AlreadyExists, OP));
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save user");
                return Err(AuthError::new(ErrorKind::Internal, OP).with_source(e));
            }
        };

        tracing::info!(uid, "user is registered");
        Ok(uid)
    }

    /// Whether `user_id` carries the admin flag.
    pub async fn is_admin(&self, ctx: &RequestContext, user_id: UserId) -> Result<bool> {
        let span = tracing::info_span!(
            parent: &self.span,
            "auth.is_admin",
            request_id = %ctx.request_id(),
            uid = user_id
        );
        self.is_admin_inner(ctx, user_id).instrument(span).await
    }

    async fn is_admin_inner(&self, ctx: &RequestContext, user_id: UserId) -> Result<bool> {
        const OP: &str = "auth.is_admin";
        tracing::info!("checking if user is admin");

        match ctx
            .run(OP, self.users.is_admin(user_id))
            .await
            .inspect_err(log_interrupted)?
        {
            Ok(is_admin) => Ok(is_admin),
            // Unknown ids surface as a credential failure, matching the
            // existing API surface.
            Err(StorageError::NotFound) => {
                tracing::warn!("user not found");
                Err(AuthError::new(ErrorKind::InvalidCredentials, OP))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to get user");
                Err(AuthError::new(ErrorKind::Internal, OP).with_source(e))
            }
        }
    }

    /// Hash on the blocking pool; PBKDF2 is CPU-bound.
    async fn hash_password(&self, op: &'static str, password: &str) -> Result<Vec<u8>> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing task failed");
                AuthError::new(ErrorKind::Internal, op).with_source(e)
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "failed to generate password hash");
                AuthError::new(ErrorKind::Internal, op).with_source(e)
            })
    }

    /// Compare on the blocking pool. Without a stored hash a dummy
    /// verification runs instead, so unknown accounts cost the same.
    async fn verify_password(
        &self,
        op: &'static str,
        password: &str,
        stored: Option<Vec<u8>>,
    ) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || match stored {
            Some(stored) => hasher.verify(&password, &stored),
            None => {
                hasher.verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verification task failed");
            AuthError::new(ErrorKind::Internal, op).with_source(e)
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to verify password");
            AuthError::new(ErrorKind::Internal, op).with_source(e)
        })
    }
}

/// Record a call that stopped because of cancellation or its deadline.
fn log_interrupted(err: &AuthError) {
    if err.is_cancellation() {
        tracing::warn!(op = err.op(), code = err.kind().code(), "request interrupted");
    }
}
