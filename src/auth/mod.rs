//! Credential authentication core.
//!
//! Provides:
//! - [`AuthService`]: login, registration and admin checks over pluggable stores
//! - [`PasswordHasher`]: PBKDF2-HMAC-SHA256 with per-user salt, PHC encoded
//! - [`TokenIssuer`]: HS256 tokens signed with the requesting tenant's secret
//! - [`RequestContext`]: cancellation, deadline and correlation id per call
//!
//! ## Design Decisions
//! - Unknown email and wrong password are the same error so callers cannot
//!   probe for accounts; an unknown tenant is reported separately because
//!   tenant ids are not secret.
//! - Hashing runs on the blocking pool and never behind a shared lock.

pub mod context;
pub mod password;
pub mod service;
pub mod token;

pub use context::RequestContext;
pub use password::{PasswordError, PasswordHasher};
pub use service::AuthService;
pub use token::{Claims, TokenError, TokenIssuer};
