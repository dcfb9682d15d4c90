#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Credential-based single sign-on service.
//!
//! Users register with an email and password, log in against a tenant
//! ("app") and receive a token signed with that tenant's secret. The
//! [`auth::AuthService`] is transport-agnostic; [`gateway`] exposes it over
//! HTTP and [`storage`] backs it with SQLite or memory.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod storage;

pub use auth::{AuthService, PasswordHasher, RequestContext, TokenIssuer};
pub use config::Config;
pub use domain::{Tenant, TenantId, User, UserId};
pub use error::{AuthError, ErrorKind};
