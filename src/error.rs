//! Domain error taxonomy raised by [`crate::auth::AuthService`].
//!
//! Every storage, hashing and signing failure is classified into exactly one
//! [`ErrorKind`] before it leaves the service. The original cause is kept as
//! the error `source()` so it can be logged, but the transport only ever
//! sees the kind and its caller-safe message.

use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Email/password pair does not resolve to a matching account.
    InvalidCredentials,
    /// Requested tenant does not exist.
    InvalidAppId,
    /// Email is already registered.
    AlreadyExists,
    /// Storage outage, hashing failure, signing failure, or anything unrecognised.
    Internal,
    /// The caller cancelled the operation.
    Cancelled,
    /// The caller's deadline passed before the operation finished.
    DeadlineExceeded,
}

impl ErrorKind {
    /// Message that is safe to return to a caller.
    pub fn public_message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid credentials",
            Self::InvalidAppId => "invalid app id",
            Self::AlreadyExists => "user already exists",
            Self::Internal => "internal error",
            Self::Cancelled => "request cancelled",
            Self::DeadlineExceeded => "deadline exceeded",
        }
    }

    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidAppId => "invalid_app_id",
            Self::AlreadyExists => "already_exists",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.public_message())
    }
}

/// A classified failure plus the operation that raised it.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {kind}")]
pub struct AuthError {
    kind: ErrorKind,
    op: &'static str,
    #[source]
    source: Option<BoxError>,
}

impl AuthError {
    pub fn new(kind: ErrorKind, op: &'static str) -> Self {
        Self {
            kind,
            op,
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Name of the operation that raised the error, e.g. `auth.login`.
    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled | ErrorKind::DeadlineExceeded)
    }
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn display_hides_cause_but_source_keeps_it() {
        let err = AuthError::new(ErrorKind::Internal, "auth.login")
            .with_source(std::io::Error::other("disk on fire"));

        assert_eq!(err.to_string(), "auth.login: internal error");
        assert_eq!(err.kind(), ErrorKind::Internal);
        let cause = err.source().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::InvalidCredentials,
            ErrorKind::InvalidAppId,
            ErrorKind::AlreadyExists,
            ErrorKind::Internal,
            ErrorKind::Cancelled,
            ErrorKind::DeadlineExceeded,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn cancellation_kinds_are_flagged() {
        assert!(AuthError::new(ErrorKind::Cancelled, "op").is_cancellation());
        assert!(AuthError::new(ErrorKind::DeadlineExceeded, "op").is_cancellation());
        assert!(!AuthError::new(ErrorKind::AlreadyExists, "op").is_cancellation());
    }
}
