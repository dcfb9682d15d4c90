//! Tenant-scoped session tokens.
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256 under the issuing
//! tenant's secret: `base64url(header).base64url(claims).base64url(mac)`.
//! Any party that holds the tenant secret can verify them with [`verify`].

use crate::domain::{Tenant, TenantId, User, UserId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Only supported signing algorithm.
pub const ALGORITHM: &str = "HS256";

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claim set embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: UserId,
    pub app_id: TenantId,
    pub email: String,
    /// Absolute expiry, unix seconds.
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("token lifetime out of range")]
    InvalidTtl,
    #[error("invalid signing key")]
    InvalidKey,
    #[error("token is malformed")]
    Malformed,
    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
}

/// Builds and signs tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenIssuer {
    clock: fn() -> DateTime<Utc>,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issuer whose notion of "now" comes from `clock`.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }

    /// Sign a token for `user` scoped to `tenant`, expiring `ttl` from now.
    pub fn issue(&self, user: &User, tenant: &Tenant, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(user, tenant, ttl, (self.clock)())
    }

    /// Same as [`Self::issue`] with an explicit issue time. Identical inputs
    /// produce identical tokens.
    pub fn issue_at(
        &self,
        user: &User,
        tenant: &Tenant,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        let exp = issued_at
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidTtl)?
            .timestamp();

        let claims = Claims {
            uid: user.id,
            app_id: tenant.id,
            email: user.email.clone(),
            exp,
        };
        sign(&claims, tenant.secret.as_bytes())
    }
}

/// Serialize and sign a claim set.
pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims)?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER_JSON),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Check a token's signature against `secret` and its expiry against `now`.
pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: Header = decode_segment(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let claims: Claims = decode_segment(payload_b64)?;
    if claims.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> User {
        User {
            id: 42,
            email: "alice@example.com".into(),
            password_hash: Vec::new(),
            is_admin: false,
        }
    }

    fn tenant(id: TenantId, secret: &str) -> Tenant {
        Tenant {
            id,
            name: format!("app-{id}"),
            secret: secret.into(),
        }
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn claims_decode_with_issuing_secret() {
        let token = TokenIssuer::new()
            .issue_at(&user(), &tenant(7, "s3cret"), Duration::from_secs(3600), issued_at())
            .unwrap();

        let claims = verify(&token, b"s3cret", issued_at()).unwrap();
        assert_eq!(
            claims,
            Claims {
                uid: 42,
                app_id: 7,
                email: "alice@example.com".into(),
                exp: issued_at().timestamp() + 3600,
            }
        );
    }

    #[test]
    fn other_tenant_secret_fails() {
        let token = TokenIssuer::new()
            .issue_at(&user(), &tenant(7, "s3cret"), Duration::from_secs(60), issued_at())
            .unwrap();

        assert!(matches!(
            verify(&token, b"other-secret", issued_at()),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn issuance_is_deterministic_for_fixed_time() {
        let issuer = TokenIssuer::new();
        let t = tenant(1, "k");
        let a = issuer.issue_at(&user(), &t, Duration::from_secs(60), issued_at()).unwrap();
        let b = issuer.issue_at(&user(), &t, Duration::from_secs(60), issued_at()).unwrap();
        let c = issuer.issue_at(&user(), &t, Duration::from_secs(61), issued_at()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn header_and_claim_layout() {
        let token = TokenIssuer::new()
            .issue_at(&user(), &tenant(3, "k"), Duration::from_secs(10), issued_at())
            .unwrap();
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);

        let header = URL_SAFE_NO_PAD.decode(segments[0]).unwrap();
        assert_eq!(header, HEADER_JSON.as_bytes());

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();
        assert_eq!(payload["uid"], 42);
        assert_eq!(payload["app_id"], 3);
        assert_eq!(payload["email"], "alice@example.com");
        assert_eq!(payload["exp"], issued_at().timestamp() + 10);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = TokenIssuer::new()
            .issue_at(&user(), &tenant(1, "k"), Duration::from_secs(60), issued_at())
            .unwrap();
        let later = issued_at() + chrono::Duration::seconds(60);
        assert!(matches!(verify(&token, b"k", later), Err(TokenError::Expired)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = TokenIssuer::new()
            .issue_at(&user(), &tenant(1, "k"), Duration::from_secs(60), issued_at())
            .unwrap();
        let mut segments: Vec<String> = token.split('.').map(str::to_owned).collect();
        let forged = Claims {
            uid: 1,
            app_id: 1,
            email: "root@example.com".into(),
            exp: i64::MAX,
        };
        segments[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = segments.join(".");

        assert!(matches!(
            verify(&forged_token, b"k", issued_at()),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(verify(bad, b"k", issued_at()), Err(TokenError::Malformed)),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn foreign_algorithm_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"uid":1,"app_id":1,"email":"x","exp":1}"#);
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            verify(&token, b"k", issued_at()),
            Err(TokenError::UnsupportedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn clock_drives_expiry() {
        let issuer = TokenIssuer::with_clock(issued_at);
        let token = issuer
            .issue(&user(), &tenant(1, "k"), Duration::from_secs(30))
            .unwrap();
        let claims = verify(&token, b"k", issued_at()).unwrap();
        assert_eq!(claims.exp, issued_at().timestamp() + 30);
    }

    #[test]
    fn out_of_range_ttl_is_an_error() {
        let err = TokenIssuer::new()
            .issue_at(&user(), &tenant(1, "k"), Duration::MAX, issued_at())
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidTtl));
    }
}
