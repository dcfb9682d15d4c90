//! Adaptive password hashing.
//!
//! PBKDF2-HMAC-SHA256 with a per-hash random salt, encoded as a PHC string
//! (`$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`). The round count and salt
//! travel inside the stored value, so raising the configured work factor
//! never invalidates existing hashes.

use pbkdf2::password_hash::{
    Error as PhcError, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use pbkdf2::{Params, Pbkdf2};
use std::sync::Arc;

/// Salt byte length.
const SALT_BYTES: usize = 16;

/// Derived key length.
const OUTPUT_BYTES: usize = 32;

/// Lowest accepted PBKDF2 iteration count.
pub const MIN_ROUNDS: u32 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("work factor {0} is below the minimum of {min} rounds", min = MIN_ROUNDS)]
    WeakWorkFactor(u32),
}

/// Hashes and verifies passwords with a fixed work factor.
///
/// Cheap to clone; hashing itself is CPU-bound and should run on a blocking
/// thread.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random throwaway password, verified against when the account
    /// does not exist so both failure paths cost the same.
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("rounds", &self.params.rounds)
            .finish_non_exhaustive()
    }
}

impl PasswordHasher {
    pub fn new(rounds: u32) -> Result<Self, PasswordError> {
        if rounds < MIN_ROUNDS {
            return Err(PasswordError::WeakWorkFactor(rounds));
        }
        let params = Params {
            rounds,
            output_length: OUTPUT_BYTES,
        };
        let throwaway: [u8; SALT_BYTES] = rand::random();
        let dummy_hash = encode(&params, &throwaway)?;
        Ok(Self {
            params,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn rounds(&self) -> u32 {
        self.params.rounds
    }

    /// Hash `password` with a fresh salt. Returns the PHC string bytes.
    pub fn hash(&self, password: &str) -> Result<Vec<u8>, PasswordError> {
        encode(&self.params, password.as_bytes()).map(String::into_bytes)
    }

    /// Constant-time check of `password` against a stored hash.
    ///
    /// `Ok(false)` on mismatch; an error only when the stored value cannot be
    /// parsed or the primitive fails.
    pub fn verify(&self, password: &str, stored: &[u8]) -> Result<bool, PasswordError> {
        let encoded = std::str::from_utf8(stored).map_err(|_| PasswordError::MalformedHash)?;
        let parsed = PasswordHash::new(encoded).map_err(|_| PasswordError::MalformedHash)?;

        match Pbkdf2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(PhcError::Password) => Ok(false),
            Err(e) => Err(PasswordError::Hash(e.to_string())),
        }
    }

    /// Spend one verification's worth of work and discard the result.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, self.dummy_hash.as_bytes());
    }
}

fn encode(params: &Params, password: &[u8]) -> Result<String, PasswordError> {
    let salt_bytes: [u8; SALT_BYTES] = rand::random();
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let hash = Pbkdf2
        .hash_password_customized(password, None, None, *params, salt.as_salt())
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hasher = hasher();
        let stored = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &stored).unwrap());
        assert!(!hasher.verify("correct horse ", &stored).unwrap());
        assert!(!hasher.verify("Correct horse", &stored).unwrap());
        assert!(!hasher.verify("", &stored).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let hasher = hasher();
        let a = hasher.hash("hunter2").unwrap();
        let b = hasher.hash("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("hunter2", &a).unwrap());
        assert!(hasher.verify("hunter2", &b).unwrap());
    }

    #[test]
    fn stored_value_is_phc_and_never_plaintext() {
        let hasher = hasher();
        let stored = String::from_utf8(hasher.hash("plain-secret").unwrap()).unwrap();
        assert!(stored.starts_with("$pbkdf2-sha256$"));
        assert!(stored.contains("i=1000"));
        assert!(!stored.contains("plain-secret"));
    }

    #[test]
    fn hashes_survive_work_factor_changes() {
        let old = PasswordHasher::new(1_000).unwrap();
        let stored = old.hash("pw").unwrap();

        let new = PasswordHasher::new(2_000).unwrap();
        assert!(new.verify("pw", &stored).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify("pw", b"not a phc string"),
            Err(PasswordError::MalformedHash)
        ));
        assert!(matches!(
            hasher.verify("pw", &[0xff, 0xfe]),
            Err(PasswordError::MalformedHash)
        ));
    }

    #[test]
    fn work_factor_below_minimum_is_rejected() {
        assert!(matches!(
            PasswordHasher::new(1),
            Err(PasswordError::WeakWorkFactor(1))
        ));
        assert!(PasswordHasher::new(MIN_ROUNDS - 1).is_err());
        assert_eq!(PasswordHasher::new(MIN_ROUNDS).unwrap().rounds(), MIN_ROUNDS);
    }

    #[test]
    fn dummy_verification_does_not_panic() {
        hasher().verify_dummy("anything");
    }
}
