//! Credential hashing.
//!
//! API keys are stored as `PBKDF2-HMAC-SHA256(raw key, salt)`, hex encoded,
//! with a fresh 128-bit salt per key. Verification recomputes the digest
//! with the stored salt and compares in constant time.
//!
//! Neither raw keys nor digests are ever logged from here.

use hmac::Hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Lowest PBKDF2 round count accepted from configuration.
pub const MIN_HASH_ITERATIONS: u32 = 200_000;

const SALT_BYTES: usize = 16;
const SECRET_BYTES: usize = 32;
const DIGEST_BYTES: usize = 32;

/// Salted, iterated one-way transform for API keys.
///
/// The iteration count is fixed per process and is not stored per row, so
/// it must not change between restarts of a deployment. `Config` enforces
/// the `MIN_HASH_ITERATIONS` floor; the constructor itself accepts any
/// count so tests can run with cheap hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialHasher {
    iterations: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(MIN_HASH_ITERATIONS)
    }
}

impl CredentialHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Fresh random salt, hex encoded.
    pub fn new_salt() -> String {
        random_hex(SALT_BYTES)
    }

    /// High-entropy raw API key (256 random bits, hex encoded).
    pub fn generate_secret() -> String {
        random_hex(SECRET_BYTES)
    }

    /// Hex digest of `secret` under `salt_hex`.
    pub fn hash(&self, secret: &str, salt_hex: &str) -> Result<String, AppError> {
        let salt = hex::decode(salt_hex)
            .map_err(|_| AppError::Internal("stored salt is not valid hex".to_string()))?;
        Ok(hex::encode(self.derive(secret, &salt)?))
    }

    /// Whether `secret` hashes to `digest_hex` under `salt_hex`.
    ///
    /// Malformed stored values never verify.
    pub fn verify(&self, secret: &str, salt_hex: &str, digest_hex: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
            return false;
        };
        if salt.is_empty() {
            return false;
        }
        match self.derive(secret, &salt) {
            Ok(actual) => bool::from(actual.as_slice().ct_eq(expected.as_slice())),
            Err(_) => false,
        }
    }

    fn derive(&self, secret: &str, salt: &[u8]) -> Result<[u8; DIGEST_BYTES], AppError> {
        let mut out = [0u8; DIGEST_BYTES];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(secret.as_bytes(), salt, self.iterations, &mut out)
            .map_err(|e| AppError::Internal(format!("key derivation failed: {e}")))?;
        Ok(out)
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(1_000)
    }

    #[test]
    fn secrets_and_salts_have_expected_entropy() {
        let secret = CredentialHasher::generate_secret();
        let salt = CredentialHasher::new_salt();
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert_eq!(salt.len(), SALT_BYTES * 2);
        assert_ne!(CredentialHasher::new_salt(), salt);
        assert_ne!(CredentialHasher::generate_secret(), secret);
    }

    #[test]
    fn hash_is_deterministic_per_salt() {
        let h = hasher();
        let salt = CredentialHasher::new_salt();
        let a = h.hash("secret", &salt).unwrap();
        let b = h.hash("secret", &salt).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DIGEST_BYTES * 2);

        let other = h.hash("secret", &CredentialHasher::new_salt()).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn verify_round_trip() {
        let h = hasher();
        let secret = CredentialHasher::generate_secret();
        let salt = CredentialHasher::new_salt();
        let digest = h.hash(&secret, &salt).unwrap();

        assert!(h.verify(&secret, &salt, &digest));

        let mut mutated = secret.clone().into_bytes();
        mutated[10] = if mutated[10] == b'a' { b'b' } else { b'a' };
        let mutated = String::from_utf8(mutated).unwrap();
        assert!(!h.verify(&mutated, &salt, &digest));
    }

    #[test]
    fn iteration_count_changes_digest() {
        let salt = CredentialHasher::new_salt();
        let a = CredentialHasher::new(1_000).hash("k", &salt).unwrap();
        let b = CredentialHasher::new(1_001).hash("k", &salt).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_stored_values_never_verify() {
        let h = hasher();
        assert!(!h.verify("k", "", "00"));
        assert!(!h.verify("k", "zz", "00"));
        assert!(!h.verify("k", &CredentialHasher::new_salt(), "not-hex"));
        assert!(h.hash("k", "zz").is_err());
    }

    #[test]
    fn matches_reference_vector() {
        // RFC 7914 section 11: PBKDF2-HMAC-SHA256("passwd", "salt", 1, 64)
        let h = CredentialHasher::new(1);
        let digest = h.hash("passwd", &hex::encode("salt")).unwrap();
        assert_eq!(
            digest,
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }
}
