//! PBKDF2 key derivation for the sync master password.
//!
//! Uses PBKDF2-HMAC-SHA512 with:
//! - 100,000 iterations
//! - 32-byte (256-bit) random salt
//! - 32-byte (256-bit) output
//!
//! The same derivation backs both the envelope key and the persisted
//! verification hash; they never share a salt.

use crate::crypto::zero::zeroize_bytes;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;

/// PBKDF2 iteration count
pub const KDF_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes
pub const KEY_LEN: usize = 32;

/// Persisted verification hash of the master password (both fields base64)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Generate a fresh random salt
pub fn random_salt() -> [u8; SALT_LEN] {
    rand::random()
}

/// Derive a 256-bit key from a password and salt
///
/// # Security
/// - Runs the full iteration count on every call; callers own the result
///   and should zeroize it after use.
pub fn derive_key(password: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, KDF_ITERATIONS, &mut key);
    key
}

/// Hash a master password for persistence
///
/// Only this hash and its salt are ever written to disk, never the
/// password itself.
pub fn hash_password(password: &str) -> PasswordHash {
    let salt = random_salt();
    let mut key = derive_key(password.as_bytes(), &salt);
    let hash = STANDARD.encode(key);
    zeroize_bytes(&mut key);

    PasswordHash {
        hash,
        salt: STANDARD.encode(salt),
    }
}

/// Verify a password against a persisted hash and salt
///
/// Malformed stored values simply fail verification. The final comparison
/// is constant-time.
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let (expected, salt) = match (STANDARD.decode(hash), STANDARD.decode(salt)) {
        (Ok(expected), Ok(salt)) => (expected, salt),
        _ => return false,
    };

    let mut derived = derive_key(password.as_bytes(), &salt);
    let matches: bool = derived.as_slice().ct_eq(expected.as_slice()).into();
    zeroize_bytes(&mut derived);
    matches
}
