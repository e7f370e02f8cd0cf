//! Cryptographic primitives for config sync.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA512 key derivation and password hashing
//! - AES-256-GCM envelope encryption/decryption
//! - A zeroizing holder for the master password

pub mod cipher;
pub mod kdf;
pub mod zero;

pub use cipher::{decrypt, decrypt_object, encrypt, encrypt_object, EncryptedEnvelope};
pub use kdf::{derive_key, hash_password, verify_password, PasswordHash};
pub use zero::{zeroize_bytes, MasterPassword};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
///
/// Decryption deliberately collapses every cause (bad version, malformed
/// encoding, wrong password, tampered tag) into [`CryptoError::DecryptionFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
