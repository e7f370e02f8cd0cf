//! AES-256-GCM envelope encryption for the remote sync blob.
//!
//! Uses AES-256-GCM with:
//! - 256-bit key derived per call with PBKDF2-HMAC-SHA512
//! - 96-bit (12 byte) random IV
//! - 128-bit authentication tag
//! - Fresh random salt and IV on every encryption
//!
//! Binary fields of the envelope are base64 encoded so the whole envelope
//! can travel as JSON.

use crate::crypto::kdf::{derive_key, random_salt, SALT_LEN};
use crate::crypto::zero::zeroize_bytes;
use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

/// Current envelope format version
pub const ENVELOPE_VERSION: u32 = 1;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// An encrypted payload as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Envelope format version; unknown versions are refused
    pub version: u32,

    /// Base64 IV (12 bytes)
    pub iv: String,

    /// Base64 PBKDF2 salt (32 bytes)
    pub salt: String,

    /// Base64 authentication tag (16 bytes)
    pub auth_tag: String,

    /// Base64 ciphertext without the tag
    pub ciphertext: String,
}

/// Encrypt bytes under a password
///
/// # Security Notes
/// - A new salt and a new IV are drawn for every call, so two envelopes
///   of the same plaintext never compare equal
/// - The derived key is zeroized before returning
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedEnvelope> {
    let salt = random_salt();
    let mut key = derive_key(password.as_bytes(), &salt);

    let cipher = Aes256Gcm::new((&key).into());
    zeroize_bytes(&mut key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("{}", e)))?;

    // AES-GCM appends the auth tag to the ciphertext
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::EncryptionFailed(
            "Ciphertext too short - missing auth tag".to_string(),
        ));
    }
    let tag_start = ciphertext.len() - TAG_LEN;

    Ok(EncryptedEnvelope {
        version: ENVELOPE_VERSION,
        iv: STANDARD.encode(nonce),
        salt: STANDARD.encode(salt),
        auth_tag: STANDARD.encode(&ciphertext[tag_start..]),
        ciphertext: STANDARD.encode(&ciphertext[..tag_start]),
    })
}

/// Decrypt an envelope with a password
///
/// # Security
/// - The tag is verified before any plaintext is released
/// - Every failure, whatever the cause, is the same
///   [`CryptoError::DecryptionFailed`] so callers cannot act as an oracle
pub fn decrypt(envelope: &EncryptedEnvelope, password: &str) -> Result<Vec<u8>> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(CryptoError::DecryptionFailed);
    }

    let iv = decode_exact(&envelope.iv, IV_LEN)?;
    let salt = decode_exact(&envelope.salt, SALT_LEN)?;
    let tag = decode_exact(&envelope.auth_tag, TAG_LEN)?;
    let mut ciphertext_with_tag = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    ciphertext_with_tag.extend_from_slice(&tag);

    let mut key = derive_key(password.as_bytes(), &salt);
    let cipher = Aes256Gcm::new((&key).into());
    zeroize_bytes(&mut key);

    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext_with_tag.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn decode_exact(field: &str, len: usize) -> Result<Vec<u8>> {
    match STANDARD.decode(field) {
        Ok(bytes) if bytes.len() == len => Ok(bytes),
        _ => Err(CryptoError::DecryptionFailed),
    }
}

/// Serialize a value to JSON and encrypt it
pub fn encrypt_object<T: Serialize>(value: &T, password: &str) -> Result<EncryptedEnvelope> {
    let json =
        serde_json::to_vec(value).map_err(|e| CryptoError::SerializationFailed(e.to_string()))?;
    encrypt(&json, password)
}

/// Decrypt an envelope and deserialize the JSON inside
///
/// Returns `None` on any failure. Decryption and deserialization failures
/// are logged and swallowed alike.
pub fn decrypt_object<T: DeserializeOwned>(
    envelope: &EncryptedEnvelope,
    password: &str,
) -> Option<T> {
    let plaintext = match decrypt(envelope, password) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Envelope rejected: {}", e);
            return None;
        }
    };

    match serde_json::from_slice(&plaintext) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Envelope rejected: {}", CryptoError::DecryptionFailed);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flip_first_bit(field: &str) -> String {
        let mut bytes = STANDARD.decode(field).unwrap();
        bytes[0] ^= 0x01;
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"Hello, World! This is a test.";

        let envelope = encrypt(plaintext, "pw").unwrap();
        let decrypted = decrypt(&envelope, "pw").unwrap();

        assert_eq!(plaintext.to_vec(), decrypted);
    }

    #[test]
    fn test_empty_and_unicode_roundtrip() {
        for message in ["", "ünïcødé 🔐", "a"] {
            let envelope = encrypt(message.as_bytes(), "pässwörd").unwrap();
            let decrypted = decrypt(&envelope, "pässwörd").unwrap();
            assert_eq!(message.as_bytes(), decrypted.as_slice());
        }
    }

    #[test]
    fn test_fresh_iv_and_salt() {
        let plaintext = b"Same data";

        let a = encrypt(plaintext, "pw").unwrap();
        let b = encrypt(plaintext, "pw").unwrap();

        assert_ne!(a.iv, b.iv);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password_fails() {
        let envelope = encrypt(b"Secret data", "pw1").unwrap();

        assert_eq!(
            decrypt(&envelope, "pw2"),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut envelope = encrypt(b"Original data", "pw").unwrap();
        envelope.ciphertext = flip_first_bit(&envelope.ciphertext);

        assert!(decrypt(&envelope, "pw").is_err());
    }

    #[test]
    fn test_tampered_tag_fails() {
        let mut envelope = encrypt(b"Original data", "pw").unwrap();
        envelope.auth_tag = flip_first_bit(&envelope.auth_tag);

        assert!(decrypt(&envelope, "pw").is_err());
    }

    #[test]
    fn test_tampered_iv_fails() {
        let mut envelope = encrypt(b"Original data", "pw").unwrap();
        envelope.iv = flip_first_bit(&envelope.iv);

        assert!(decrypt(&envelope, "pw").is_err());
    }

    #[test]
    fn test_unknown_version_refused() {
        let mut envelope = encrypt(b"Original data", "pw").unwrap();
        envelope.version = 2;

        assert_eq!(decrypt(&envelope, "pw"), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_malformed_fields_fail_uniformly() {
        let good = encrypt(b"data", "pw").unwrap();

        let mut bad_iv = good.clone();
        bad_iv.iv = STANDARD.encode([0u8; 4]);
        let mut bad_b64 = good.clone();
        bad_b64.ciphertext = "%%%".to_string();

        assert_eq!(decrypt(&bad_iv, "pw"), Err(CryptoError::DecryptionFailed));
        assert_eq!(decrypt(&bad_b64, "pw"), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = encrypt(b"x", "pw").unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["version"], json!(1));
        assert!(value.get("authTag").is_some());
        assert!(value.get("ciphertext").is_some());
    }

    #[test]
    fn test_object_roundtrip() {
        let value = json!({ "profiles": [{ "id": "p1" }], "lastUpdated": 1000 });

        let envelope = encrypt_object(&value, "pw").unwrap();
        let back: Option<serde_json::Value> = decrypt_object(&envelope, "pw");

        assert_eq!(back, Some(value));
    }

    #[test]
    fn test_object_wrong_type_is_none() {
        let envelope = encrypt(b"not json at all", "pw").unwrap();
        let back: Option<serde_json::Value> = decrypt_object(&envelope, "pw");

        assert!(back.is_none());
        let wrong_pw: Option<serde_json::Value> = decrypt_object(&envelope, "other");
        assert!(wrong_pw.is_none());
    }
}
