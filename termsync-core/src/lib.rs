//! Terminal Configuration Sync Core Library
//!
//! This library provides the sanitize → encrypt → merge → apply pipeline
//! used to keep a terminal application's connection profiles and UI
//! settings in step across machines through a single encrypted remote blob.

pub mod crypto;
pub mod merge;
pub mod models;
pub mod pathmap;
pub mod platform;
pub mod sanitize;
pub mod sync;
pub mod tree;

pub use crypto::{
    decrypt, decrypt_object, encrypt, encrypt_object, hash_password, verify_password,
    CryptoError, EncryptedEnvelope, MasterPassword, PasswordHash,
};
pub use merge::{ConflictRecord, ConflictResolver, MergeResult, Merger, Resolution};
pub use models::{
    RawConfig, SyncPayload, SyncableGroup, SyncableProfile, SyncableSettings, VaultBlob,
};
pub use pathmap::{PathMapper, Platform};
pub use sanitize::Sanitizer;
pub use sync::{
    AutoSync, BlobStore, ConfigEvent, ConfigStore, SyncAction, SyncOrchestrator, SyncOutcome,
    SyncPhase, SyncSettings,
};

use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// General error type for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Master password is not set")]
    PasswordNotSet,

    #[error("Sync session is locked")]
    Locked,

    #[error("Invalid master password")]
    InvalidPassword,

    #[error("Remote storage is not connected")]
    NotConnected,

    #[error("Sync is disabled")]
    Disabled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid remote data: {0}")]
    Integrity(String),

    #[error("Failed to decrypt remote data (wrong password or corrupted blob)")]
    Decryption,

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of a [`SyncError`], used to decide retry and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller must fix setup first (password, connection). Never retried.
    Configuration,
    /// Network or storage hiccup. Retried with backoff.
    Transient,
    /// Remote data cannot be trusted for this cycle.
    Integrity,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PasswordNotSet
            | Self::Locked
            | Self::InvalidPassword
            | Self::NotConnected
            | Self::Disabled => ErrorKind::Configuration,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Transient,
            Self::Integrity(_) | Self::Decryption | Self::Crypto(_) | Self::Serialization(_) => {
                ErrorKind::Integrity
            }
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
