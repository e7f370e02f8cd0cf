//! Sync orchestration against a remote blob store
//!
//! Drives the sanitize → encrypt → upload and download → decrypt → merge →
//! write halves of a cycle:
//! - One cycle at a time, guarded by an async mutex
//! - Retry with doubling backoff for remote calls
//! - Debounced auto-sync fed by configuration change events
//! - Content fingerprints so our own write-back never uploads again
//! - Master password held in memory only while unlocked

pub mod auto;
pub mod config;
pub mod engine;
pub mod memory;
pub mod retry;
pub mod state;
pub mod store;

pub use auto::{AutoSync, AutoSyncOptions, ConfigEvent};
pub use config::{JsonStateStore, MemoryStateStore, StateStore, SyncSettings};
pub use engine::{
    fingerprint, SyncAction, SyncOrchestrator, SyncOutcome, SyncStatus, REMOTE_FILE_NAME,
};
pub use memory::{MemoryBlobStore, MemoryConfigStore, StaticHostname};
pub use retry::RetryPolicy;
pub use state::SyncPhase;
pub use store::{
    BlobStore, BlobVersion, ConfigStore, ExtensionLister, HostnameProvider, SystemHostname,
};
