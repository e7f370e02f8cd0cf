//! Phases of a sync cycle.

use serde::{Deserialize, Serialize};

/// Where the orchestrator currently is in a cycle
///
/// Inbound: `Idle → Downloading → Decrypting → Merging → WritingLocal → Idle`.
/// Outbound: `Idle → Sanitizing → Encrypting → Uploading → Idle`.
/// Any phase may fail into `Error`, from which a new cycle may start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Downloading,
    Decrypting,
    Merging,
    WritingLocal,
    Sanitizing,
    Encrypting,
    Uploading,
    Error,
}

impl SyncPhase {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;

        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Idle | Error, Downloading | Sanitizing | Idle)
                // nothing stored remotely yet
                | (Downloading, Decrypting | Idle)
                | (Decrypting, Merging)
                // re-encryption under a new password
                | (Decrypting, Encrypting)
                // merge produced no local change
                | (Merging, WritingLocal | Idle)
                | (WritingLocal, Idle)
                // content unchanged since the last sync
                | (Sanitizing, Encrypting | Idle)
                | (Encrypting, Uploading)
                | (Uploading, Idle)
        )
    }

    /// Whether a cycle is in flight
    pub fn is_busy(self) -> bool {
        !matches!(self, SyncPhase::Idle | SyncPhase::Error)
    }
}
