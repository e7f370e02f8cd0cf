//! Last-Write-Wins conflict resolution.

use serde::{Deserialize, Serialize};

/// Which side of a conflict won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local value (local is newer or equal).
    Local,
    /// Accept the remote value (remote is strictly newer).
    Remote,
}

/// A profile present on both sides whose syncable forms differed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub profile_id: String,
    pub profile_name: String,
    pub resolution: Resolution,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve between two payload timestamps (epoch milliseconds).
    ///
    /// Ties keep local.
    pub fn resolve(local_updated: i64, remote_updated: i64) -> Resolution {
        if remote_updated > local_updated {
            Resolution::Remote
        } else {
            Resolution::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_remote_wins() {
        assert_eq!(ConflictResolver::resolve(1000, 2000), Resolution::Remote);
    }

    #[test]
    fn newer_local_wins() {
        assert_eq!(ConflictResolver::resolve(2000, 1000), Resolution::Local);
    }

    #[test]
    fn equal_timestamps_keep_local() {
        assert_eq!(ConflictResolver::resolve(1000, 1000), Resolution::Local);
    }

    #[test]
    fn record_serializes_lowercase_resolution() {
        let record = ConflictRecord {
            profile_id: "p1".to_string(),
            profile_name: "prod".to_string(),
            resolution: Resolution::Remote,
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({ "profileId": "p1", "profileName": "prod", "resolution": "remote" })
        );
    }
}
