//! Collaborators supplied by the host.

use crate::models::RawConfig;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Placeholder used when the machine name cannot be determined
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Read and write the host's configuration tree
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn read_config(&self) -> Result<RawConfig>;

    async fn write_config(&self, config: &RawConfig) -> Result<()>;
}

/// A stored revision of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobVersion {
    pub id: String,
    /// Epoch milliseconds
    pub modified_time: i64,
    pub size: u64,
}

/// Remote object storage holding the encrypted blob
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether credentials for the remote are available
    fn is_connected(&self) -> bool {
        true
    }

    /// Current contents of `name`, or `None` if it was never uploaded
    async fn download(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the contents of `name`, returning the remote file id
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Stored revisions of `name`, newest first
    async fn list_versions(&self, name: &str) -> Result<Vec<BlobVersion>>;

    async fn download_version(&self, name: &str, version_id: &str) -> Result<Vec<u8>>;
}

/// Name of the current machine, recorded as the payload source
pub trait HostnameProvider: Send + Sync {
    fn current_hostname(&self) -> String;
}

/// Hostname from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostname;

impl HostnameProvider for SystemHostname {
    fn current_hostname(&self) -> String {
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_HOST.to_string())
    }
}

/// Names of installed host extensions, reported alongside the payload
pub trait ExtensionLister: Send + Sync {
    fn installed_extension_names(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_hostname_is_never_empty() {
        assert!(!SystemHostname.current_hostname().is_empty());
    }

    #[test]
    fn blob_version_wire_format() {
        let version = BlobVersion {
            id: "v1".to_string(),
            modified_time: 1000,
            size: 42,
        };

        assert_eq!(
            serde_json::to_value(&version).unwrap(),
            serde_json::json!({ "id": "v1", "modifiedTime": 1000, "size": 42 })
        );
    }
}
