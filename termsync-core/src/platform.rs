//! Platform-specific utilities for cross-platform support

use std::path::PathBuf;

const APP_DIR: &str = "termsync";

/// Get the platform-specific config directory
///
/// Returns:
/// - Windows: %APPDATA%\termsync
/// - macOS: ~/Library/Application Support/termsync
/// - Linux/Other: ~/.config/termsync
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the default path of the persisted sync state
pub fn get_default_state_path() -> PathBuf {
    get_config_dir().join("state.json")
}

/// Get the current user's home directory as a string
///
/// Falls back to the current directory when no home can be determined.
pub fn get_home_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .to_string_lossy()
        .into_owned()
}
