//! Translation between machine-absolute paths and a portable form.
//!
//! A path under the user's home directory is written as
//! `$SYNC_HOME/seg/seg` with forward slashes regardless of the platform
//! that produced it, and expanded back with the consuming machine's home
//! directory and separator. Paths outside home are left untouched; they
//! will not resolve on another machine, which is accepted.

use crate::platform::get_home_dir;
use serde_json::Value;

/// Token standing in for the home directory in portable paths
pub const PORTABLE_HOME: &str = "$SYNC_HOME";

/// Path conventions of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Native path separator
    pub fn separator(self) -> char {
        match self {
            Self::Windows => '\\',
            Self::Unix => '/',
        }
    }

    /// Normalize a path: unify separators, drop `.` and empty segments,
    /// resolve `..` where possible.
    pub fn normalize(self, path: &str) -> String {
        let sep = self.separator();
        let unified: String = match self {
            Self::Windows => path.replace('/', "\\"),
            Self::Unix => path.to_string(),
        };

        let (prefix, rest) = split_root(self, &unified);
        let rooted = !prefix.is_empty();

        let mut segments: Vec<&str> = Vec::new();
        for segment in rest.split(sep) {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(&last) if last != ".." => {
                        segments.pop();
                    }
                    _ if rooted => {}
                    _ => segments.push(".."),
                },
                other => segments.push(other),
            }
        }

        let joined = segments.join(&sep.to_string());
        match (prefix.is_empty(), joined.is_empty()) {
            (true, true) => ".".to_string(),
            (true, false) => joined,
            (false, _) => format!("{}{}", prefix, joined),
        }
    }

    fn comparison_key(self, path: &str) -> String {
        match self {
            // NTFS is case-insensitive
            Self::Windows => path.to_ascii_lowercase(),
            Self::Unix => path.to_string(),
        }
    }
}

/// Split a separator-unified path into its root prefix and the remainder.
///
/// The prefix always ends with a separator when the path is rooted.
fn split_root(platform: Platform, path: &str) -> (String, &str) {
    match platform {
        Platform::Unix => match path.strip_prefix('/') {
            Some(rest) => ("/".to_string(), rest),
            None => (String::new(), path),
        },
        Platform::Windows => {
            if let Some(rest) = path.strip_prefix("\\\\") {
                return ("\\\\".to_string(), rest);
            }
            let bytes = path.as_bytes();
            if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
                let drive = &path[..2];
                let rest = path[2..].trim_start_matches('\\');
                return (format!("{}\\", drive), rest);
            }
            match path.strip_prefix('\\') {
                Some(rest) => ("\\".to_string(), rest),
                None => (String::new(), path),
            }
        }
    }
}

/// Maps paths between local and portable form for one machine
#[derive(Debug, Clone)]
pub struct PathMapper {
    home: String,
    platform: Platform,
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::current()
    }
}

impl PathMapper {
    /// Mapper for the running machine and user
    pub fn current() -> Self {
        Self::new(get_home_dir(), Platform::current())
    }

    /// Mapper for an explicit home directory and platform
    pub fn new(home: impl Into<String>, platform: Platform) -> Self {
        let home = platform.normalize(&home.into());
        Self { home, platform }
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Convert a local path to portable form
    pub fn portable_path(&self, path: &str) -> String {
        let sep = self.platform.separator();
        let normalized = self.platform.normalize(path);
        let key = self.platform.comparison_key(&normalized);
        let home_key = self.platform.comparison_key(&self.home);

        if key == home_key {
            return PORTABLE_HOME.to_string();
        }

        let home_prefix = if home_key.ends_with(sep) {
            home_key
        } else {
            format!("{}{}", home_key, sep)
        };

        if key.starts_with(&home_prefix) {
            // ASCII lowercasing keeps byte offsets intact
            let relative = &normalized[home_prefix.len()..];
            let segments: Vec<&str> = relative.split(sep).filter(|s| !s.is_empty()).collect();
            return format!("{}/{}", PORTABLE_HOME, segments.join("/"));
        }

        path.to_string()
    }

    /// Convert a portable path back to this machine's local form
    pub fn local_path(&self, portable: &str) -> String {
        if portable == PORTABLE_HOME {
            return self.home.clone();
        }

        let Some(relative) = portable.strip_prefix(PORTABLE_HOME) else {
            return portable.to_string();
        };
        let Some(relative) = relative.strip_prefix('/') else {
            // e.g. "$SYNC_HOMEWORK" is not a portable path
            return portable.to_string();
        };

        let sep = self.platform.separator();
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return self.home.clone();
        }

        let joined = segments.join(&sep.to_string());
        if self.home.ends_with(sep) {
            format!("{}{}", self.home, joined)
        } else {
            format!("{}{}{}", self.home, sep, joined)
        }
    }

    /// Apply [`PathMapper::portable_path`] to a loosely-typed value
    ///
    /// Anything that is not a string is returned unchanged.
    pub fn to_portable(&self, value: &Value) -> Value {
        match value {
            Value::String(path) => Value::String(self.portable_path(path)),
            other => other.clone(),
        }
    }

    /// Apply [`PathMapper::local_path`] to a loosely-typed value
    pub fn to_local(&self, value: &Value) -> Value {
        match value {
            Value::String(portable) => Value::String(self.local_path(portable)),
            other => other.clone(),
        }
    }
}
