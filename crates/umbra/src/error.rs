//! Error types for configuration loading and platform boundaries.
//!
//! None of these ever escape the engine itself: storage failures are folded
//! into "no stored value" on read and dropped on write. They exist so that the
//! boundary implementations can say *why* something was unavailable, and so
//! hosts loading a [`ThemeConfig`](crate::ThemeConfig) get a useful message.

use std::io;
use std::path::PathBuf;

/// Errors returned by a [`PreferenceStore`](crate::env::PreferenceStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage is disabled, sandboxed, or otherwise inaccessible.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The write did not fit in the storage quota.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// The backing file could not be read or written.
    #[error("preference file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The backing file exists but is not a JSON object of strings.
    #[error("preference file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors produced while building or loading a theme configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The attribute is neither `class` nor a `data-*` name.
    #[error("invalid theme attribute '{0}': expected \"class\" or \"data-<name>\"")]
    InvalidAttribute(String),

    /// YAML parsing failed.
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing failed.
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// The config file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file extension does not name a supported format.
    #[error("unsupported config format for {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Errors raised while wiring a platform to a real host environment.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// There is no global `window` (not running in a browser main thread).
    #[error("no global window available")]
    NoWindow,

    /// A required DOM node is missing.
    #[error("document has no {0}")]
    MissingNode(&'static str),

    /// A browser API call threw.
    #[error("browser API call failed: {0}")]
    Js(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_attribute_message_names_the_value() {
        let err = ConfigError::InvalidAttribute("style".into());
        assert_eq!(
            err.to_string(),
            "invalid theme attribute 'style': expected \"class\" or \"data-<name>\""
        );
    }

    #[test]
    fn read_error_includes_path() {
        let err = ConfigError::Read {
            path: PathBuf::from("/tmp/theme.yaml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/tmp/theme.yaml"));
    }

    #[test]
    fn storage_error_from_io() {
        let err: StorageError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
