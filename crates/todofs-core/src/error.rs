//! Error types for the todofs-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors
//! that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use todofs_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingFile(Utf8PathBuf::from("/etc/todofs.json"));
/// assert!(error.to_string().contains("/etc/todofs.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// The configuration file does not exist.
    #[error("configuration file not found: {0}")]
    MissingFile(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::InvalidPath`] error.
    #[inline]
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("/invalid/path", "path has no file name");
        let msg = error.to_string();
        assert!(msg.contains("/invalid/path"));
        assert!(msg.contains("no file name"));
    }

    #[test]
    fn test_missing_file_display() {
        let error = ConfigError::MissingFile(Utf8PathBuf::from("/missing/todofs.json"));
        assert_eq!(
            error.to_string(),
            "configuration file not found: /missing/todofs.json"
        );
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("resume_delay_ms", "must be positive");
        let msg = error.to_string();
        assert!(msg.contains("resume_delay_ms"));
        assert!(msg.contains("must be positive"));
    }
}
