//! Application settings and paths.
//!
//! Settings are read from `settings.json` in the XDG config directory unless a
//! file is named explicitly. A missing default file means defaults.

use super::read_json;
use crate::cli::OutputFormat;
use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/tapper)
    pub config_dir: PathBuf,
}

impl Paths {
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("io", "tapper", "tapper").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Per-address probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// Timeout for procedure requests in milliseconds.
    pub request_timeout_ms: u64,
    /// Default output format.
    pub output: OutputFormat,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 8000,
            request_timeout_ms: 10000,
            output: OutputFormat::Plain,
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => read_json(path),
            None => {
                let file = Paths::new()?.settings_file();
                if !file.exists() {
                    debug!(path = %file.display(), "no settings file, using defaults");
                    return Ok(Self::default());
                }
                read_json(&file)
            }
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.probe_timeout(), Duration::from_secs(8));
        assert_eq!(settings.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.output, OutputFormat::Plain);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"probe_timeout_ms": 1500, "output": "json"}}"#).unwrap();

        let settings = AppSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.probe_timeout_ms, 1500);
        assert_eq!(settings.request_timeout_ms, 10000);
        assert_eq!(settings.output, OutputFormat::Json);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppSettings::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_invalid_format() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = AppSettings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { .. }));
    }
}
