//! Configuration management for Tapper.
//!
//! Application settings live in an XDG-compliant location; credentials,
//! driver configuration and deployments are JSON files named on the command
//! line.

mod auth;
mod deployment;
mod driver;
mod settings;

pub use auth::{AuthConfig, Credentials};
pub use deployment::{Deployment, Script};
pub use driver::Config;
pub use settings::{AppSettings, Paths};

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read and decode a JSON file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
