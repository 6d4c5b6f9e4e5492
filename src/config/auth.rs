//! Credentials and authentication settings.

use super::read_json;
use crate::device::Device;
use crate::error::{ConfigResult, DriverError, DriverResult};
use crate::policy::Policy;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// A username/password pair. Drivers with a fixed user name ignore `username`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

impl Credentials {
    pub fn new(username: Option<String>, password: impl Into<String>) -> Self {
        Self {
            username,
            password: password.into(),
        }
    }

    /// The configured username, or `default` when none is set.
    pub fn username_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.username.as_deref().unwrap_or(default)
    }
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Credentials to apply to devices, optionally restricted by a policy.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub policy: Option<Policy>,
}

impl AuthConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        read_json(path)
    }

    /// Fail with `ExcludedByPolicy` if the attached policy excludes `device`.
    pub fn check(&self, device: &dyn Device) -> DriverResult<()> {
        check_policy(self.policy.as_ref(), device)
    }
}

pub(crate) fn check_policy(policy: Option<&Policy>, device: &dyn Device) -> DriverResult<()> {
    match policy {
        Some(policy) if policy.is_excluded(device) => Err(DriverError::ExcludedByPolicy),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::testing::FakeDevice;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_with_policy() {
        let file = write_file(
            r#"{
                "credentials": {"username": "ops", "password": "hunter2"},
                "policy": {"mode": "whitelist", "models": ["^SHSW-1$"]}
            }"#,
        );
        let auth = AuthConfig::load(file.path()).unwrap();

        assert_eq!(auth.credentials.username_or("admin"), "ops");
        assert!(auth
            .check(&FakeDevice::new("a", "SHSW-1", "AA:00:00:00:00:01"))
            .is_ok());
        assert!(matches!(
            auth.check(&FakeDevice::new("b", "SPSW-2", "AA:00:00:00:00:02")),
            Err(DriverError::ExcludedByPolicy)
        ));
    }

    #[test]
    fn test_missing_password_rejected() {
        let file = write_file(r#"{"credentials": {"username": "ops"}}"#);
        assert!(matches!(
            AuthConfig::load(file.path()),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_undefined_policy_mode_rejected() {
        let file = write_file(
            r#"{"credentials": {"password": "x"}, "policy": {"names": ["a"]}}"#,
        );
        assert!(AuthConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_username_defaults() {
        let credentials = Credentials::new(None, "secret");
        assert_eq!(credentials.username_or("admin"), "admin");
        assert!(!format!("{:?}", credentials).contains("secret"));
    }
}
