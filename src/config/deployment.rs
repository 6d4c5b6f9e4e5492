//! Script deployments.

use super::auth::check_policy;
use super::read_json;
use crate::device::Device;
use crate::error::{ConfigError, ConfigResult, DriverResult};
use crate::policy::Policy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A script to install in a device slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub slot: u32,
    pub name: String,
    pub code: String,
    /// Start the script after upload.
    pub enable: bool,
}

/// Scripts to deploy, optionally restricted by a policy.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub scripts: Vec<Script>,
    pub policy: Option<Policy>,
}

#[derive(Debug, Deserialize)]
struct DeploymentFile {
    scripts: Vec<ScriptEntry>,
    #[serde(default)]
    policy: Option<Policy>,
}

#[derive(Debug, Deserialize)]
struct ScriptEntry {
    slot: u32,
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default = "default_enable")]
    enable: bool,
}

fn default_enable() -> bool {
    true
}

impl Deployment {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Load a deployment file. Script paths are relative to the file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let file: DeploymentFile = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let scripts = file
            .scripts
            .into_iter()
            .map(|entry| entry.resolve(base))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            scripts,
            policy: file.policy,
        })
    }

    /// Fail with `ExcludedByPolicy` if the attached policy excludes `device`.
    pub fn check(&self, device: &dyn Device) -> DriverResult<()> {
        check_policy(self.policy.as_ref(), device)
    }
}

impl ScriptEntry {
    fn resolve(self, base: &Path) -> ConfigResult<Script> {
        let code = match (self.code, self.path) {
            (Some(code), None) => code,
            (None, Some(relative)) => {
                let path = base.join(relative);
                fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
                    path,
                    reason: e.to_string(),
                })?
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidDeployment(format!(
                    "script {:?} has both code and path",
                    self.name
                )))
            }
            (None, None) => {
                return Err(ConfigError::InvalidDeployment(format!(
                    "script {:?} has neither code nor path",
                    self.name
                )))
            }
        };

        Ok(Script {
            slot: self.slot,
            name: self.name,
            code,
            enable: self.enable,
        })
    }
}
