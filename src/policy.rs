//! Inclusion/exclusion policies.
//!
//! A [`Policy`] matches devices by name pattern, model pattern or hardware
//! address and, depending on its mode, excludes the matched devices
//! (blacklist) or every device it does not match (whitelist).
//!
//! A policy without a valid mode cannot be constructed, so evaluation never
//! has to deal with an undefined mode.

use crate::device::Device;
use crate::error::PolicyError;
use crate::types::HwAddr;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How matched devices are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Matched devices are excluded.
    Blacklist,
    /// Unmatched devices are excluded.
    Whitelist,
}

impl PolicyMode {
    /// Whether a device with the given match result is excluded.
    pub const fn excludes(self, matched: bool) -> bool {
        match self {
            Self::Blacklist => matched,
            Self::Whitelist => !matched,
        }
    }
}

impl FromStr for PolicyMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blacklist" => Ok(Self::Blacklist),
            "whitelist" => Ok(Self::Whitelist),
            other => Err(PolicyError::UndefinedMode(other.to_string())),
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blacklist => write!(f, "blacklist"),
            Self::Whitelist => write!(f, "whitelist"),
        }
    }
}

/// A validated policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PolicyFile")]
pub struct Policy {
    mode: PolicyMode,
    names: Vec<Regex>,
    models: Vec<Regex>,
    devices: BTreeSet<HwAddr>,
}

/// On-disk shape of a policy, validated into [`Policy`].
#[derive(Debug, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    models: Vec<String>,
    #[serde(default)]
    devices: Vec<String>,
}

impl TryFrom<PolicyFile> for Policy {
    type Error = PolicyError;

    fn try_from(file: PolicyFile) -> Result<Self, Self::Error> {
        let mode: PolicyMode = file.mode.as_deref().unwrap_or_default().parse()?;
        let mut policy = Policy::new(mode);

        for pattern in &file.names {
            policy = policy.with_name(pattern)?;
        }
        for pattern in &file.models {
            policy = policy.with_model(pattern)?;
        }
        for device in &file.devices {
            policy = policy.with_device(device.parse()?);
        }
        Ok(policy)
    }
}

impl Policy {
    /// An empty policy. An empty whitelist excludes everything; an empty
    /// blacklist excludes nothing.
    pub fn new(mode: PolicyMode) -> Self {
        Self {
            mode,
            names: Vec::new(),
            models: Vec::new(),
            devices: BTreeSet::new(),
        }
    }

    /// Add a device name pattern.
    pub fn with_name(mut self, pattern: &str) -> Result<Self, PolicyError> {
        self.names.push(compile("names", pattern)?);
        Ok(self)
    }

    /// Add a model pattern.
    pub fn with_model(mut self, pattern: &str) -> Result<Self, PolicyError> {
        self.models.push(compile("models", pattern)?);
        Ok(self)
    }

    /// Add a hardware address.
    pub fn with_device(mut self, hw_addr: HwAddr) -> Self {
        self.devices.insert(hw_addr);
        self
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// True if any criterion matches the device.
    pub fn contains(&self, device: &dyn Device) -> bool {
        self.devices.contains(&device.hw_addr())
            || self.names.iter().any(|re| re.is_match(device.name()))
            || self.models.iter().any(|re| re.is_match(device.model()))
    }

    /// True if any criterion looks at the user-assigned name.
    pub fn matches_names(&self) -> bool {
        !self.names.is_empty()
    }

    pub fn is_excluded(&self, device: &dyn Device) -> bool {
        self.mode.excludes(self.contains(device))
    }
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, PolicyError> {
    Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
