//! Device abstraction.
//!
//! Every discovered device satisfies the [`Device`] identity contract. What a
//! device can *do* is expressed through optional capability traits exposed by
//! the `as_*` accessors: a driver overrides the accessors for the capabilities
//! it implements and leaves the rest returning `None`.

mod capability;
mod collection;

pub use capability::{
    Configurer, Deployer, Enricher, Prober, Rebooter, Securer, Updater, Versioner,
};
pub use collection::DeviceCollection;

use crate::dispatch::{Challenger, HttpResponse};
use crate::error::DriverResult;
use crate::types::HwAddr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A named, optional behavior a device may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Configure,
    Secure,
    Deploy,
    Reboot,
    Update,
    Version,
    Enrich,
}

impl Capability {
    /// Every capability, in display order.
    pub const ALL: [Capability; 7] = [
        Self::Configure,
        Self::Secure,
        Self::Deploy,
        Self::Reboot,
        Self::Update,
        Self::Version,
        Self::Enrich,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Secure => "secure",
            Self::Deploy => "deploy",
            Self::Reboot => "reboot",
            Self::Update => "update",
            Self::Version => "version",
            Self::Enrich => "enrich",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Installed firmware and, after a version check, the available update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareStatus {
    pub current: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
}

impl FirmwareStatus {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            available: None,
        }
    }

    pub fn has_update(&self) -> bool {
        self.available
            .as_deref()
            .is_some_and(|available| available != self.current)
    }
}

/// Identity contract every device satisfies, plus capability accessors.
pub trait Device: Send + Sync + fmt::Debug {
    /// Tag of the driver family that produced this device.
    fn driver(&self) -> &'static str;
    fn address(&self) -> IpAddr;
    /// Unique key within one scan.
    fn hw_addr(&self) -> HwAddr;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn id(&self) -> &str;

    fn firmware(&self) -> Option<&FirmwareStatus> {
        None
    }

    fn as_configurer(&self) -> Option<&dyn Configurer> {
        None
    }

    fn as_securer(&self) -> Option<&dyn Securer> {
        None
    }

    fn as_securer_mut(&mut self) -> Option<&mut dyn Securer> {
        None
    }

    fn as_deployer(&self) -> Option<&dyn Deployer> {
        None
    }

    fn as_rebooter(&self) -> Option<&dyn Rebooter> {
        None
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        None
    }

    fn as_versioner(&self) -> Option<&dyn Versioner> {
        None
    }

    fn as_versioner_mut(&mut self) -> Option<&mut dyn Versioner> {
        None
    }

    fn as_enricher(&self) -> Option<&dyn Enricher> {
        None
    }

    fn as_enricher_mut(&mut self) -> Option<&mut dyn Enricher> {
        None
    }

    /// Responder for authentication challenges, if the device has one.
    fn as_challenger(&self) -> Option<&dyn Challenger> {
        None
    }

    /// Inspect the successful reply to a request whose body is not decoded.
    fn check_reply(&self, _response: &HttpResponse) -> DriverResult<()> {
        Ok(())
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Configure => self.as_configurer().is_some(),
            Capability::Secure => self.as_securer().is_some(),
            Capability::Deploy => self.as_deployer().is_some(),
            Capability::Reboot => self.as_rebooter().is_some(),
            Capability::Update => self.as_updater().is_some(),
            Capability::Version => self.as_versioner().is_some(),
            Capability::Enrich => self.as_enricher().is_some(),
        }
    }

    fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.supports(*capability))
            .collect()
    }

    /// Serializable snapshot for output and error reporting.
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            driver: self.driver().to_string(),
            id: self.id().to_string(),
            name: self.name().to_string(),
            model: self.model().to_string(),
            address: self.address(),
            hw_addr: self.hw_addr(),
            firmware: self.firmware().cloned(),
            capabilities: self.capabilities(),
        }
    }
}

/// Snapshot of a device's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub driver: String,
    pub id: String,
    pub name: String,
    pub model: String,
    pub address: IpAddr,
    pub hw_addr: HwAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareStatus>,
    pub capabilities: Vec<Capability>,
}
