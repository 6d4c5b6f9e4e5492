//! Optional capability contracts implemented by drivers.
//!
//! Request-building methods are pure functions of device state: they never
//! perform I/O. The procedure framework dispatches what they return.

use super::Device;
use crate::config::{AuthConfig, Credentials, Deployment};
use crate::dispatch::HttpRequest;
use crate::error::DriverResult;
use serde_json::Value;
use std::net::IpAddr;

/// Recognises a driver's devices at an address.
///
/// Probers are registered in a [`DriverRegistry`](crate::drivers::DriverRegistry)
/// rather than hanging off a device, since no device exists yet when probing.
pub trait Prober: Send + Sync {
    /// Driver tag of the devices this prober produces.
    fn driver(&self) -> &'static str;

    /// Request issued to `address` to test for a device.
    fn probe_request(&self, address: IpAddr) -> DriverResult<HttpRequest>;

    /// Turn the decoded probe payload into a device.
    ///
    /// Must return [`DriverError::Mismatch`](crate::error::DriverError::Mismatch)
    /// when the payload is valid JSON but not one of this driver's devices.
    fn identify(&self, address: IpAddr, payload: Value) -> DriverResult<Box<dyn Device>>;
}

/// Applies a driver-specific configuration section.
pub trait Configurer: Send + Sync {
    fn configure_requests(&self, config: &Value) -> DriverResult<Vec<HttpRequest>>;
}

/// Enables authentication on the device.
pub trait Securer: Send + Sync {
    /// Request enabling `auth`'s credentials. Returns
    /// [`DriverError::ExcludedByPolicy`](crate::error::DriverError::ExcludedByPolicy)
    /// if the attached policy excludes this device.
    fn secure_request(&self, auth: &AuthConfig) -> DriverResult<HttpRequest>;

    /// Store the secret used to answer authentication challenges.
    fn set_credentials(&mut self, credentials: &Credentials);

    fn has_credentials(&self) -> bool;
}

/// Installs scripts on the device.
pub trait Deployer: Send + Sync {
    fn deploy_requests(&self, deployment: &Deployment) -> DriverResult<Vec<HttpRequest>>;
}

pub trait Rebooter: Send + Sync {
    fn reboot_request(&self) -> DriverResult<HttpRequest>;
}

pub trait Updater: Send + Sync {
    fn update_request(&self) -> DriverResult<HttpRequest>;
}

/// Checks installed and available firmware versions.
pub trait Versioner: Send + Sync {
    fn version_request(&self) -> DriverResult<HttpRequest>;

    /// Record the version check response on the device.
    fn apply_version(&mut self, payload: Value) -> DriverResult<()>;
}

/// Fetches supplementary metadata such as the user-assigned name.
pub trait Enricher: Send + Sync {
    fn enrich_request(&self) -> DriverResult<HttpRequest>;

    fn apply_enrichment(&mut self, payload: Value) -> DriverResult<()>;
}
