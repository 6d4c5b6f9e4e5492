//! Built-in device drivers and the prober registry.
//!
//! A driver family contributes a [`Prober`] that recognises its devices and a
//! device type implementing whichever capabilities the hardware supports.

pub mod gen1;
pub mod gen2;

use crate::device::Prober;
use crate::error::{DriverError, DriverResult};
use reqwest::Url;
use std::fmt;
use std::net::IpAddr;

/// Ordered set of probers. The probe engine tries them in registration order.
#[derive(Default)]
pub struct DriverRegistry {
    probers: Vec<Box<dyn Prober>>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in driver.
    pub fn builtin() -> Self {
        Self::new()
            .with(Box::new(gen1::Gen1Prober))
            .with(Box::new(gen2::Gen2Prober))
    }

    pub fn with(mut self, prober: Box<dyn Prober>) -> Self {
        self.register(prober);
        self
    }

    pub fn register(&mut self, prober: Box<dyn Prober>) {
        self.probers.push(prober);
    }

    pub fn probers(&self) -> &[Box<dyn Prober>] {
        &self.probers
    }

    pub fn len(&self) -> usize {
        self.probers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probers.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.probers.iter().map(|prober| prober.driver()))
            .finish()
    }
}

/// `http://<address>/<path>`, bracketing IPv6 hosts.
pub(crate) fn device_url(address: IpAddr, path: &str) -> DriverResult<Url> {
    let host = match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    };
    let raw = format!("http://{}/{}", host, path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|e| DriverError::InvalidRequest(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_builtin_order() {
        let registry = DriverRegistry::builtin();
        let drivers: Vec<&str> = registry.probers().iter().map(|p| p.driver()).collect();
        assert_eq!(drivers, vec!["gen1", "gen2"]);
        assert_eq!(format!("{:?}", registry), r#"["gen1", "gen2"]"#);
    }

    #[test]
    fn test_device_url() {
        let v4 = device_url(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), "/shelly").unwrap();
        assert_eq!(v4.as_str(), "http://192.168.1.20/shelly");

        let v6 = device_url(IpAddr::V6(Ipv6Addr::LOCALHOST), "rpc").unwrap();
        assert_eq!(v6.as_str(), "http://[::1]/rpc");
    }
}
