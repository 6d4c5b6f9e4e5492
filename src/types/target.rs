//! Probe target specifications with CIDR and hostname support.
//!
//! A target list is what the user hands to `--target`:
//! - Single IP addresses (IPv4 and IPv6)
//! - CIDR notation (192.168.1.0/24)
//! - Hostnames (shelly-kitchen.lan)
//! - Any comma-separated mix of the above

use ipnetwork::IpNetwork;
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("CIDR range too large: {0} addresses (max: {1})")]
    CidrTooLarge(u128, u128),
    #[error("no targets specified")]
    Empty,
}

/// A single target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A single IP address.
    Single(IpAddr),
    /// A CIDR network range.
    Cidr(IpNetwork),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Maximum number of hosts allowed in a CIDR range.
    pub const MAX_CIDR_HOSTS: u128 = 65536;

    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if s.contains('/') {
            let network: IpNetwork = s
                .parse()
                .map_err(|_| TargetError::InvalidCidr(s.to_string()))?;

            let host_count = network_size(&network);
            if host_count > Self::MAX_CIDR_HOSTS {
                return Err(TargetError::CidrTooLarge(host_count, Self::MAX_CIDR_HOSTS));
            }

            return Ok(Self::Cidr(network));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Resolve this specification to concrete addresses.
    ///
    /// CIDR ranges expand to every host address (IPv4 network and broadcast
    /// addresses are skipped); hostnames resolve to their first address.
    pub async fn resolve(&self) -> Result<Vec<IpAddr>, TargetError> {
        match self {
            Self::Single(ip) => Ok(vec![*ip]),

            Self::Cidr(network) => Ok(network
                .iter()
                .filter(|ip| match (network, ip) {
                    (IpNetwork::V4(net), IpAddr::V4(addr)) if net.prefix() < 31 => {
                        *addr != net.network() && *addr != net.broadcast()
                    }
                    _ => true,
                })
                .collect()),

            Self::Hostname(hostname) => {
                let resolver =
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

                let response = resolver.lookup_ip(hostname.as_str()).await.map_err(|e| {
                    TargetError::DnsResolutionFailed(hostname.clone(), e.to_string())
                })?;

                response
                    .iter()
                    .next()
                    .map(|ip| vec![ip])
                    .ok_or_else(|| TargetError::NoAddressesFound(hostname.clone()))
            }
        }
    }

    /// Estimate how many hosts this target represents.
    pub fn estimated_host_count(&self) -> u128 {
        match self {
            Self::Single(_) | Self::Hostname(_) => 1,
            Self::Cidr(network) => network_size(network),
        }
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Cidr(network) => write!(f, "{}", network),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// An ordered list of target specifications.
#[derive(Debug, Clone, Default)]
pub struct TargetList {
    specs: Vec<TargetSpec>,
}

impl TargetList {
    /// Parse every entry, splitting each on commas.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, TargetError> {
        let specs = entries
            .iter()
            .flat_map(|entry| entry.as_ref().split(','))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(TargetSpec::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if specs.is_empty() {
            return Err(TargetError::Empty);
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[TargetSpec] {
        &self.specs
    }

    /// Resolve all specifications into a sorted, deduplicated address list.
    pub async fn resolve(&self) -> Result<Vec<IpAddr>, TargetError> {
        let mut addresses = BTreeSet::new();
        for spec in &self.specs {
            addresses.extend(spec.resolve().await?);
        }
        Ok(addresses.into_iter().collect())
    }
}

fn network_size(network: &IpNetwork) -> u128 {
    match network {
        IpNetwork::V4(net) => net.size() as u128,
        IpNetwork::V6(net) => {
            let prefix = net.prefix() as u32;
            if prefix >= 128 {
                1
            } else {
                1u128 << (128 - prefix)
            }
        }
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().next().is_some_and(|c| c.is_alphanumeric())
            && label.chars().last().is_some_and(|c| c.is_alphanumeric())
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}
