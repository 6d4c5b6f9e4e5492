//! Error types for Tapper.
//!
//! Uses `thiserror` for ergonomic error definitions. The layering follows the
//! request path: transport → dispatch → driver → procedure, with
//! [`AggregateError`] collecting per-device failures for reporting.

use crate::device::{Capability, DeviceInfo};
use crate::types::{HwAddrError, TargetError};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Network-level failure while talking to a device.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP transport error: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

/// Failure to answer an authentication challenge.
#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("malformed authentication challenge: {0}")]
    Malformed(String),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),
}

/// Error returned by a single dispatched request.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unauthorized request to {path}")]
    Unauthorized { path: String },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsuccessful request to {path} (status {status}): {body}")]
    Unsuccessful {
        path: String,
        status: u16,
        body: String,
    },

    #[error("authentication challenge failed: {0}")]
    Challenge(#[from] ChallengeError),
}

/// Error raised by a driver while building requests or reading responses.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("not a {driver} device: {reason}")]
    Mismatch {
        driver: &'static str,
        reason: String,
    },

    #[error("excluded by policy")]
    ExcludedByPolicy,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome error of one procedure (or probe) applied to one device.
#[derive(Error, Debug)]
pub enum ProcedureError {
    #[error("unsupported procedure: {0}")]
    Unsupported(Capability),

    #[error("no {0} loaded")]
    MissingInput(&'static str),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("worker exited without reporting a result")]
    WorkerLost,
}

impl ProcedureError {
    /// The device was intentionally skipped by a policy.
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Driver(DriverError::ExcludedByPolicy))
    }

    /// During probing these errors mean "nothing we recognise lives here":
    /// closed ports, foreign HTTP services and non-JSON payloads all look alike.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::Dispatch(DispatchError::Transport(_))
                | Self::Dispatch(DispatchError::Decode { .. })
                | Self::Driver(DriverError::Mismatch { .. })
        )
    }
}

/// One failed device (or address, if the failure predates identification).
#[derive(Debug)]
pub struct Failure {
    pub device: Option<DeviceInfo>,
    pub address: Option<IpAddr>,
    pub error: ProcedureError,
}

impl Failure {
    pub fn for_device(device: DeviceInfo, error: ProcedureError) -> Self {
        Self {
            address: Some(device.address),
            device: Some(device),
            error,
        }
    }

    pub fn for_address(address: IpAddr, error: ProcedureError) -> Self {
        Self {
            device: None,
            address: Some(address),
            error,
        }
    }

    pub fn unattributed(error: ProcedureError) -> Self {
        Self {
            device: None,
            address: None,
            error,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.device, self.address) {
            (Some(device), _) => write!(
                f,
                "{} {} ({}): {}",
                device.driver, device.id, device.address, self.error
            ),
            (None, Some(address)) => write!(f, "{}: {}", address, self.error),
            (None, None) => write!(f, "{}", self.error),
        }
    }
}

/// A collection of per-device failures.
///
/// Never collapsed into one message: `Display` prints one line per failure.
#[derive(Debug, Default)]
pub struct AggregateError {
    failures: Vec<Failure>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter()
    }

    /// Append the failures of another aggregate.
    pub fn extend(&mut self, other: AggregateError) {
        self.failures.extend(other.failures);
    }

    /// `Ok(())` when empty, the aggregate itself otherwise.
    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoIterator for AggregateError {
    type Item = Failure;
    type IntoIter = std::vec::IntoIter<Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Errors from the inclusion/exclusion policy engine.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy mode must be \"blacklist\" or \"whitelist\", got {0:?}")]
    UndefinedMode(String),

    #[error("invalid {field} pattern {pattern:?}: {reason}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    #[error(transparent)]
    InvalidHwAddr(#[from] HwAddrError),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid format in {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("invalid deployment: {0}")]
    InvalidDeployment(String),
}

/// CLI-level errors.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{} device(s) failed", .0.len())]
    Failures(AggregateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for dispatched requests.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type alias for driver capability methods.
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
