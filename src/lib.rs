//! # Tapper - Fleet Management for HTTP IoT Appliances
//!
//! Tapper finds supported devices on a local network and applies one
//! operation to all of them in parallel, collecting per-device failures
//! instead of stopping at the first one.
//!
//! ## Features
//!
//! - **Concurrent Probing**: One task per address, first matching driver wins
//! - **Capability-based Devices**: Operations a device lacks fail cleanly
//! - **Authentication Retry**: HTTP Basic and SHA-256 Digest challenges answered once
//! - **Policies**: Blacklist or whitelist devices by name, model or hardware address
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tapper::dispatch::HttpTransport;
//! use tapper::drivers::DriverRegistry;
//! use tapper::{procedure, scanner, Tapper};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = HttpTransport::new(Duration::from_secs(10))?;
//!     let tapper = Arc::new(Tapper::new(DriverRegistry::builtin(), Arc::new(transport)));
//!
//!     let addresses = vec!["192.168.1.20".parse()?, "192.168.1.21".parse()?];
//!     let mut report = scanner::scan(&tapper, addresses).await;
//!
//!     let summary = procedure::execute(&tapper, procedure::reboot, &mut report.devices).await;
//!     println!("rebooted {} device(s)", summary.into_result()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`dispatch`] - HTTP requests with challenge-response retry
//! - [`device`] - Device identity and capability traits
//! - [`drivers`] - Built-in driver families and the prober registry
//! - [`policy`] - Inclusion/exclusion policies
//! - [`scanner`] - The probe engine
//! - [`procedure`] - Fan-out execution of operations over devices
//! - [`config`] - Settings, credentials, driver configuration and deployments
//! - [`error`] - Error types
//! - [`output`] - Output formatting utilities

pub mod cli;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod drivers;
pub mod error;
pub mod output;
pub mod policy;
pub mod procedure;
pub mod scanner;
pub mod tapper;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use device::{Capability, Device, DeviceCollection, DeviceInfo};
pub use error::{AggregateError, CliError, DispatchError, DriverError, ProcedureError};
pub use policy::{Policy, PolicyMode};
pub use procedure::{ExecutionSummary, ProcedureResult};
pub use scanner::ScanReport;
pub use tapper::Tapper;
pub use types::{HwAddr, TargetList, TargetSpec};
