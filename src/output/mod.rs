//! Output formatting module.
//!
//! Provides formatters for plain text, JSON, and CSV output of device
//! listings, firmware versions and procedure summaries. Formatters write to
//! any `io::Write`; the CLI hands them a locked stdout.

mod csv_format;
mod json_format;
mod plain;

pub use plain::{print_error, print_failures, print_info, print_success, print_warning};

use crate::cli::OutputFormat;
use crate::device::DeviceInfo;
use crate::procedure::ExecutionSummary;
use std::io::{self, Write};

/// What a device listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Identity of every device.
    Devices,
    /// Installed and available firmware.
    Versions,
}

/// Write a device listing in the requested format.
pub fn write_devices<W: Write>(
    out: &mut W,
    devices: &[DeviceInfo],
    listing: Listing,
    format: OutputFormat,
) -> io::Result<()> {
    match (format, listing) {
        (OutputFormat::Plain, Listing::Devices) => plain::write_devices(out, devices),
        (OutputFormat::Plain, Listing::Versions) => plain::write_versions(out, devices),
        (OutputFormat::Json, _) => json_format::write_devices(out, devices),
        (OutputFormat::Csv, Listing::Devices) => csv_format::write_devices(out, devices),
        (OutputFormat::Csv, Listing::Versions) => csv_format::write_versions(out, devices),
    }
}

/// Write the outcome of a procedure run.
pub fn write_summary<W: Write>(
    out: &mut W,
    procedure: &str,
    summary: &ExecutionSummary,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => plain::write_summary(out, procedure, summary),
        OutputFormat::Json => json_format::write_summary(out, procedure, summary),
        OutputFormat::Csv => csv_format::write_summary(out, procedure, summary),
    }
}
