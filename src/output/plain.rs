//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::device::DeviceInfo;
use crate::error::AggregateError;
use crate::procedure::ExecutionSummary;
use console::style;
use std::io::{self, Write};

const RULE: &str = "───────────────────────────────────────────────────────────────────────────";

/// Print the device table.
pub fn write_devices<W: Write>(out: &mut W, devices: &[DeviceInfo]) -> io::Result<()> {
    if devices.is_empty() {
        writeln!(out, "  {}", style("No devices found.").dim())?;
        return Ok(());
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(
        out,
        "  {}",
        style(format!(
            "{:<28}  {:<6}  {:<15}  {:<39}  {:<17}  {}",
            "NAME", "DRIVER", "MODEL", "ADDRESS", "HWADDR", "FIRMWARE"
        ))
        .bold()
    )?;
    writeln!(out, "  {}", style(RULE).dim())?;

    for device in devices {
        let firmware = device
            .firmware
            .as_ref()
            .map(|f| f.current.as_str())
            .unwrap_or("-");
        writeln!(
            out,
            "  {:<28}  {:<6}  {:<15}  {:<39}  {:<17}  {}",
            truncate_string(&device.name, 28),
            device.driver,
            truncate_string(&device.model, 15),
            device.address,
            device.hw_addr,
            style(truncate_string(firmware, 32)).dim()
        )?;
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(out, "  {} device(s)", style(devices.len()).green().bold())?;
    Ok(())
}

/// Print installed and available firmware per device.
pub fn write_versions<W: Write>(out: &mut W, devices: &[DeviceInfo]) -> io::Result<()> {
    if devices.is_empty() {
        writeln!(out, "  {}", style("No devices found.").dim())?;
        return Ok(());
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(
        out,
        "  {}",
        style(format!(
            "{:<28}  {:<15}  {:<24}  {}",
            "NAME", "MODEL", "CURRENT", "AVAILABLE"
        ))
        .bold()
    )?;
    writeln!(out, "  {}", style(RULE).dim())?;

    let mut outdated = 0;
    for device in devices {
        let (current, available) = match &device.firmware {
            Some(firmware) if firmware.has_update() => {
                outdated += 1;
                (
                    firmware.current.as_str(),
                    style(firmware.available.as_deref().unwrap_or_default()).yellow().bold(),
                )
            }
            Some(firmware) => (firmware.current.as_str(), style("up to date").green()),
            None => ("-", style("unknown").dim()),
        };
        writeln!(
            out,
            "  {:<28}  {:<15}  {:<24}  {}",
            truncate_string(&device.name, 28),
            truncate_string(&device.model, 15),
            truncate_string(current, 24),
            available
        )?;
    }

    writeln!(out, "  {}", style(RULE).dim())?;
    writeln!(
        out,
        "  {} device(s), {} with updates available",
        devices.len(),
        style(outdated).yellow().bold()
    )?;
    Ok(())
}

/// Print procedure counts.
pub fn write_summary<W: Write>(
    out: &mut W,
    procedure: &str,
    summary: &ExecutionSummary,
) -> io::Result<()> {
    let marker = if summary.failures.is_empty() {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    writeln!(
        out,
        "{} {}: {} affected, {} skipped, {} failed",
        marker,
        style(procedure).bold(),
        style(summary.affected).green(),
        style(summary.skipped).dim(),
        style(summary.failures.len()).red()
    )
}

/// Print one error line per failure.
pub fn print_failures(failures: &AggregateError) {
    for failure in failures.iter() {
        print_error(&failure.to_string());
    }
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    eprintln!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum length in chars, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Capability, FirmwareStatus};
    use std::net::{IpAddr, Ipv4Addr};

    fn info(name: &str, firmware: Option<FirmwareStatus>) -> DeviceInfo {
        DeviceInfo {
            driver: "gen2".into(),
            id: format!("{}-id", name),
            name: name.into(),
            model: "SNSW-001X16EU".into(),
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            hw_addr: "A8:03:2A:B1:23:45".parse().unwrap(),
            firmware,
            capabilities: vec![Capability::Reboot],
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[test]
    fn test_device_table() {
        let text = render(|out| write_devices(out, &[info("kitchen", Some(FirmwareStatus::new("1.0.8")))]));
        assert!(text.contains("kitchen"));
        assert!(text.contains("A8:03:2A:B1:23:45"));
        assert!(text.contains("1.0.8"));
        assert!(text.contains("1 device(s)"));
    }

    #[test]
    fn test_empty_table() {
        let text = render(|out| write_devices(out, &[]));
        assert!(text.contains("No devices found."));
    }

    #[test]
    fn test_version_table() {
        let mut firmware = FirmwareStatus::new("1.0.8");
        firmware.available = Some("1.1.0".into());
        let text = render(|out| {
            write_versions(
                out,
                &[info("a", Some(firmware)), info("b", Some(FirmwareStatus::new("1.1.0"))), info("c", None)],
            )
        });
        assert!(text.contains("1.1.0"));
        assert!(text.contains("up to date"));
        assert!(text.contains("unknown"));
        assert!(text.contains("3 device(s), 1 with updates available"));
    }

    #[test]
    fn test_summary_line() {
        let summary = ExecutionSummary {
            affected: 2,
            skipped: 1,
            failures: AggregateError::new(),
        };
        let text = render(|out| write_summary(out, "reboot", &summary));
        assert!(text.contains("reboot: 2 affected, 1 skipped, 0 failed"));
    }
}
