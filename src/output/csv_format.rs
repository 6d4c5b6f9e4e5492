//! CSV output formatting.

use crate::device::DeviceInfo;
use crate::procedure::ExecutionSummary;
use std::io::{self, Write};

/// Print devices in CSV format.
pub fn write_devices<W: Write>(out: &mut W, devices: &[DeviceInfo]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["id", "driver", "name", "model", "address", "hw_addr", "firmware", "capabilities"])?;

    for device in devices {
        let capabilities: Vec<&str> = device.capabilities.iter().map(|c| c.name()).collect();
        wtr.write_record([
            device.id.as_str(),
            device.driver.as_str(),
            device.name.as_str(),
            device.model.as_str(),
            &device.address.to_string(),
            &device.hw_addr.to_string(),
            device.firmware.as_ref().map_or("", |f| f.current.as_str()),
            &capabilities.join(";"),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Print firmware versions in CSV format.
pub fn write_versions<W: Write>(out: &mut W, devices: &[DeviceInfo]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["id", "name", "model", "current", "available", "has_update"])?;

    for device in devices {
        let (current, available, has_update) = match &device.firmware {
            Some(f) => (
                f.current.as_str(),
                f.available.as_deref().unwrap_or(""),
                f.has_update(),
            ),
            None => ("", "", false),
        };
        wtr.write_record([
            device.id.as_str(),
            device.name.as_str(),
            device.model.as_str(),
            current,
            available,
            if has_update { "true" } else { "false" },
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Print a procedure summary as a single CSV row.
pub fn write_summary<W: Write>(
    out: &mut W,
    procedure: &str,
    summary: &ExecutionSummary,
) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["procedure", "affected", "skipped", "failed"])?;
    wtr.write_record([
        procedure,
        &summary.affected.to_string(),
        &summary.skipped.to_string(),
        &summary.failures.len().to_string(),
    ])?;

    wtr.flush()?;
    Ok(())
}
