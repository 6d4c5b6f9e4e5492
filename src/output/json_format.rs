//! JSON output formatting.

use crate::device::DeviceInfo;
use crate::procedure::ExecutionSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct DeviceListing<'a> {
    generated_at: DateTime<Utc>,
    count: usize,
    devices: &'a [DeviceInfo],
}

#[derive(Serialize)]
struct SummaryRecord<'a> {
    generated_at: DateTime<Utc>,
    procedure: &'a str,
    affected: usize,
    skipped: usize,
    failures: Vec<String>,
}

/// Print devices in JSON format.
pub fn write_devices<W: Write>(out: &mut W, devices: &[DeviceInfo]) -> io::Result<()> {
    let listing = DeviceListing {
        generated_at: Utc::now(),
        count: devices.len(),
        devices,
    };
    write_pretty(out, &listing)
}

/// Print a procedure summary in JSON format.
pub fn write_summary<W: Write>(
    out: &mut W,
    procedure: &str,
    summary: &ExecutionSummary,
) -> io::Result<()> {
    let record = SummaryRecord {
        generated_at: Utc::now(),
        procedure,
        affected: summary.affected,
        skipped: summary.skipped,
        failures: summary.failures.iter().map(|f| f.to_string()).collect(),
    };
    write_pretty(out, &record)
}

fn write_pretty<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::other)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Capability;
    use crate::error::{AggregateError, Failure, ProcedureError};
    use serde_json::Value;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_device_listing_shape() {
        let device = DeviceInfo {
            driver: "gen1".into(),
            id: "shelly1-a4cf12f45b01".into(),
            name: "porch".into(),
            model: "SHSW-1".into(),
            address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            hw_addr: "A4CF12F45B01".parse().unwrap(),
            firmware: None,
            capabilities: vec![Capability::Configure, Capability::Reboot],
        };
        let mut buf = Vec::new();
        write_devices(&mut buf, &[device]).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["devices"][0]["hw_addr"], "A4:CF:12:F4:5B:01");
        assert_eq!(value["devices"][0]["capabilities"][1], "reboot");
        assert!(value["devices"][0].get("firmware").is_none());
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn test_summary_lists_failures() {
        let mut failures = AggregateError::new();
        failures.push(Failure::for_address(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
            ProcedureError::WorkerLost,
        ));
        let summary = ExecutionSummary {
            affected: 1,
            skipped: 0,
            failures,
        };
        let mut buf = Vec::new();
        write_summary(&mut buf, "update", &summary).unwrap();

        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["procedure"], "update");
        assert_eq!(value["affected"], 1);
        assert_eq!(value["failures"].as_array().unwrap().len(), 1);
    }
}
