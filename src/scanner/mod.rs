//! Probe engine - discovers devices on candidate addresses.
//!
//! Every address gets its own task. A task tries each registered prober in
//! order until one recognises a device; results are funnelled through one
//! channel sized to the address count and collected into a [`ScanReport`].
//!
//! Silence is not an error: a closed port, a foreign web server or a JSON
//! payload no driver recognises all mean "no device here".

use crate::device::{Device, DeviceCollection, Prober};
use crate::dispatch::Dispatch;
use crate::error::{AggregateError, DispatchResult, Failure, ProcedureError};
use crate::tapper::Tapper;
use indicatif::ProgressBar;
use reqwest::{Method, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// What probing one address produced.
#[derive(Debug)]
pub enum ProbeOutcome {
    Found(Box<dyn Device>),
    /// Nothing recognisable answered.
    Absent,
    /// Something answered and went wrong in a way worth reporting.
    Failed(ProcedureError),
}

/// Result sent back by one probe task.
#[derive(Debug)]
pub struct ProbeResult {
    pub address: IpAddr,
    pub outcome: ProbeOutcome,
}

/// Devices found by a scan plus the addresses that failed.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub devices: DeviceCollection,
    pub failures: AggregateError,
}

/// Sort one prober's result into found, absent or failed.
///
/// Transport errors, undecodable bodies and identity mismatches are absence;
/// everything else is a failure.
pub fn classify_probe(result: Result<Box<dyn Device>, ProcedureError>) -> ProbeOutcome {
    match result {
        Ok(device) => ProbeOutcome::Found(device),
        Err(err) if err.is_absence() => ProbeOutcome::Absent,
        Err(err) => ProbeOutcome::Failed(err),
    }
}

/// Probe every address concurrently.
pub async fn scan(tapper: &Arc<Tapper>, addresses: Vec<IpAddr>) -> ScanReport {
    scan_with_progress(tapper, addresses, None).await
}

/// Same as [`scan`], advancing `progress` once per address.
pub async fn scan_with_progress(
    tapper: &Arc<Tapper>,
    addresses: Vec<IpAddr>,
    progress: Option<&ProgressBar>,
) -> ScanReport {
    let mut report = ScanReport::default();
    if addresses.is_empty() {
        return report;
    }

    let total = addresses.len();
    let mut pending: HashMap<IpAddr, usize> = HashMap::new();
    let (tx, mut rx) = mpsc::channel::<ProbeResult>(total);

    for address in addresses {
        *pending.entry(address).or_default() += 1;

        let tapper = Arc::clone(tapper);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = probe_address(&tapper, address).await;
            // The receiver outlives every sender, so this only fails after a
            // panic on the collecting side.
            let _ = tx.send(ProbeResult { address, outcome }).await;
        });
    }
    drop(tx);

    for _ in 0..total {
        // None: every remaining sender was dropped without reporting.
        let Some(result) = rx.recv().await else {
            break;
        };
        if let Some(count) = pending.get_mut(&result.address) {
            *count -= 1;
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }

        match result.outcome {
            ProbeOutcome::Found(device) => {
                info!(
                    address = %result.address,
                    driver = device.driver(),
                    id = device.id(),
                    "found device"
                );
                if let Some(pb) = progress {
                    pb.set_message(format!("found {}", device.id()));
                }
                report.devices.insert(device);
            }
            ProbeOutcome::Absent => trace!(address = %result.address, "no device"),
            ProbeOutcome::Failed(err) => {
                warn!(address = %result.address, error = %err, "probe failed");
                report
                    .failures
                    .push(Failure::for_address(result.address, err));
            }
        }
    }

    for (address, count) in pending {
        for _ in 0..count {
            report
                .failures
                .push(Failure::for_address(address, ProcedureError::WorkerLost));
        }
    }

    debug!(
        addresses = total,
        devices = report.devices.len(),
        failures = report.failures.len(),
        "scan complete"
    );
    report
}

/// A probe reply already fetched for one address. `payload` is `None` when
/// the request found nothing.
struct ProbeReply {
    method: Method,
    url: Url,
    payload: Option<Value>,
}

async fn probe_address(tapper: &Tapper, address: IpAddr) -> ProbeOutcome {
    // Probers asking for the same request share one reply.
    let mut replies: Vec<ProbeReply> = Vec::new();

    for prober in tapper.registry().probers() {
        match probe_with(tapper, prober.as_ref(), address, &mut replies).await {
            ProbeOutcome::Absent => {
                trace!(address = %address, driver = prober.driver(), "prober did not match");
            }
            ProbeOutcome::Found(mut device) => {
                if let (Some(credentials), Some(securer)) =
                    (tapper.credentials(), device.as_securer_mut())
                {
                    securer.set_credentials(credentials);
                }
                return ProbeOutcome::Found(device);
            }
            failed => return failed,
        }
    }
    ProbeOutcome::Absent
}

async fn probe_with(
    tapper: &Tapper,
    prober: &dyn Prober,
    address: IpAddr,
    replies: &mut Vec<ProbeReply>,
) -> ProbeOutcome {
    let request = match prober.probe_request(address) {
        Ok(request) => request,
        Err(e) => return classify_probe(Err(e.into())),
    };

    let cached = replies
        .iter()
        .find(|reply| reply.method == request.method && reply.url == request.url)
        .map(|reply| reply.payload.clone());

    let payload = match cached {
        Some(Some(payload)) => payload,
        Some(None) => return ProbeOutcome::Absent,
        None => {
            let (method, url) = (request.method.clone(), request.url.clone());
            let fetched: DispatchResult<Value> = Dispatch::new(tapper.transport(), request)
                .with_timeout(tapper.probe_timeout())
                .bind()
                .await;
            replies.push(ProbeReply {
                method,
                url,
                payload: fetched.as_ref().ok().cloned(),
            });
            match fetched {
                Ok(payload) => payload,
                Err(e) => return classify_probe(Err(e.into())),
            }
        }
    };

    classify_probe(
        prober
            .identify(address, payload)
            .map_err(ProcedureError::from),
    )
}
