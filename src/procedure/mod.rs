//! Procedure execution framework.
//!
//! [`execute`] fans one procedure out to every device of a collection, one
//! task per device, and folds the results back in. A procedure is any
//! function with the shape
//! `(Arc<Tapper>, Box<dyn Device>, mpsc::Sender<ProcedureResult>)` that sends
//! exactly one [`ProcedureResult`]; the built-in ones live in this module.

use crate::device::{Capability, Device, DeviceCollection};
use crate::dispatch::{Dispatch, HttpRequest};
use crate::error::{AggregateError, DriverError, Failure, ProcedureError};
use crate::tapper::Tapper;
use crate::types::HwAddr;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of one procedure on one device. The device travels back with it.
#[derive(Debug)]
pub struct ProcedureResult {
    pub device: Box<dyn Device>,
    pub outcome: Result<(), ProcedureError>,
}

/// Tally of an [`execute`] run.
///
/// `affected + skipped + failures.len()` always equals the number of devices
/// the procedure was applied to.
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    pub affected: usize,
    pub skipped: usize,
    pub failures: AggregateError,
}

impl ExecutionSummary {
    pub fn total(&self) -> usize {
        self.affected + self.skipped + self.failures.len()
    }

    /// The affected count, or the failures if there were any.
    pub fn into_result(self) -> Result<usize, AggregateError> {
        let affected = self.affected;
        self.failures.into_result().map(|()| affected)
    }
}

/// Apply `procedure` to every device in `devices` concurrently.
///
/// Devices are moved into the workers and put back as results arrive. A
/// worker that dies without reporting is accounted as a `WorkerLost` failure
/// and its device is not returned.
pub async fn execute<F, Fut>(
    tapper: &Arc<Tapper>,
    procedure: F,
    devices: &mut DeviceCollection,
) -> ExecutionSummary
where
    F: Fn(Arc<Tapper>, Box<dyn Device>, mpsc::Sender<ProcedureResult>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut summary = ExecutionSummary::default();
    let targets = devices.take_all();
    if targets.is_empty() {
        debug!("no devices, nothing to do");
        return summary;
    }

    let total = targets.len();
    let mut pending: BTreeMap<HwAddr, _> = BTreeMap::new();
    let (tx, mut rx) = mpsc::channel::<ProcedureResult>(total);

    for device in targets {
        pending.insert(device.hw_addr(), device.info());
        tokio::spawn(procedure(Arc::clone(tapper), device, tx.clone()));
    }
    drop(tx);

    for _ in 0..total {
        // None: every remaining worker exited without reporting.
        let Some(ProcedureResult { device, outcome }) = rx.recv().await else {
            break;
        };
        pending.remove(&device.hw_addr());

        match outcome {
            Ok(()) => {
                debug!(id = device.id(), address = %device.address(), "procedure succeeded");
                summary.affected += 1;
            }
            Err(err) if err.is_excluded() => {
                debug!(id = device.id(), "excluded by policy, skipping");
                summary.skipped += 1;
            }
            Err(err) => {
                warn!(id = device.id(), address = %device.address(), error = %err, "procedure failed");
                summary.failures.push(Failure::for_device(device.info(), err));
            }
        }
        devices.insert(device);
    }

    for (_, info) in pending {
        summary
            .failures
            .push(Failure::for_device(info, ProcedureError::WorkerLost));
    }

    info!(
        affected = summary.affected,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        "procedure finished"
    );
    summary
}

/// Fetch user-assigned names when a loaded policy matches on them.
///
/// Does nothing otherwise. Devices whose name could not be fetched are
/// reported and removed from `devices`; devices that cannot be enriched keep
/// the name they were probed with.
pub async fn resolve_names(
    tapper: &Arc<Tapper>,
    devices: &mut DeviceCollection,
) -> AggregateError {
    let mut failures = AggregateError::new();
    if !tapper.needs_device_names() {
        return failures;
    }

    debug!(devices = devices.len(), "policy matches names, enriching first");
    let summary = execute(tapper, enrich, devices).await;
    for failure in summary.failures {
        if matches!(failure.error, ProcedureError::Unsupported(_)) {
            continue;
        }
        if let Some(info) = &failure.device {
            devices.remove(&info.hw_addr);
        }
        failures.push(failure);
    }
    failures
}

/// Apply the driver section of the loaded configuration.
pub async fn configure(
    tapper: Arc<Tapper>,
    device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_configure(&tapper, device.as_ref()).await;
    report(tx, device, outcome).await;
}

/// Enable authentication with the loaded auth config.
pub async fn secure(
    tapper: Arc<Tapper>,
    mut device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_secure(&tapper, &mut device).await;
    report(tx, device, outcome).await;
}

/// Install the loaded deployment's scripts.
pub async fn deploy(
    tapper: Arc<Tapper>,
    device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_deploy(&tapper, device.as_ref()).await;
    report(tx, device, outcome).await;
}

pub async fn reboot(
    tapper: Arc<Tapper>,
    device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_reboot(&tapper, device.as_ref()).await;
    report(tx, device, outcome).await;
}

/// Start a firmware update.
pub async fn update(
    tapper: Arc<Tapper>,
    device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_update(&tapper, device.as_ref()).await;
    report(tx, device, outcome).await;
}

/// Check for firmware updates and record the result on the device.
pub async fn version(
    tapper: Arc<Tapper>,
    mut device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_version(&tapper, &mut device).await;
    report(tx, device, outcome).await;
}

/// Fetch the user-assigned name and other metadata.
pub async fn enrich(
    tapper: Arc<Tapper>,
    mut device: Box<dyn Device>,
    tx: mpsc::Sender<ProcedureResult>,
) {
    let outcome = run_enrich(&tapper, &mut device).await;
    report(tx, device, outcome).await;
}

async fn report(
    tx: mpsc::Sender<ProcedureResult>,
    device: Box<dyn Device>,
    outcome: Result<(), ProcedureError>,
) {
    // Only fails if `execute` is gone, and then nobody is counting.
    let _ = tx.send(ProcedureResult { device, outcome }).await;
}

async fn run_configure(tapper: &Tapper, device: &dyn Device) -> Result<(), ProcedureError> {
    let configurer = device
        .as_configurer()
        .ok_or(ProcedureError::Unsupported(Capability::Configure))?;
    let config = tapper
        .config()
        .ok_or(ProcedureError::MissingInput("configuration"))?;
    let section = config.for_driver(device.driver()).ok_or_else(|| {
        DriverError::InvalidConfig(format!("no {} section", device.driver()))
    })?;

    for request in configurer.configure_requests(section)? {
        send(tapper, device, request).await?;
    }
    Ok(())
}

async fn run_secure(tapper: &Tapper, device: &mut Box<dyn Device>) -> Result<(), ProcedureError> {
    let securer = device
        .as_securer()
        .ok_or(ProcedureError::Unsupported(Capability::Secure))?;
    let auth = tapper
        .auth()
        .ok_or(ProcedureError::MissingInput("credentials"))?;

    let request = securer.secure_request(auth)?;
    send(tapper, device.as_ref(), request).await?;

    // The old secret no longer answers challenges.
    if let Some(securer) = device.as_securer_mut() {
        securer.set_credentials(&auth.credentials);
    }
    Ok(())
}

async fn run_deploy(tapper: &Tapper, device: &dyn Device) -> Result<(), ProcedureError> {
    let deployer = device
        .as_deployer()
        .ok_or(ProcedureError::Unsupported(Capability::Deploy))?;
    let deployment = tapper
        .deployment()
        .ok_or(ProcedureError::MissingInput("deployment"))?;

    for request in deployer.deploy_requests(deployment)? {
        send(tapper, device, request).await?;
    }
    Ok(())
}

async fn run_reboot(tapper: &Tapper, device: &dyn Device) -> Result<(), ProcedureError> {
    let request = device
        .as_rebooter()
        .ok_or(ProcedureError::Unsupported(Capability::Reboot))?
        .reboot_request()?;
    send(tapper, device, request).await
}

async fn run_update(tapper: &Tapper, device: &dyn Device) -> Result<(), ProcedureError> {
    let request = device
        .as_updater()
        .ok_or(ProcedureError::Unsupported(Capability::Update))?
        .update_request()?;
    send(tapper, device, request).await
}

async fn run_version(tapper: &Tapper, device: &mut Box<dyn Device>) -> Result<(), ProcedureError> {
    let request = device
        .as_versioner()
        .ok_or(ProcedureError::Unsupported(Capability::Version))?
        .version_request()?;
    let payload: Value = dispatch(tapper, device.as_ref(), request).bind().await?;

    device
        .as_versioner_mut()
        .ok_or(ProcedureError::Unsupported(Capability::Version))?
        .apply_version(payload)?;
    Ok(())
}

async fn run_enrich(tapper: &Tapper, device: &mut Box<dyn Device>) -> Result<(), ProcedureError> {
    let request = device
        .as_enricher()
        .ok_or(ProcedureError::Unsupported(Capability::Enrich))?
        .enrich_request()?;
    let payload: Value = dispatch(tapper, device.as_ref(), request).bind().await?;

    device
        .as_enricher_mut()
        .ok_or(ProcedureError::Unsupported(Capability::Enrich))?
        .apply_enrichment(payload)?;
    Ok(())
}

async fn send(
    tapper: &Tapper,
    device: &dyn Device,
    request: HttpRequest,
) -> Result<(), ProcedureError> {
    let response = dispatch(tapper, device, request).send().await?;
    device.check_reply(&response)?;
    Ok(())
}

fn dispatch<'a>(tapper: &'a Tapper, device: &'a dyn Device, request: HttpRequest) -> Dispatch<'a> {
    let dispatch = Dispatch::new(tapper.transport(), request)
        .with_optional_challenger(device.as_challenger());
    match tapper.request_timeout() {
        Some(timeout) => dispatch.with_timeout(timeout),
        None => dispatch,
    }
}
