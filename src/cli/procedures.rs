//! Subcommands that change devices.

use super::session::{finish, Session};
use super::OutputFormat;
use crate::config::{AuthConfig, Config, Deployment};
use crate::device::Device;
use crate::error::{CliError, CliResult};
use crate::output;
use crate::procedure::{self, ProcedureResult};
use crate::scanner::ScanReport;
use crate::tapper::Tapper;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Apply a driver configuration file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Configuration file keyed by driver name
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl ConfigCommand {
    pub async fn execute(&self, session: &Session) -> CliResult<()> {
        let config = Config::load(&self.file)?;
        let tapper = session.tapper()?.with_config(config);
        run(session, tapper, "config", procedure::configure).await
    }
}

/// Enable authentication with new credentials.
#[derive(Parser, Debug)]
pub struct SecureCommand {
    /// Credentials to apply (defaults to the --credentials file)
    #[arg(value_name = "AUTH_FILE")]
    pub auth_file: Option<PathBuf>,
}

impl SecureCommand {
    pub async fn execute(&self, session: &Session) -> CliResult<()> {
        let auth = match &self.auth_file {
            Some(path) => AuthConfig::load(path)?,
            None => session.credentials().cloned().ok_or_else(|| {
                CliError::Other("secure needs an AUTH_FILE or --credentials".to_string())
            })?,
        };
        let tapper = session.tapper()?.with_auth(auth);
        run(session, tapper, "secure", procedure::secure).await
    }
}

/// Install scripts on every device.
#[derive(Parser, Debug)]
pub struct DeployCommand {
    /// Deployment file listing the scripts
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl DeployCommand {
    pub async fn execute(&self, session: &Session) -> CliResult<()> {
        let deployment = Deployment::load(&self.file)?;
        let tapper = session.tapper()?.with_deployment(deployment);
        run(session, tapper, "deploy", procedure::deploy).await
    }
}

/// Scan, run `operation` over the devices found and report.
pub(super) async fn run<F, Fut>(
    session: &Session,
    tapper: Tapper,
    name: &str,
    operation: F,
) -> CliResult<()>
where
    F: Fn(Arc<Tapper>, Box<dyn Device>, mpsc::Sender<ProcedureResult>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let tapper = Arc::new(tapper);
    let ScanReport {
        mut devices,
        mut failures,
    } = session.discover(&tapper).await;

    if devices.is_empty() {
        if !session.quiet && session.format == OutputFormat::Plain {
            output::print_warning(&format!("no devices found, nothing to {}", name));
        }
        return finish(failures);
    }

    failures.extend(procedure::resolve_names(&tapper, &mut devices).await);
    let summary = procedure::execute(&tapper, operation, &mut devices).await;
    session.write(|out| output::write_summary(out, name, &summary, session.format))?;

    failures.extend(summary.failures);
    finish(failures)
}
