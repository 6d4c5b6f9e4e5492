//! Per-invocation state shared by the subcommands.

use super::{GlobalArgs, OutputFormat};
use crate::config::{AppSettings, AuthConfig};
use crate::dispatch::HttpTransport;
use crate::drivers::DriverRegistry;
use crate::error::{AggregateError, CliError, CliResult};
use crate::output;
use crate::scanner::{self, ScanReport};
use crate::tapper::Tapper;
use crate::types::TargetList;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, StdoutLock, Write};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Resolved targets, settings and credentials for one invocation.
#[derive(Debug)]
pub struct Session {
    pub settings: AppSettings,
    pub format: OutputFormat,
    pub quiet: bool,
    addresses: Vec<IpAddr>,
    credentials: Option<AuthConfig>,
}

impl Session {
    /// Load settings and credentials and resolve the targets.
    pub async fn open(globals: &GlobalArgs) -> CliResult<Self> {
        let mut settings = AppSettings::load(globals.settings.as_deref())?;
        if let Some(ms) = globals.probe_timeout {
            settings.probe_timeout_ms = ms;
        }
        let format = globals.output.unwrap_or(settings.output);

        let credentials = globals
            .credentials
            .as_deref()
            .map(AuthConfig::load)
            .transpose()?;

        let addresses = TargetList::parse(&globals.targets)?.resolve().await?;
        info!(addresses = addresses.len(), "targets resolved");

        Ok(Self {
            settings,
            format,
            quiet: globals.quiet,
            addresses,
            credentials,
        })
    }

    /// Auth config loaded with `--credentials`.
    pub fn credentials(&self) -> Option<&AuthConfig> {
        self.credentials.as_ref()
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// A `Tapper` with the built-in drivers, timeouts and global credentials.
    pub fn tapper(&self) -> CliResult<Tapper> {
        let transport = HttpTransport::new(self.settings.request_timeout())?;
        let mut tapper = Tapper::new(DriverRegistry::builtin(), Arc::new(transport))
            .with_probe_timeout(self.settings.probe_timeout())
            .with_request_timeout(self.settings.request_timeout());

        if let Some(auth) = &self.credentials {
            tapper = tapper.with_credentials(auth.credentials.clone());
        }
        debug!(?tapper, "tapper ready");
        Ok(tapper)
    }

    /// Scan every resolved address.
    pub async fn discover(&self, tapper: &Arc<Tapper>) -> ScanReport {
        let progress = self.progress_bar();
        let report =
            scanner::scan_with_progress(tapper, self.addresses.clone(), progress.as_ref()).await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        if !self.quiet && self.format == OutputFormat::Plain {
            output::print_info(&format!(
                "{} device(s) found on {} address(es)",
                report.devices.len(),
                self.addresses.len()
            ));
        }
        report
    }

    /// Run `f` against a locked stdout.
    pub fn write<F>(&self, f: F) -> CliResult<()>
    where
        F: FnOnce(&mut StdoutLock<'static>) -> io::Result<()>,
    {
        let mut out = io::stdout().lock();
        f(&mut out)?;
        out.flush()?;
        Ok(())
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if self.quiet || self.format != OutputFormat::Plain || !Term::stderr().is_term() {
            return None;
        }

        let pb = ProgressBar::new(self.addresses.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

/// `Ok` when nothing failed, the collected failures otherwise.
pub(crate) fn finish(failures: AggregateError) -> CliResult<()> {
    failures.into_result().map_err(CliError::Failures)
}
