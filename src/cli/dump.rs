//! Listing subcommands: `tapper dump` and `tapper version`.

use super::session::{finish, Session};
use crate::error::CliResult;
use crate::output::{self, Listing};
use crate::procedure;
use crate::scanner::ScanReport;
use clap::Parser;
use std::sync::Arc;

/// Scan the targets and list every device found.
#[derive(Parser, Debug)]
pub struct DumpCommand {
    /// Skip fetching device names after the scan
    #[arg(long)]
    pub no_enrich: bool,
}

impl DumpCommand {
    pub async fn execute(&self, session: &Session) -> CliResult<()> {
        let tapper = Arc::new(session.tapper()?);
        let ScanReport {
            mut devices,
            mut failures,
        } = session.discover(&tapper).await;

        if !self.no_enrich {
            let summary = procedure::execute(&tapper, procedure::enrich, &mut devices).await;
            failures.extend(summary.failures);
        }

        let infos = devices.infos();
        session.write(|out| output::write_devices(out, &infos, Listing::Devices, session.format))?;
        finish(failures)
    }
}

/// Scan, check firmware and print the version table.
pub(super) async fn versions(session: &Session) -> CliResult<()> {
    let tapper = Arc::new(session.tapper()?);
    let ScanReport {
        mut devices,
        mut failures,
    } = session.discover(&tapper).await;

    let summary = procedure::execute(&tapper, procedure::version, &mut devices).await;
    failures.extend(summary.failures);

    let infos = devices.infos();
    session.write(|out| output::write_devices(out, &infos, Listing::Versions, session.format))?;
    finish(failures)
}
