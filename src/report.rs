//! One line of output per queried path.

use std::io::{self, Write};
use volcap::{CapacityReport, VolumeCapacityProbe};

use crate::{paths, ui};

/// Decimal gigabyte, as storage vendors and Finder count it
pub const BYTES_PER_GB: u64 = 1_000_000_000;

/// Format a report as `<path> I: <n> gb O: <m> gb` (truncating division).
pub fn format_line(path: &str, report: &CapacityReport) -> String {
    format!(
        "{} I: {} gb O: {} gb",
        path,
        report.important_available_bytes() / BYTES_PER_GB,
        report.opportunistic_available_bytes() / BYTES_PER_GB
    )
}

/// Outcome of querying a list of paths
#[derive(Debug, Default)]
pub struct Summary {
    /// Number of paths reported
    pub succeeded: usize,
    /// Paths that failed with error messages
    pub errors: Vec<(String, String)>,
}

impl Summary {
    fn add_success(&mut self) {
        self.succeeded += 1;
    }

    fn add_failure(&mut self, path: &str, error: String) {
        self.errors.push((path.to_string(), error));
    }

    /// Number of paths that failed
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Check if every path was reported
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total paths processed
    pub fn total(&self) -> usize {
        self.succeeded + self.failed()
    }
}

/// Query each path in order and write one line per report to `out`.
///
/// A failing path is reported on stderr and does not stop the remaining
/// paths. Only a failure to write `out` aborts early.
pub fn show_all<W: Write>(
    probe: &VolumeCapacityProbe,
    targets: &[String],
    out: &mut W,
) -> io::Result<Summary> {
    let mut summary = Summary::default();

    for target in targets {
        let path = paths::expand_tilde(target);
        match probe.query(&path) {
            Ok(report) => {
                if report.is_degraded() {
                    log::info!(
                        "{target}: {} reports no purgeable tier, I and O are equal",
                        probe.backend_name()
                    );
                }
                writeln!(out, "{}", format_line(target, &report))?;
                summary.add_success();
            }
            Err(e) => {
                log::debug!("{target}: {e:?}");
                ui::error(&format!("{target}: {e}"));
                summary.add_failure(target, e.to_string());
            }
        }
    }

    Ok(summary)
}
