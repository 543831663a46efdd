//! Full rescans of every configured tree.
//!
//! # Design
//! - Every regular file goes through the same dispatch as a live event.
//! - A walk error ends that root's scan; the remaining roots still run.

use std::path::PathBuf;

use tracing::{info, warn};
use unpackr_config::WatchConfig;
use walkdir::WalkDir;

use crate::handler::{DispatchOutcome, FileHandler, dispatch};

/// Totals from one rescan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanReport {
    /// Files the handler accepted.
    pub handled: usize,
    /// Files without a rule, rejected by a gate, or deferred.
    pub skipped: usize,
    /// Files whose handling or rule evaluation failed.
    pub failed: usize,
    /// Roots whose walk stopped on an error.
    pub failed_roots: Vec<PathBuf>,
}

/// Walk every rule root and dispatch each regular file.
pub fn rescan<H: FileHandler + ?Sized>(config: &WatchConfig, handler: &H) -> RescanReport {
    let mut report = RescanReport::default();
    for rule in config.paths() {
        info!(root = %rule.name.display(), "rescanning");
        for entry in WalkDir::new(&rule.name).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(root = %rule.name.display(), error = %error, "rescanning failed");
                    report.failed_roots.push(rule.name.clone());
                    break;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let outcome = dispatch(config, handler, entry.path());
            outcome.log(entry.path());
            match outcome {
                DispatchOutcome::Handled => report.handled += 1,
                DispatchOutcome::NoRule
                | DispatchOutcome::Rejected(_)
                | DispatchOutcome::Deferred(_) => report.skipped += 1,
                DispatchOutcome::Failed(_) => report.failed += 1,
            }
        }
    }
    report
}
