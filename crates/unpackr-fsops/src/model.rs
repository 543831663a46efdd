//! Domain models for the unpack pipeline.
//!
//! # Design
//! - Requests are plain owned values so they cross `spawn_blocking` boundaries.
//! - Reports record every step with its status so callers can log or print them.

use std::path::{Path, PathBuf};

use unpackr_config::PathRule;

use crate::extract::ExtractStats;

/// Inputs for one pipeline run over a release directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackRequest {
    /// Directory holding the checksum list and the archive volumes.
    pub directory: PathBuf,
    /// Extension of the archive volumes, without a leading dot.
    pub archive_ext: String,
    /// Delete the listed files and the checksum list after extraction.
    pub remove: bool,
    /// Post-process command template; empty disables the stage.
    pub post_command: String,
}

impl UnpackRequest {
    /// Build a request for `directory` from the rule governing it.
    #[must_use]
    pub fn from_rule(directory: &Path, rule: &PathRule) -> Self {
        Self {
            directory: directory.to_path_buf(),
            archive_ext: rule.archive_ext.clone(),
            remove: rule.remove,
            post_command: rule.post_command.clone(),
        }
    }
}

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Locate the checksum list and the first archive volume.
    Discover,
    /// Confirm every listed file is present.
    CheckComplete,
    /// Verify the CRC32 of every listed file.
    Verify,
    /// Extract the archive and any nested archives.
    Extract,
    /// Remove the listed files and the checksum list.
    Cleanup,
    /// Run the post-process command.
    PostProcess,
}

impl StepKind {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::CheckComplete => "check_complete",
            Self::Verify => "verify",
            Self::Extract => "extract",
            Self::Cleanup => "cleanup",
            Self::PostProcess => "post_process",
        }
    }
}

/// Final status of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The step ran to completion.
    Completed,
    /// The step was disabled for this run.
    Skipped,
}

impl StepStatus {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// One finished step and its human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Step that finished.
    pub step: StepKind,
    /// How it finished.
    pub status: StepStatus,
    /// Summary of what happened.
    pub detail: Option<String>,
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Checksum list that drove the run.
    pub list_path: PathBuf,
    /// First archive volume that was extracted.
    pub archive: PathBuf,
    /// Files whose checksum was verified.
    pub verified: usize,
    /// Extraction totals.
    pub extracted: ExtractStats,
    /// Files deleted during cleanup, checksum list included.
    pub removed: usize,
    /// Steps in execution order.
    pub steps: Vec<StepRecord>,
}

impl UnpackReport {
    /// Status recorded for `step`, if it ran.
    #[must_use]
    pub fn status_of(&self, step: StepKind) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| record.status)
    }
}
