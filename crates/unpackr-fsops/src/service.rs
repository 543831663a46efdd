//! Unpack pipeline orchestration.
//!
//! # Design
//! - Stages run in a fixed order and each one gates the next; completeness and
//!   verification always finish before the first byte is extracted.
//! - Every step is traced with `step` and `status` fields.
//! - Failures leave earlier side effects in place; there is no rollback.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use unpackr_config::PathRule;

use crate::checksum::ChecksumSet;
use crate::command::{CommandContext, run_post_command};
use crate::decoder::DecoderRegistry;
use crate::error::{FsOpsError, FsOpsResult};
use crate::extract::Extractor;
use crate::model::{StepKind, StepRecord, StepStatus, UnpackReport, UnpackRequest};
use crate::volume::ArchiveHandle;

enum StepOutcome {
    Completed(Option<String>),
    Skipped(Option<String>),
}

impl StepOutcome {
    const fn status(&self) -> StepStatus {
        match self {
            Self::Completed(_) => StepStatus::Completed,
            Self::Skipped(_) => StepStatus::Skipped,
        }
    }

    fn into_detail(self) -> Option<String> {
        match self {
            Self::Completed(detail) | Self::Skipped(detail) => detail,
        }
    }
}

/// Verifies and extracts release directories.
#[derive(Debug, Clone)]
pub struct UnpackService {
    decoders: Arc<DecoderRegistry>,
}

impl UnpackService {
    /// Construct a service backed by `decoders`.
    #[must_use]
    pub fn new(decoders: DecoderRegistry) -> Self {
        Self {
            decoders: Arc::new(decoders),
        }
    }

    /// Decoders available to this service.
    #[must_use]
    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Run the pipeline for the directory containing `path` under `rule`.
    ///
    /// # Errors
    ///
    /// Returns an error when `path` has no parent or any pipeline stage fails.
    pub fn on_file(&self, path: &Path, rule: &PathRule) -> FsOpsResult<UnpackReport> {
        let directory = path.parent().ok_or_else(|| FsOpsError::InvalidInput {
            field: "path",
            reason: "no_parent",
            value: Some(path.display().to_string()),
        })?;
        self.run(&UnpackRequest::from_rule(directory, rule))
    }

    /// Run every pipeline stage for `request.directory`.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure. [`FsOpsError::Incomplete`] is transient
    /// and means the release is still arriving.
    pub fn run(&self, request: &UnpackRequest) -> FsOpsResult<UnpackReport> {
        let directory = request.directory.as_path();
        let mut report = UnpackReport::default();

        let (set, archive) = execute_step(&mut report, directory, StepKind::Discover, || {
            let set = ChecksumSet::find(directory)?;
            let archive = ArchiveHandle::select(&set, &request.archive_ext)?;
            self.decoders.get(&request.archive_ext)?;
            let detail = format!(
                "{} lists {} files; first volume {}",
                set.list_path().display(),
                set.entries().len(),
                archive.path().display()
            );
            Ok(((set, archive), StepOutcome::Completed(Some(detail))))
        })?;
        report.list_path = set.list_path().to_path_buf();
        report.archive = archive.path().to_path_buf();

        execute_step(&mut report, directory, StepKind::CheckComplete, || {
            set.ensure_complete()?;
            Ok(((), StepOutcome::Completed(None)))
        })?;

        report.verified = execute_step(&mut report, directory, StepKind::Verify, || {
            let verified = set.verify_all()?;
            Ok((
                verified,
                StepOutcome::Completed(Some(format!("{verified} files verified"))),
            ))
        })?;

        report.extracted = execute_step(&mut report, directory, StepKind::Extract, || {
            let stats = Extractor::new(&self.decoders, &request.archive_ext, directory)?
                .run(archive.path())?;
            let detail = format!(
                "{} files, {} directories, {} nested archives",
                stats.files, stats.directories, stats.nested_archives
            );
            Ok((stats, StepOutcome::Completed(Some(detail))))
        })?;

        report.removed = execute_step(&mut report, directory, StepKind::Cleanup, || {
            if !request.remove {
                return Ok((0, StepOutcome::Skipped(Some("remove disabled".into()))));
            }
            let removed = remove_release(&set)?;
            Ok((
                removed,
                StepOutcome::Completed(Some(format!("{removed} files removed"))),
            ))
        })?;

        execute_step(&mut report, directory, StepKind::PostProcess, || {
            if request.post_command.trim().is_empty() {
                return Ok(((), StepOutcome::Skipped(Some("no post command".into()))));
            }
            let base = directory
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let context = CommandContext {
                name: archive.path(),
                base: &base,
                dir: directory,
            };
            let output = run_post_command(&request.post_command, &context)?;
            Ok((
                (),
                StepOutcome::Completed(Some(format!("ran {}", output.argv.join(" ")))),
            ))
        })?;

        info!(
            directory = %directory.display(),
            archive = %report.archive.display(),
            files = report.extracted.files,
            "release unpacked"
        );
        Ok(report)
    }
}

impl Default for UnpackService {
    fn default() -> Self {
        Self::new(DecoderRegistry::with_defaults())
    }
}

fn execute_step<T, F>(
    report: &mut UnpackReport,
    directory: &Path,
    step: StepKind,
    op: F,
) -> FsOpsResult<T>
where
    F: FnOnce() -> FsOpsResult<(T, StepOutcome)>,
{
    debug!(directory = %directory.display(), step = step.as_str(), status = "started", "unpack step");
    match op() {
        Ok((value, outcome)) => {
            let status = outcome.status();
            let detail = outcome.into_detail();
            debug!(
                directory = %directory.display(),
                step = step.as_str(),
                status = status.as_str(),
                detail = detail.as_deref().unwrap_or_default(),
                "unpack step"
            );
            report.steps.push(StepRecord {
                step,
                status,
                detail,
            });
            Ok(value)
        }
        Err(error) => {
            debug!(
                directory = %directory.display(),
                step = step.as_str(),
                status = "failed",
                error = %error,
                "unpack step"
            );
            Err(error)
        }
    }
}

fn remove_release(set: &ChecksumSet) -> FsOpsResult<usize> {
    let mut removed = 0;
    for entry in set.entries() {
        fs::remove_file(entry.path())
            .map_err(|source| FsOpsError::io("cleanup.remove_file", entry.path(), source))?;
        removed += 1;
    }
    fs::remove_file(set.list_path())
        .map_err(|source| FsOpsError::io("cleanup.remove_list", set.list_path(), source))?;
    Ok(removed + 1)
}
