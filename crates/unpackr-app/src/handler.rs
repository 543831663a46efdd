//! Glue between the watcher and the unpack pipeline.

use std::path::Path;

use tracing::info;
use unpackr_config::PathRule;
use unpackr_fsops::UnpackService;
use unpackr_watch::{FileHandler, HandlerError};

/// [`FileHandler`] that runs the unpack pipeline for the changed file's directory.
#[derive(Debug, Clone, Default)]
pub struct UnpackHandler {
    service: UnpackService,
}

impl UnpackHandler {
    /// Wrap `service`.
    #[must_use]
    pub const fn new(service: UnpackService) -> Self {
        Self { service }
    }
}

impl FileHandler for UnpackHandler {
    fn on_file(&self, path: &Path, rule: &PathRule) -> Result<(), HandlerError> {
        match self.service.on_file(path, rule) {
            Ok(report) => {
                info!(
                    list = %report.list_path.display(),
                    archive = %report.archive.display(),
                    verified = report.verified,
                    files = report.extracted.files,
                    removed = report.removed,
                    "unpacked"
                );
                Ok(())
            }
            Err(error) if error.is_transient() => Err(HandlerError::deferred(error)),
            Err(error) => Err(HandlerError::failed(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use unpackr_test_support::fixtures::{temp_dir, write_release};

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn incomplete_sets_are_deferred() -> TestResult<()> {
        let temp = temp_dir("unpackr-app-")?;
        let list = write_release(temp.path(), "set.sfv", &[("set.zip", b"a"), ("set.z01", b"b")])?;
        fs::remove_file(temp.path().join("set.z01"))?;
        let mut rule = PathRule::with_defaults(temp.path());
        rule.archive_ext = "zip".into();

        let result = UnpackHandler::default().on_file(&list, &rule);

        assert!(matches!(result, Err(HandlerError::Deferred { .. })));
        Ok(())
    }

    #[test]
    fn other_failures_are_reported() -> TestResult<()> {
        let temp = temp_dir("unpackr-app-")?;
        let list = write_release(temp.path(), "set.sfv", &[("set.r00", b"b")])?;

        let result = UnpackHandler::default().on_file(&list, &PathRule::with_defaults(temp.path()));

        let source = match result {
            Err(HandlerError::Failed { source }) => source,
            other => anyhow::bail!("expected a failure, got {other:?}"),
        };
        assert!(source.to_string().starts_with("no rar archive listed in"));
        Ok(())
    }
}
