//! First-volume selection for multi-part archives.
//!
//! # Design
//! - A volume is "first" when it carries the archive extension and is either
//!   unnumbered (`name.rar`) or numbered part one (`name.part1.rar`, `name.part001.rar`).
//! - Selection is strict: zero or several candidates fail before anything is written.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::checksum::ChecksumSet;
use crate::error::{FsOpsError, FsOpsResult};

/// The first volume of the archive described by a checksum set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    path: PathBuf,
}

impl ArchiveHandle {
    /// Pick the unique first volume with `extension` among the set's entries.
    ///
    /// # Errors
    ///
    /// Returns an error when no entry or more than one entry qualifies.
    pub fn select(set: &ChecksumSet, extension: &str) -> FsOpsResult<Self> {
        let matcher = VolumeMatcher::new(extension)?;
        let mut candidates: Vec<PathBuf> = set
            .entries()
            .iter()
            .filter(|entry| matcher.is_first_volume(entry.filename()))
            .map(|entry| entry.path().to_path_buf())
            .collect();

        match candidates.len() {
            0 => Err(FsOpsError::MissingArchive {
                list: set.list_path().to_path_buf(),
                extension: extension.to_string(),
            }),
            1 => Ok(Self {
                path: candidates.remove(0),
            }),
            _ => Err(FsOpsError::AmbiguousArchive {
                list: set.list_path().to_path_buf(),
                candidates,
            }),
        }
    }

    /// Path of the first volume.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Recognises archive volumes for one extension.
#[derive(Debug, Clone)]
pub(crate) struct VolumeMatcher {
    extension: String,
    part: Regex,
}

impl VolumeMatcher {
    pub(crate) fn new(extension: &str) -> FsOpsResult<Self> {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        if extension.is_empty() {
            return Err(FsOpsError::InvalidInput {
                field: "archive_ext",
                reason: "empty",
                value: None,
            });
        }
        let pattern = format!(r"(?i)\.part0*(\d+)\.{}$", regex::escape(&extension));
        let part = Regex::new(&pattern).map_err(|_| FsOpsError::InvalidInput {
            field: "archive_ext",
            reason: "invalid_pattern",
            value: Some(extension.clone()),
        })?;
        Ok(Self { extension, part })
    }

    pub(crate) fn has_extension(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    pub(crate) fn is_first_volume(&self, name: &str) -> bool {
        if !self.has_extension(name) {
            return false;
        }
        self.part
            .captures(name)
            .and_then(|captures| captures.get(1))
            .is_none_or(|number| number.as_str() == "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use unpackr_test_support::fixtures::{temp_dir, write_release};

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn first_volume_accepts_plain_and_part_one() -> TestResult<()> {
        let matcher = VolumeMatcher::new("rar")?;
        assert!(matcher.is_first_volume("release.rar"));
        assert!(matcher.is_first_volume("release.part1.rar"));
        assert!(matcher.is_first_volume("release.part01.RAR"));
        assert!(matcher.is_first_volume("release.part001.rar"));
        assert!(!matcher.is_first_volume("release.part02.rar"));
        assert!(!matcher.is_first_volume("release.part10.rar"));
        assert!(!matcher.is_first_volume("release.r00"));
        assert!(!matcher.is_first_volume("release.sfv"));
        Ok(())
    }

    #[test]
    fn matcher_normalises_extension() -> TestResult<()> {
        let matcher = VolumeMatcher::new(".ZIP")?;
        assert!(matcher.has_extension("inner.zip"));
        assert!(matcher.is_first_volume("inner.zip"));
        assert!(VolumeMatcher::new("").is_err());
        Ok(())
    }

    #[test]
    fn select_picks_unique_first_volume() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        write_release(
            temp.path(),
            "set.sfv",
            &[
                ("set.part1.rar", b"1"),
                ("set.part2.rar", b"2"),
                ("set.part3.rar", b"3"),
            ],
        )?;
        let set = ChecksumSet::find(temp.path())?;
        let handle = ArchiveHandle::select(&set, "rar")?;
        assert_eq!(handle.path(), temp.path().join("set.part1.rar"));
        Ok(())
    }

    #[test]
    fn select_fails_without_or_with_several_candidates() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        write_release(temp.path(), "set.sfv", &[("set.r00", b"0"), ("set.r01", b"1")])?;
        let set = ChecksumSet::find(temp.path())?;
        assert!(matches!(
            ArchiveHandle::select(&set, "rar"),
            Err(FsOpsError::MissingArchive { .. })
        ));

        fs::remove_file(temp.path().join("set.sfv"))?;
        write_release(temp.path(), "set.sfv", &[("a.rar", b"a"), ("b.rar", b"b")])?;
        let set = ChecksumSet::find(temp.path())?;
        assert!(matches!(
            ArchiveHandle::select(&set, "rar"),
            Err(FsOpsError::AmbiguousArchive { ref candidates, .. }) if candidates.len() == 2
        ));
        Ok(())
    }
}
