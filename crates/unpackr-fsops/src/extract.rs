//! Recursive archive extraction.
//!
//! # Design
//! - Every entry, including entries of nested archives, lands relative to the
//!   same extraction root (the release directory).
//! - Nested archives are queued while the outer archive is decoded and extracted
//!   once it finishes, so sibling volumes of a nested multi-part set exist first.
//! - Nesting is capped at [`MAX_NESTED_ARCHIVES`] levels to stop self-referential inputs.
//! - There is no rollback: files written before a failure stay on disk.

use std::fs::{self, File, FileTimes};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::decoder::{ArchiveEntry, DecoderRegistry};
use crate::error::{FsOpsError, FsOpsResult};
use crate::volume::VolumeMatcher;

/// Deepest level of archives nested inside archives that will be extracted.
pub const MAX_NESTED_ARCHIVES: usize = 8;

/// Totals gathered over one extraction, nested archives included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Regular files written.
    pub files: usize,
    /// Directory entries materialised.
    pub directories: usize,
    /// Nested archives extracted after their parent.
    pub nested_archives: usize,
}

/// Extracts an archive and everything nested inside it into one root.
pub(crate) struct Extractor<'a> {
    decoders: &'a DecoderRegistry,
    volumes: VolumeMatcher,
    extension: &'a str,
    root: &'a Path,
    stats: ExtractStats,
}

impl<'a> Extractor<'a> {
    pub(crate) fn new(
        decoders: &'a DecoderRegistry,
        extension: &'a str,
        root: &'a Path,
    ) -> FsOpsResult<Self> {
        Ok(Self {
            decoders,
            volumes: VolumeMatcher::new(extension)?,
            extension,
            root,
            stats: ExtractStats::default(),
        })
    }

    pub(crate) fn run(mut self, first_volume: &Path) -> FsOpsResult<ExtractStats> {
        self.extract(first_volume, 0)?;
        Ok(self.stats)
    }

    fn extract(&mut self, archive: &Path, depth: usize) -> FsOpsResult<()> {
        if depth > MAX_NESTED_ARCHIVES {
            return Err(FsOpsError::NestingTooDeep {
                path: archive.to_path_buf(),
                limit: MAX_NESTED_ARCHIVES,
            });
        }

        let decoders = self.decoders;
        let decoder = decoders.get(self.extension)?;
        debug!(archive = %archive.display(), depth, "extracting archive");

        let mut nested = Vec::new();
        decoder.for_each_entry(archive, &mut |entry: ArchiveEntry<'_>| {
            if let Some(written) = self.write_entry(entry)? {
                nested.push(written);
            }
            Ok(())
        })?;

        for inner in nested {
            info!(
                archive = %inner.display(),
                parent = %archive.display(),
                "extracting nested archive"
            );
            self.stats.nested_archives += 1;
            self.extract(&inner, depth + 1)?;
        }
        Ok(())
    }

    /// Materialise one entry; returns the written path when it is itself the
    /// first volume of a nested archive.
    fn write_entry(&mut self, entry: ArchiveEntry<'_>) -> FsOpsResult<Option<PathBuf>> {
        let relative = sanitize_archive_path(&entry.name)?;
        if relative.as_os_str().is_empty() {
            return Ok(None);
        }
        let destination = self.root.join(&relative);

        if entry.is_dir {
            fs::create_dir_all(&destination)
                .map_err(|source| FsOpsError::io("extract.create_dir", &destination, source))?;
            apply_modified(&destination, entry.modified)?;
            self.stats.directories += 1;
            return Ok(None);
        }

        if let Some(parent) = destination.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .map_err(|source| FsOpsError::io("extract.create_parent", parent, source))?;
            apply_modified(parent, entry.modified)?;
        }

        let Some(content) = entry.content else {
            return Err(FsOpsError::InvalidInput {
                field: "archive_entry",
                reason: "missing_content",
                value: Some(entry.name.display().to_string()),
            });
        };
        content.write_to(&destination)?;
        apply_modified(&destination, entry.modified)?;
        self.stats.files += 1;

        let is_nested = relative
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.volumes.is_first_volume(name));
        Ok(is_nested.then_some(destination))
    }
}

/// Reject absolute entry names and parent-directory segments.
pub(crate) fn sanitize_archive_path(entry: &Path) -> FsOpsResult<PathBuf> {
    let mut sanitized = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "absolute_path",
                    value: Some(entry.display().to_string()),
                });
            }
            Component::ParentDir => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(entry.display().to_string()),
                });
            }
        }
    }
    Ok(sanitized)
}

fn file_times(modified: SystemTime) -> FileTimes {
    FileTimes::new().set_accessed(modified).set_modified(modified)
}

fn apply_modified(path: &Path, modified: Option<SystemTime>) -> FsOpsResult<()> {
    let Some(modified) = modified else {
        return Ok(());
    };
    if cfg!(not(unix)) && path.is_dir() {
        return Ok(());
    }
    let handle =
        File::open(path).map_err(|source| FsOpsError::io("extract.open_times", path, source))?;
    handle
        .set_times(file_times(modified))
        .map_err(|source| FsOpsError::io("extract.set_times", path, source))
}
