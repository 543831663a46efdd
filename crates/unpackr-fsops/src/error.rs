//! # Design
//!
//! - Provide structured errors for every stage of the unpack pipeline.
//! - Capture operation context (paths, counts, checksums) so failures are reproducible in tests.
//! - Classify "still downloading" failures as transient so the watcher can log them quietly.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for unpack operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the unpack pipeline.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure during {operation} at {}", path.display())]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Zip archive failures.
    #[error("fsops zip failure during {operation} at {}", path.display())]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Path involved in the archive failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// RAR archive failures.
    #[cfg(feature = "rar")]
    #[error("fsops rar failure during {operation} at {}", path.display())]
    Rar {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Path involved in the archive failure.
        path: PathBuf,
        /// Underlying unrar error.
        source: unrar::error::UnrarError,
    },
    /// The directory holds no checksum list.
    #[error("no checksum list found in {}", directory.display())]
    MissingChecksumList {
        /// Directory that was searched.
        directory: PathBuf,
    },
    /// The directory holds more than one checksum list.
    #[error("{} checksum lists found in {}", candidates.len(), directory.display())]
    AmbiguousChecksumList {
        /// Directory that was searched.
        directory: PathBuf,
        /// Every candidate list, sorted.
        candidates: Vec<PathBuf>,
    },
    /// A checksum list line could not be parsed.
    #[error("malformed checksum line {line} in {}", path.display())]
    MalformedChecksumLine {
        /// Checksum list being parsed.
        path: PathBuf,
        /// One-based line number.
        line: usize,
    },
    /// No listed file qualifies as the first archive volume.
    #[error("no {extension} archive listed in {}", list.display())]
    MissingArchive {
        /// Checksum list that was searched.
        list: PathBuf,
        /// Archive extension that was expected.
        extension: String,
    },
    /// More than one listed file qualifies as the first archive volume.
    #[error("{} first volumes listed in {}", candidates.len(), list.display())]
    AmbiguousArchive {
        /// Checksum list that was searched.
        list: PathBuf,
        /// Every qualifying volume, in list order.
        candidates: Vec<PathBuf>,
    },
    /// Some files referenced by the checksum list are not on disk yet.
    #[error("{} is incomplete: {present}/{total} files", list.display())]
    Incomplete {
        /// Checksum list that was checked.
        list: PathBuf,
        /// Number of referenced files present.
        present: usize,
        /// Number of referenced files.
        total: usize,
    },
    /// A referenced file does not match its recorded checksum.
    #[error("{}: failed checksum: expected {expected:08X}, got {actual:08X}", path.display())]
    ChecksumMismatch {
        /// File that failed verification.
        path: PathBuf,
        /// CRC32 recorded in the checksum list.
        expected: u32,
        /// CRC32 computed from disk.
        actual: u32,
    },
    /// Nested archives exceeded the recursion limit.
    #[error("archive nesting exceeds {limit} levels at {}", path.display())]
    NestingTooDeep {
        /// Archive that would have exceeded the limit.
        path: PathBuf,
        /// Configured nesting limit.
        limit: usize,
    },
    /// Rendering the post-process command template failed.
    #[error("fsops template failure")]
    Template {
        /// Template text that failed to render.
        template: String,
        /// Underlying minijinja error.
        source: minijinja::Error,
    },
    /// The post-process command ran but did not succeed.
    #[error("{program}: {stderr}")]
    Command {
        /// Program that was executed.
        program: String,
        /// Exit status code, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },
    /// Input validation failures.
    #[error("fsops invalid input for {field}: {reason}")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Unsupported operation or mode.
    #[error("fsops unsupported operation {operation}")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    #[cfg(feature = "rar")]
    pub(crate) fn rar(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: unrar::error::UnrarError,
    ) -> Self {
        Self::Rar {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is expected to clear on its own, such as a release
    /// that is still being downloaded.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn fsops_error_helpers_build_variants() {
        let io_err = FsOpsError::io("read", "path", io::Error::other("io"));
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());

        let zip_err = FsOpsError::zip("unpack", "archive.zip", zip::result::ZipError::FileNotFound);
        assert!(matches!(zip_err, FsOpsError::Zip { .. }));
        assert!(zip_err.source().is_some());
    }

    #[test]
    fn incomplete_is_the_only_transient_failure() {
        let incomplete = FsOpsError::Incomplete {
            list: "/r/set.sfv".into(),
            present: 2,
            total: 3,
        };
        assert!(incomplete.is_transient());
        assert_eq!(incomplete.to_string(), "/r/set.sfv is incomplete: 2/3 files");

        let mismatch = FsOpsError::ChecksumMismatch {
            path: "/r/set.r00".into(),
            expected: 0xDEAD_BEEF,
            actual: 0x0000_0001,
        };
        assert!(!mismatch.is_transient());
        assert_eq!(
            mismatch.to_string(),
            "/r/set.r00: failed checksum: expected DEADBEEF, got 00000001"
        );
    }
}
