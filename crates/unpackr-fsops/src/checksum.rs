//! SFV checksum lists.
//!
//! # Design
//! - A `ChecksumSet` is rebuilt from disk for every pipeline run and never cached.
//! - Lines are `<filename> <crc32 hex>`; the split happens at the last whitespace run so
//!   filenames may contain spaces. Lines starting with `;` are comments.
//! - CRC32 is streamed through `crc32fast` so large volumes are not read into memory.
//! - Names must stay inside the list's directory: absolute names and `..`
//!   segments make the line malformed, since cleanup deletes every listed file.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FsOpsError, FsOpsResult};
use crate::extract::sanitize_archive_path;

/// Extension identifying checksum list files.
pub const CHECKSUM_LIST_EXTENSION: &str = "sfv";

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// One file referenced by a checksum list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    filename: String,
    path: PathBuf,
    expected: u32,
}

impl ChecksumEntry {
    /// Filename as written in the list, relative to the list's directory.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Absolute path of the referenced file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// CRC32 recorded in the list.
    #[must_use]
    pub const fn expected(&self) -> u32 {
        self.expected
    }

    /// Whether the referenced file exists as a regular file.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Compute the CRC32 of the referenced file and compare it with the recorded value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn verify(&self) -> FsOpsResult<bool> {
        Ok(self.compute()? == self.expected)
    }

    pub(crate) fn compute(&self) -> FsOpsResult<u32> {
        let file = File::open(&self.path)
            .map_err(|source| FsOpsError::io("checksum.open", &self.path, source))?;
        let mut reader = BufReader::new(file);
        let mut hasher = crc32fast::Hasher::new();
        let mut buffer = vec![0_u8; READ_BUFFER_BYTES];
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|source| FsOpsError::io("checksum.read", &self.path, source))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize())
    }
}

/// A parsed checksum list and the directory it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumSet {
    list_path: PathBuf,
    directory: PathBuf,
    entries: Vec<ChecksumEntry>,
}

impl ChecksumSet {
    /// Locate the single checksum list in `directory` and parse it.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read, holds no list or more
    /// than one, or the list is malformed.
    pub fn find(directory: &Path) -> FsOpsResult<Self> {
        let listing = fs::read_dir(directory)
            .map_err(|source| FsOpsError::io("checksum.read_dir", directory, source))?;

        let mut candidates = Vec::new();
        for entry in listing {
            let entry =
                entry.map_err(|source| FsOpsError::io("checksum.read_dir", directory, source))?;
            let path = entry.path();
            if path.is_file() && is_checksum_list(&path) {
                candidates.push(path);
            }
        }
        candidates.sort();

        match candidates.len() {
            0 => Err(FsOpsError::MissingChecksumList {
                directory: directory.to_path_buf(),
            }),
            1 => {
                let list_path = candidates.remove(0);
                Self::parse_file(&list_path)
            }
            _ => Err(FsOpsError::AmbiguousChecksumList {
                directory: directory.to_path_buf(),
                candidates,
            }),
        }
    }

    /// Parse the checksum list at `list_path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or a line is malformed.
    pub fn parse_file(list_path: &Path) -> FsOpsResult<Self> {
        let bytes =
            fs::read(list_path).map_err(|source| FsOpsError::io("checksum.read", list_path, source))?;
        let text = String::from_utf8_lossy(&bytes);
        let directory = list_path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);
        let set = Self::parse(list_path, &directory, &text)?;
        debug!(
            list = %list_path.display(),
            entries = set.entries.len(),
            "checksum list parsed"
        );
        Ok(set)
    }

    fn parse(list_path: &Path, directory: &Path, text: &str) -> FsOpsResult<Self> {
        let mut entries = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let malformed = || FsOpsError::MalformedChecksumLine {
                path: list_path.to_path_buf(),
                line: index + 1,
            };
            let (name, checksum) = line
                .rsplit_once(char::is_whitespace)
                .ok_or_else(malformed)?;
            let name = name.trim_end();
            if name.is_empty() || checksum.is_empty() || checksum.len() > 8 {
                return Err(malformed());
            }
            let expected = u32::from_str_radix(checksum, 16).map_err(|_| malformed())?;
            let relative = sanitize_archive_path(Path::new(name)).map_err(|_| malformed())?;
            if relative.as_os_str().is_empty() {
                return Err(malformed());
            }
            entries.push(ChecksumEntry {
                filename: name.to_string(),
                path: directory.join(relative),
                expected,
            });
        }
        Ok(Self {
            list_path: list_path.to_path_buf(),
            directory: directory.to_path_buf(),
            entries,
        })
    }

    /// Path of the checksum list file.
    #[must_use]
    pub fn list_path(&self) -> &Path {
        &self.list_path
    }

    /// Directory containing the list and the files it references.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Referenced files in list order.
    #[must_use]
    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }

    /// Count `(present, total)` referenced files.
    #[must_use]
    pub fn file_count(&self) -> (usize, usize) {
        let present = self.entries.iter().filter(|entry| entry.exists()).count();
        (present, self.entries.len())
    }

    /// Fail unless every referenced file is present.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Incomplete`] with both counts when files are missing.
    pub fn ensure_complete(&self) -> FsOpsResult<()> {
        let (present, total) = self.file_count();
        if present < total {
            return Err(FsOpsError::Incomplete {
                list: self.list_path.clone(),
                present,
                total,
            });
        }
        Ok(())
    }

    /// Verify every present file, failing on the first mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::ChecksumMismatch`] naming the first failing file, or an
    /// IO error when a file cannot be read.
    pub fn verify_all(&self) -> FsOpsResult<usize> {
        let mut verified = 0;
        for entry in self.entries.iter().filter(|entry| entry.exists()) {
            let actual = entry.compute()?;
            if actual != entry.expected {
                return Err(FsOpsError::ChecksumMismatch {
                    path: entry.path.clone(),
                    expected: entry.expected,
                    actual,
                });
            }
            verified += 1;
        }
        Ok(verified)
    }
}

fn is_checksum_list(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CHECKSUM_LIST_EXTENSION))
}
