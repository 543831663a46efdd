//! Archive decoders.
//!
//! # Design
//! - A decoder walks the entries of an archive starting at its first volume and
//!   hands each one to a visitor. File entries carry an [`EntryContent`] that
//!   writes straight to a destination, so no entry is held in memory.
//! - Content borrows from the decoder's internal state, so entries are visited
//!   rather than collected.
//! - Multi-volume support is the decoder's concern; callers only know the first volume.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{FsOpsError, FsOpsResult};

#[cfg(feature = "rar")]
mod rar_decoder;
mod zip_decoder;

#[cfg(feature = "rar")]
pub use rar_decoder::RarDecoder;
pub use zip_decoder::ZipDecoder;

/// Writes the content of one file entry.
pub trait EntryContent {
    /// Create or truncate `destination` and stream the entry into it.
    ///
    /// # Errors
    ///
    /// Returns an error when decoding or writing fails, or the content was
    /// already written once.
    fn write_to(&mut self, destination: &Path) -> FsOpsResult<()>;
}

/// [`EntryContent`] over any reader, copied through a fixed-size buffer.
#[derive(Debug)]
pub struct StreamContent<R>(pub R);

impl<R: Read> EntryContent for StreamContent<R> {
    fn write_to(&mut self, destination: &Path) -> FsOpsResult<()> {
        let mut output = File::create(destination)
            .map_err(|source| FsOpsError::io("extract.create_file", destination, source))?;
        io::copy(&mut self.0, &mut output)
            .map_err(|source| FsOpsError::io("extract.copy", destination, source))?;
        Ok(())
    }
}

/// One entry produced by a decoder.
pub struct ArchiveEntry<'r> {
    /// Path recorded in the archive, relative to the extraction root.
    pub name: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Recorded modification time; `None` leaves timestamps untouched.
    pub modified: Option<SystemTime>,
    /// File content; `None` for directories.
    pub content: Option<&'r mut dyn EntryContent>,
}

impl fmt::Debug for ArchiveEntry<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ArchiveEntry")
            .field("name", &self.name)
            .field("is_dir", &self.is_dir)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// Visitor invoked once per archive entry.
pub type EntryVisitor<'v> = dyn FnMut(ArchiveEntry<'_>) -> FsOpsResult<()> + 'v;

/// Decodes one archive container format.
pub trait ArchiveDecoder: Send + Sync {
    /// Extension, lowercase and without a dot, of files this decoder opens.
    fn extension(&self) -> &'static str;

    /// Visit every entry of the archive whose first volume is `first_volume`.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive cannot be decoded or the visitor fails;
    /// visiting stops at the first error.
    fn for_each_entry(&self, first_volume: &Path, visit: &mut EntryVisitor<'_>) -> FsOpsResult<()>;
}

/// Decoders keyed by archive extension.
pub struct DecoderRegistry {
    decoders: BTreeMap<&'static str, Box<dyn ArchiveDecoder>>,
}

impl DecoderRegistry {
    /// Registry without any decoder.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Registry with every decoder compiled into this build.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ZipDecoder));
        #[cfg(feature = "rar")]
        registry.register(Box::new(RarDecoder));
        registry
    }

    /// Add or replace the decoder for its extension.
    pub fn register(&mut self, decoder: Box<dyn ArchiveDecoder>) {
        self.decoders.insert(decoder.extension(), decoder);
    }

    /// Whether a decoder exists for `extension`.
    #[must_use]
    pub fn supports(&self, extension: &str) -> bool {
        self.decoders
            .contains_key(extension.to_ascii_lowercase().as_str())
    }

    /// Extensions with a registered decoder, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<&'static str> {
        self.decoders.keys().copied().collect()
    }

    /// Decoder for `extension`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Unsupported`] when no decoder is registered.
    pub fn get(&self, extension: &str) -> FsOpsResult<&dyn ArchiveDecoder> {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.decoders
            .get(key.as_str())
            .map(|decoder| &**decoder)
            .ok_or(FsOpsError::Unsupported {
                operation: "decoder.lookup",
                value: Some(key),
            })
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DecoderRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unpackr_test_support::fixtures::temp_dir;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn stream_content_truncates_the_destination() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let destination = temp.path().join("out.bin");
        std::fs::write(&destination, b"previous longer contents")?;

        StreamContent(&b"new"[..]).write_to(&destination)?;

        assert_eq!(std::fs::read(&destination)?, b"new");
        Ok(())
    }

    #[cfg(feature = "rar")]
    #[test]
    fn defaults_cover_the_default_archive_extension() {
        let registry = DecoderRegistry::with_defaults();
        assert!(registry.supports(unpackr_config::defaults::ARCHIVE_EXT));
        assert_eq!(registry.extensions(), vec!["rar", "zip"]);
    }

    #[test]
    fn defaults_include_zip() {
        let registry = DecoderRegistry::with_defaults();
        assert!(registry.supports("zip"));
        assert!(registry.supports("ZIP"));
        assert!(registry.get(".zip").is_ok());
        assert_eq!(registry.get("zip").map(|decoder| decoder.extension()).ok(), Some("zip"));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = DecoderRegistry::empty();
        assert!(registry.extensions().is_empty());
        assert!(matches!(
            registry.get("7z"),
            Err(FsOpsError::Unsupported {
                operation: "decoder.lookup",
                ..
            })
        ));
    }
}
