//! Test fixtures for release directories: checksum lists and archives.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Create a fresh temporary directory with a recognisable prefix.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir(prefix: &str) -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix(prefix).tempdir()?)
}

/// Uppercase hexadecimal CRC32 as written in `.sfv` files.
#[must_use]
pub fn crc32_hex(contents: &[u8]) -> String {
    format!("{:08X}", crc32fast::hash(contents))
}

/// Write each `(name, contents)` file into `dir` plus a checksum list named
/// `list_name` covering all of them. Returns the checksum list path.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub fn write_release(dir: &Path, list_name: &str, files: &[(&str, &[u8])]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let mut listing = String::from("; generated by unpackr-test-support\n");
    for (name, contents) in files {
        fs::write(dir.join(name), contents)?;
        listing.push_str(&format!("{name} {}\n", crc32_hex(contents)));
    }
    let list_path = dir.join(list_name);
    fs::write(&list_path, listing)?;
    Ok(list_path)
}

/// Entry placed into a fixture zip archive.
#[derive(Debug, Clone, Copy)]
pub enum ZipItem<'a> {
    /// Regular file with its contents.
    File(&'a str, &'a [u8]),
    /// Directory entry; the name should end with `/`.
    Dir(&'a str),
}

/// Calendar timestamp stored on fixture zip entries (seconds must be even).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipTimestamp {
    /// Four digit year, 1980 or later.
    pub year: u16,
    /// Month, 1 to 12.
    pub month: u8,
    /// Day of month.
    pub day: u8,
    /// Hour, 0 to 23.
    pub hour: u8,
    /// Minute, 0 to 59.
    pub minute: u8,
    /// Second, 0 to 58.
    pub second: u8,
}

/// Write a zip archive containing regular files only.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn write_zip(archive: &Path, entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let items: Vec<ZipItem<'_>> = entries
        .iter()
        .map(|(name, contents)| ZipItem::File(name, contents))
        .collect();
    write_zip_with(archive, &items, None)
}

/// Write a zip archive with explicit directory entries and an optional
/// timestamp applied to every entry. Returns the archive bytes.
///
/// # Errors
///
/// Returns an error if the archive cannot be written or the timestamp is invalid.
pub fn write_zip_with(
    archive: &Path,
    entries: &[ZipItem<'_>],
    modified: Option<ZipTimestamp>,
) -> Result<Vec<u8>> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(archive)?;
    let mut zip = ZipWriter::new(file);
    let mut options = FileOptions::default();
    if let Some(stamp) = modified {
        let datetime = zip::DateTime::from_date_and_time(
            stamp.year,
            stamp.month,
            stamp.day,
            stamp.hour,
            stamp.minute,
            stamp.second,
        )
        .map_err(|()| anyhow!("invalid zip timestamp {stamp:?}"))?;
        options = options.last_modified_time(datetime);
    }

    for entry in entries {
        match entry {
            ZipItem::File(name, contents) => {
                zip.start_file(*name, options)?;
                zip.write_all(contents)?;
            }
            ZipItem::Dir(name) => {
                zip.add_directory(*name, options)?;
            }
        }
    }
    zip.finish()?;
    Ok(fs::read(archive)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_hex_is_uppercase_and_padded() {
        assert_eq!(crc32_hex(b""), "00000000");
        assert_eq!(crc32_hex(b"123456789"), "CBF43926");
    }

    #[test]
    fn write_release_lists_every_file() -> Result<()> {
        let temp = temp_dir("unpackr-fixtures-")?;
        let list = write_release(temp.path(), "set.sfv", &[("a.bin", b"a"), ("b.bin", b"b")])?;
        let listing = fs::read_to_string(list)?;
        assert!(listing.contains(&format!("a.bin {}", crc32_hex(b"a"))));
        assert!(listing.contains(&format!("b.bin {}", crc32_hex(b"b"))));
        assert!(temp.path().join("b.bin").is_file());
        Ok(())
    }
}
