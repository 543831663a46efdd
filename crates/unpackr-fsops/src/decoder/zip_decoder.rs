use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDate;
use zip::ZipArchive;

use super::{ArchiveDecoder, ArchiveEntry, EntryContent, EntryVisitor, StreamContent};
use crate::error::{FsOpsError, FsOpsResult};

/// Decoder for single-volume zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDecoder;

impl ArchiveDecoder for ZipDecoder {
    fn extension(&self) -> &'static str {
        "zip"
    }

    fn for_each_entry(&self, first_volume: &Path, visit: &mut EntryVisitor<'_>) -> FsOpsResult<()> {
        let file = File::open(first_volume)
            .map_err(|source| FsOpsError::io("zip.open", first_volume, source))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|source| FsOpsError::zip("zip.decode", first_volume, source))?;

        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|source| FsOpsError::zip("zip.read_entry", first_volume, source))?;
            let name = PathBuf::from(entry.name());
            let is_dir = entry.is_dir();
            let modified = zip_timestamp(entry.last_modified());
            let mut content = StreamContent(entry);
            visit(ArchiveEntry {
                name,
                is_dir,
                modified,
                content: (!is_dir).then_some(&mut content as &mut dyn EntryContent),
            })?;
        }
        Ok(())
    }
}

/// Zip timestamps carry no zone; they are read as UTC. An all-zero DOS
/// timestamp has no valid calendar date and maps to `None`.
fn zip_timestamp(stamp: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(
        i32::from(stamp.year()),
        u32::from(stamp.month()),
        u32::from(stamp.day()),
    )?;
    let datetime = date.and_hms_opt(
        u32::from(stamp.hour()),
        u32::from(stamp.minute()),
        u32::from(stamp.second()),
    )?;
    Some(SystemTime::from(datetime.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use unpackr_test_support::fixtures::{ZipItem, ZipTimestamp, temp_dir, write_zip_with};

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn visits_entries_in_archive_order() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let archive = temp.path().join("payload.zip");
        write_zip_with(
            &archive,
            &[
                ZipItem::Dir("show/"),
                ZipItem::File("show/episode.mkv", b"video"),
                ZipItem::File("readme.txt", b"notes"),
            ],
            Some(ZipTimestamp {
                year: 2021,
                month: 3,
                day: 4,
                hour: 5,
                minute: 6,
                second: 8,
            }),
        )?;

        let out = temp.path().join("out");
        std::fs::create_dir_all(&out)?;
        let mut seen = Vec::new();
        ZipDecoder.for_each_entry(&archive, &mut |entry: ArchiveEntry<'_>| {
            let mut contents = Vec::new();
            if let Some(content) = entry.content {
                let destination = out.join(seen.len().to_string());
                content.write_to(&destination)?;
                contents = std::fs::read(&destination)
                    .map_err(|source| FsOpsError::io("test.read", &destination, source))?;
            }
            seen.push((entry.name, entry.is_dir, entry.modified, contents));
            Ok(())
        })?;

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, PathBuf::from("show/"));
        assert!(seen[0].1);
        assert_eq!(seen[1].0, PathBuf::from("show/episode.mkv"));
        assert_eq!(seen[1].3, b"video");
        assert!(!seen[2].1);
        assert_eq!(seen[2].3, b"notes");

        let expected = NaiveDate::from_ymd_opt(2021, 3, 4)
            .and_then(|date| date.and_hms_opt(5, 6, 8))
            .map(|datetime| SystemTime::from(datetime.and_utc()));
        assert!(expected.is_some());
        assert_eq!(seen[1].2, expected);
        Ok(())
    }

    #[test]
    fn corrupt_archive_reports_zip_error() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let archive = temp.path().join("broken.zip");
        std::fs::write(&archive, b"not a zip")?;
        let result = ZipDecoder.for_each_entry(&archive, &mut |_entry: ArchiveEntry<'_>| Ok(()));
        assert!(matches!(
            result,
            Err(FsOpsError::Zip {
                operation: "zip.decode",
                ..
            })
        ));
        Ok(())
    }
}
