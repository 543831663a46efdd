use std::path::Path;
use std::time::SystemTime;

use chrono::NaiveDate;
use unrar::{Archive, CursorBeforeFile, CursorBeforeHeader, OpenArchive, Process};

use super::{ArchiveDecoder, ArchiveEntry, EntryContent, EntryVisitor};
use crate::error::{FsOpsError, FsOpsResult};

type HeaderCursor = OpenArchive<Process, CursorBeforeHeader>;
type FileCursor = OpenArchive<Process, CursorBeforeFile>;

/// Decoder for RAR archives, including multi-volume sets.
///
/// Following volumes are opened by unrar itself from the first volume's name,
/// so every part must sit next to the first one. File content is written by
/// unrar directly to its destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RarDecoder;

impl ArchiveDecoder for RarDecoder {
    fn extension(&self) -> &'static str {
        "rar"
    }

    fn for_each_entry(&self, first_volume: &Path, visit: &mut EntryVisitor<'_>) -> FsOpsResult<()> {
        let mut archive = Archive::new(first_volume)
            .open_for_processing()
            .map_err(|source| FsOpsError::rar("rar.open", first_volume, source))?;

        while let Some(header) = archive
            .read_header()
            .map_err(|source| FsOpsError::rar("rar.read_header", first_volume, source))?
        {
            let entry = header.entry();
            let name = entry.filename.clone();
            let is_dir = entry.is_directory();
            let modified = dos_timestamp(entry.file_time);

            if is_dir {
                visit(ArchiveEntry {
                    name,
                    is_dir,
                    modified,
                    content: None,
                })?;
                archive = header
                    .skip()
                    .map_err(|source| FsOpsError::rar("rar.skip", first_volume, source))?;
                continue;
            }

            let mut content = RarContent {
                volume: first_volume,
                pending: Some(header),
                next: None,
            };
            visit(ArchiveEntry {
                name,
                is_dir,
                modified,
                content: Some(&mut content),
            })?;
            archive = content.finish()?;
        }
        Ok(())
    }
}

/// One file entry of an open archive. Writing it advances the cursor; an
/// entry the visitor leaves unwritten is skipped.
struct RarContent<'a> {
    volume: &'a Path,
    pending: Option<FileCursor>,
    next: Option<HeaderCursor>,
}

impl RarContent<'_> {
    fn finish(self) -> FsOpsResult<HeaderCursor> {
        match (self.next, self.pending) {
            (Some(next), _) => Ok(next),
            (None, Some(pending)) => pending
                .skip()
                .map_err(|source| FsOpsError::rar("rar.skip", self.volume, source)),
            (None, None) => Err(FsOpsError::InvalidInput {
                field: "archive_entry",
                reason: "cursor_lost",
                value: Some(self.volume.display().to_string()),
            }),
        }
    }
}

impl EntryContent for RarContent<'_> {
    fn write_to(&mut self, destination: &Path) -> FsOpsResult<()> {
        let Some(header) = self.pending.take() else {
            return Err(FsOpsError::InvalidInput {
                field: "archive_entry",
                reason: "already_written",
                value: Some(destination.display().to_string()),
            });
        };
        let next = header
            .extract_to(destination)
            .map_err(|source| FsOpsError::rar("rar.extract", self.volume, source))?;
        self.next = Some(next);
        Ok(())
    }
}

/// Decode an MS-DOS packed timestamp; zero and invalid dates map to `None`.
fn dos_timestamp(value: u32) -> Option<SystemTime> {
    let year = i32::try_from(((value >> 25) & 0x7f) + 1980).ok()?;
    let date = NaiveDate::from_ymd_opt(year, (value >> 21) & 0x0f, (value >> 16) & 0x1f)?;
    let datetime = date.and_hms_opt(
        (value >> 11) & 0x1f,
        (value >> 5) & 0x3f,
        (value & 0x1f) * 2,
    )?;
    Some(SystemTime::from(datetime.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use unpackr_test_support::fixtures::temp_dir;

    type TestResult<T> = anyhow::Result<T>;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn multi_volume_entries_stream_to_disk() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let mut seen = Vec::new();
        RarDecoder.for_each_entry(
            &fixture("spanned.part1.rar"),
            &mut |entry: ArchiveEntry<'_>| {
                let contents = match entry.content {
                    Some(content) => {
                        let destination = temp.path().join(seen.len().to_string());
                        content.write_to(&destination)?;
                        std::fs::read(&destination)
                            .map_err(|source| FsOpsError::io("test.read", &destination, source))?
                    }
                    None => Vec::new(),
                };
                seen.push((entry.name, entry.modified.is_some(), contents));
                Ok(())
            },
        )?;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, PathBuf::from("readme.txt"));
        assert_eq!(seen[0].2, b"spanned release readme\n");
        assert_eq!(seen[1].0, PathBuf::from("show/episode.txt"));
        assert_eq!(seen[1].2, episode_bytes());
        assert!(seen.iter().all(|(_, dated, _)| *dated));
        Ok(())
    }

    #[test]
    fn unwritten_entries_are_skipped() -> TestResult<()> {
        let mut names = Vec::new();
        RarDecoder.for_each_entry(
            &fixture("spanned.part1.rar"),
            &mut |entry: ArchiveEntry<'_>| {
                names.push(entry.name);
                Ok(())
            },
        )?;
        assert_eq!(
            names,
            [PathBuf::from("readme.txt"), PathBuf::from("show/episode.txt")]
        );
        Ok(())
    }

    #[test]
    fn second_write_of_one_entry_is_rejected() -> TestResult<()> {
        let temp = temp_dir("unpackr-fsops-")?;
        let result = RarDecoder.for_each_entry(
            &fixture("spanned.part1.rar"),
            &mut |entry: ArchiveEntry<'_>| {
                if let Some(content) = entry.content {
                    content.write_to(&temp.path().join("first"))?;
                    content.write_to(&temp.path().join("second"))?;
                }
                Ok(())
            },
        );
        assert!(matches!(
            result,
            Err(FsOpsError::InvalidInput {
                reason: "already_written",
                ..
            })
        ));
        assert!(temp.path().join("first").is_file());
        assert!(!temp.path().join("second").exists());
        Ok(())
    }

    /// Content of `show/episode.txt`, which spans both volumes.
    fn episode_bytes() -> Vec<u8> {
        (0..600).map(|index| b"abcdefghijklmnopqrstuvwxyz"[index % 26]).collect()
    }

    #[test]
    fn dos_timestamp_decodes_packed_fields() {
        // 2020-06-15 13:45:30
        let packed = ((2020 - 1980) << 25) | (6 << 21) | (15 << 16) | (13 << 11) | (45 << 5) | 15;
        let expected = NaiveDate::from_ymd_opt(2020, 6, 15)
            .and_then(|date| date.and_hms_opt(13, 45, 30))
            .map(|datetime| SystemTime::from(datetime.and_utc()));
        assert!(expected.is_some());
        assert_eq!(dos_timestamp(packed), expected);
    }

    #[test]
    fn zero_dos_timestamp_is_absent() {
        assert_eq!(dos_timestamp(0), None);
    }
}
