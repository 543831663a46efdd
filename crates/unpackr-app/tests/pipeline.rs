//! Watcher events flow through the unpack handler into real extractions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use unpackr_app::UnpackHandler;
use unpackr_config::WatchConfig;
use unpackr_test_support::fixtures::{temp_dir, write_release, write_zip};
use unpackr_watch::fakes::{FakeNotifier, Journal};
use unpackr_watch::{DispatchOutcome, EventSink, RejectReason, Watcher, dispatch};

fn config_for(root: &Path, dir: &Path) -> Result<WatchConfig> {
    let file = dir.join("unpackr.json");
    fs::write(
        &file,
        format!(
            r#"{{
                "Default": {{ "ArchiveExt": ".zip" }},
                "Paths": [
                    {{
                        "Name": "{}",
                        "MinDepth": 1,
                        "MaxDepth": 1,
                        "Patterns": ["*.sfv"],
                        "Remove": true
                    }}
                ]
            }}"#,
            root.display()
        ),
    )?;
    Ok(WatchConfig::load(&file)?)
}

fn stage_release(root: &Path, staging: &Path) -> Result<PathBuf> {
    let archive = write_zip(
        &staging.join("show.zip"),
        &[("show/episode.mkv", b"episode"), ("show/info.txt", b"info")],
    )?;
    write_release(root, "show.sfv", &[("show.zip", &archive)])
}

#[test]
fn matching_checksum_list_is_extracted_and_removed() -> Result<()> {
    let temp = temp_dir("unpackr-pipeline-")?;
    let root = temp.path().join("downloads");
    let list = stage_release(&root, &temp.path().join("staging"))?;
    let config = config_for(&root, temp.path())?;

    let outcome = dispatch(&config, &UnpackHandler::default(), &list);

    assert!(matches!(outcome, DispatchOutcome::Handled), "{outcome:?}");
    assert_eq!(fs::read(root.join("show/episode.mkv"))?, b"episode");
    assert_eq!(fs::read(root.join("show/info.txt"))?, b"info");
    assert!(!root.join("show.zip").exists());
    assert!(!list.exists());
    Ok(())
}

#[test]
fn missing_volume_defers_without_writing() -> Result<()> {
    let temp = temp_dir("unpackr-pipeline-")?;
    let root = temp.path().join("downloads");
    let list = write_release(
        &root,
        "show.sfv",
        &[("show.zip", b"first"), ("show.z01", b"second")],
    )?;
    fs::remove_file(root.join("show.z01"))?;
    let config = config_for(&root, temp.path())?;

    let outcome = dispatch(&config, &UnpackHandler::default(), &list);

    assert!(matches!(outcome, DispatchOutcome::Deferred(_)), "{outcome:?}");
    let mut names: Vec<String> = fs::read_dir(&root)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    assert_eq!(names, ["show.sfv", "show.zip"]);
    Ok(())
}

#[test]
fn lists_below_the_depth_limit_are_ignored() -> Result<()> {
    let temp = temp_dir("unpackr-pipeline-")?;
    let root = temp.path().join("downloads");
    let list = stage_release(&root.join("nested"), &temp.path().join("staging"))?;
    let config = config_for(&root, temp.path())?;

    let outcome = dispatch(&config, &UnpackHandler::default(), &list);

    assert!(
        matches!(
            outcome,
            DispatchOutcome::Rejected(RejectReason::DepthOutOfRange { depth: 2, .. })
        ),
        "{outcome:?}"
    );
    assert!(list.exists());
    assert!(!root.join("nested/show").exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_unpacks_delivered_events() -> Result<()> {
    let temp = temp_dir("unpackr-pipeline-")?;
    let root = temp.path().join("downloads");
    let config = config_for(&root, temp.path())?;

    let journal = Journal::default();
    let mut captured = None;
    let watcher = Watcher::new(config, UnpackHandler::default(), |sink: EventSink| {
        captured = Some(sink);
        Ok(FakeNotifier::new(journal.clone()))
    })?;
    let Some(sink) = captured else {
        bail!("watcher never handed out its event sink");
    };
    let control = watcher.control();
    let running = tokio::spawn(watcher.run());
    assert!(journal.wait_for(&format!("subscribe:{}", root.display())).await);

    let list = stage_release(&root, &temp.path().join("staging"))?;
    assert!(sink.deliver(list.clone()));

    let extracted = root.join("show/episode.mkv");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while list.exists() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!list.exists());
    assert_eq!(fs::read(&extracted)?, b"episode");

    assert!(control.shutdown().await);
    tokio::time::timeout(Duration::from_secs(5), running).await???;
    assert_eq!(sink.dropped(), 0);
    Ok(())
}
