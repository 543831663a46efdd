//! In-memory fakes for the watcher seams.
//!
//! Both fakes append to a shared [`Journal`] so tests can assert the
//! interleaving of handler calls and subscription changes.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use unpackr_config::PathRule;

use crate::error::{WatchError, WatchResult};
use crate::handler::{FileHandler, HandlerError};
use crate::notifier::ChangeNotifier;

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const WAIT_STEP: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of calls made against the fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    /// Snapshot of every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Index of the first entry equal to `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.0).iter().position(|recorded| recorded == entry)
    }

    /// Poll until `entry` is recorded, giving up after a few seconds.
    pub async fn wait_for(&self, entry: &str) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while tokio::time::Instant::now() < deadline {
            if self.position(entry).is_some() {
                return true;
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
        false
    }
}

/// Notifier that records subscriptions instead of watching anything.
#[derive(Debug, Default)]
pub struct FakeNotifier {
    journal: Journal,
    fail_on: Option<PathBuf>,
}

impl FakeNotifier {
    /// Record into `journal`.
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_on: None,
        }
    }

    /// Fail every subscription to `path`.
    #[must_use]
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_on = Some(path.into());
        self
    }
}

impl ChangeNotifier for FakeNotifier {
    fn subscribe(&mut self, path: &Path) -> WatchResult<()> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(WatchError::notify(
                "notifier.subscribe",
                path,
                notify::Error::path_not_found(),
            ));
        }
        self.journal.record(format!("subscribe:{}", path.display()));
        Ok(())
    }

    fn unsubscribe_all(&mut self) {
        self.journal.record("unsubscribe_all");
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Mode {
    #[default]
    Accept,
    Defer,
    Fail,
}

/// Handler that records every call and can block until released.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    journal: Journal,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    gate: Option<Arc<Mutex<std_mpsc::Receiver<()>>>>,
    mode: Mode,
}

impl RecordingHandler {
    /// Record into `journal` as `handle:start:<path>` and `handle:end:<path>`.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    /// Report every call as deferred.
    #[must_use]
    pub fn deferring(mut self) -> Self {
        self.mode = Mode::Defer;
        self
    }

    /// Report every call as failed.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.mode = Mode::Fail;
        self
    }

    /// Block each call until a value is sent on the returned sender.
    #[must_use]
    pub fn gated(mut self) -> (Self, std_mpsc::Sender<()>) {
        let (release, gate) = std_mpsc::channel();
        self.gate = Some(Arc::new(Mutex::new(gate)));
        (self, release)
    }

    /// Every `(path, rule root)` the handler was called with.
    #[must_use]
    pub fn handled(&self) -> Vec<(PathBuf, PathBuf)> {
        lock(&self.calls).clone()
    }
}

impl FileHandler for RecordingHandler {
    fn on_file(&self, path: &Path, rule: &PathRule) -> Result<(), HandlerError> {
        self.journal
            .record(format!("handle:start:{}", path.display()));
        if let Some(gate) = &self.gate {
            // A dropped sender releases the gate as well.
            let _ = lock(gate).recv();
        }
        lock(&self.calls).push((path.to_path_buf(), rule.name.clone()));
        self.journal.record(format!("handle:end:{}", path.display()));
        match self.mode {
            Mode::Accept => Ok(()),
            Mode::Defer => Err(HandlerError::deferred("release still arriving")),
            Mode::Fail => Err(HandlerError::failed("recording handler configured to fail")),
        }
    }
}
