//! Change-notification seam.
//!
//! # Design
//! - Backends push changed paths into an [`EventSink`] from their own thread.
//! - The sink never blocks: when the queue is full the event is dropped,
//!   counted and logged. A rescan picks up anything that was lost.
//! - Only "file finished writing" style events are forwarded, so a file is not
//!   handled while it is still being written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::{WatchError, WatchResult};

/// A source of filesystem change events.
pub trait ChangeNotifier: Send + 'static {
    /// Start delivering events for every file below `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot watch `path`.
    fn subscribe(&mut self, path: &Path) -> WatchResult<()>;

    /// Stop delivering events for every subscribed path.
    fn unsubscribe_all(&mut self);
}

/// Producer side of the bounded change-event queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<PathBuf>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue `path` without waiting. Returns whether it was queued.
    pub fn deliver(&self, path: PathBuf) -> bool {
        match self.tx.try_send(path) {
            Ok(()) => true,
            Err(TrySendError::Full(path)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(path = %path.display(), dropped, "event queue full; dropping event");
                false
            }
            Err(TrySendError::Closed(path)) => {
                debug!(path = %path.display(), "event queue closed");
                false
            }
        }
    }

    /// Events dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// [`ChangeNotifier`] backed by the platform's native watcher.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl NotifyWatcher {
    /// Create a watcher that forwards finished writes and renames into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error when the native backend cannot be initialised.
    pub fn new(sink: EventSink) -> WatchResult<Self> {
        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for path in forwarded_paths(&event) {
                        sink.deliver(path);
                    }
                }
                Err(error) => warn!(error = %error, "notify backend error"),
            },
            Config::default(),
        )
        .map_err(|source| WatchError::notify("notifier.create", PathBuf::new(), source))?;
        Ok(Self {
            watcher,
            watched: Vec::new(),
        })
    }
}

impl ChangeNotifier for NotifyWatcher {
    fn subscribe(&mut self, path: &Path) -> WatchResult<()> {
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|source| WatchError::notify("notifier.subscribe", path, source))?;
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    fn unsubscribe_all(&mut self) {
        for path in self.watched.drain(..) {
            if let Err(error) = self.watcher.unwatch(&path) {
                debug!(path = %path.display(), error = %error, "unwatch failed");
            }
        }
    }
}

impl fmt::Debug for NotifyWatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NotifyWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

fn forwarded_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        #[cfg(target_os = "linux")]
        EventKind::Access(notify::event::AccessKind::Close(notify::event::AccessMode::Write)) => {
            event.paths.clone()
        }
        #[cfg(not(target_os = "linux"))]
        EventKind::Create(notify::event::CreateKind::File)
        | EventKind::Modify(ModifyKind::Data(_)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    #[test]
    fn full_queue_drops_and_counts() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        assert!(sink.deliver(PathBuf::from("/a.sfv")));
        assert!(!sink.deliver(PathBuf::from("/b.sfv")));
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.try_recv().ok(), Some(PathBuf::from("/a.sfv")));
        assert!(sink.deliver(PathBuf::from("/c.sfv")));
    }

    #[test]
    fn renames_forward_the_target() {
        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/dl/.tmp"))
            .add_path(PathBuf::from("/dl/a.sfv"));
        assert_eq!(forwarded_paths(&both), vec![PathBuf::from("/dl/a.sfv")]);

        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/dl/b.sfv"));
        assert_eq!(forwarded_paths(&to), vec![PathBuf::from("/dl/b.sfv")]);
    }

    #[test]
    fn removals_are_ignored() {
        let removed =
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/dl/a.sfv"));
        assert!(forwarded_paths(&removed).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_forwards_close_write_only() {
        use notify::event::{AccessKind, AccessMode};
        let closed = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)))
            .add_path(PathBuf::from("/dl/a.sfv"));
        assert_eq!(forwarded_paths(&closed), vec![PathBuf::from("/dl/a.sfv")]);

        let created =
            Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/dl/a.sfv"));
        assert!(forwarded_paths(&created).is_empty());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn created_files_are_forwarded() {
        let created =
            Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/dl/a.sfv"));
        assert_eq!(forwarded_paths(&created), vec![PathBuf::from("/dl/a.sfv")]);
    }

    #[tokio::test]
    async fn native_watcher_reports_written_files() -> anyhow::Result<()> {
        let temp = unpackr_test_support::fixtures::temp_dir("unpackr-watch-")?;
        let root = temp.path().canonicalize()?;
        let (tx, mut rx) = mpsc::channel(16);
        let mut watcher = NotifyWatcher::new(EventSink::new(tx))?;
        watcher.subscribe(&root)?;

        let target = root.join("release.sfv");
        std::fs::write(&target, b"; list\n")?;

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while let Some(path) = rx.recv().await {
                if path == target {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(received);

        watcher.unsubscribe_all();
        Ok(())
    }
}
