//! Watcher lifecycle and the event/control loop.
//!
//! # Design
//! - One `tokio::sync::Mutex` guards the live configuration and the notifier.
//!   Event handling, rescans, reloads and shutdown all take it, so a reload
//!   never swaps rules under an in-flight handler.
//! - Two listeners run concurrently: one drains change events, one serves
//!   control commands. Both exit when the shutdown broadcast flips to `true`.
//! - `Watcher::run` consumes the watcher; a stopped watcher cannot restart.

use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};
use unpackr_config::WatchConfig;

use crate::error::{WatchError, WatchResult};
use crate::handler::{FileHandler, dispatch};
use crate::notifier::{ChangeNotifier, EventSink};
use crate::rescan::rescan;

const CONTROL_QUEUE: usize = 16;

/// Out-of-band commands for a running watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Walk every configured tree and dispatch each file.
    Rescan,
    /// Re-read the configuration file and resubscribe.
    Reload,
    /// Unsubscribe everything and stop both listeners.
    Shutdown,
}

impl Control {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rescan => "rescan",
            Self::Reload => "reload",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Cloneable handle for steering a watcher from other tasks.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Control>,
    shutdown: watch::Receiver<bool>,
}

impl ControlHandle {
    /// Queue `control`. Returns `false` once the watcher no longer accepts commands.
    pub async fn send(&self, control: Control) -> bool {
        self.commands.send(control).await.is_ok()
    }

    /// Request a full rescan.
    pub async fn rescan(&self) -> bool {
        self.send(Control::Rescan).await
    }

    /// Request a configuration reload.
    pub async fn reload(&self) -> bool {
        self.send(Control::Reload).await
    }

    /// Request shutdown. Repeated requests are harmless.
    pub async fn shutdown(&self) -> bool {
        self.send(Control::Shutdown).await
    }

    /// Whether shutdown has been broadcast.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolve once shutdown has been broadcast or the watcher is gone.
    pub async fn stopped(&self) {
        let mut shutdown = self.shutdown.clone();
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    }
}

struct WatchState<N> {
    config: Arc<WatchConfig>,
    notifier: N,
}

struct Shared<H, N> {
    state: Mutex<WatchState<N>>,
    handler: Arc<H>,
    shutdown: watch::Sender<bool>,
}

/// Directory watcher feeding matched files to a [`FileHandler`].
pub struct Watcher<H, N> {
    shared: Arc<Shared<H, N>>,
    events: mpsc::Receiver<PathBuf>,
    commands: mpsc::Receiver<Control>,
    handle: ControlHandle,
}

impl<H: FileHandler, N: ChangeNotifier> Watcher<H, N> {
    /// Build a watcher whose event queue holds `config.buffer_size()` paths.
    ///
    /// `make_notifier` receives the producer side of that queue.
    ///
    /// # Errors
    ///
    /// Returns an error when the notifier cannot be created.
    pub fn new<F>(config: WatchConfig, handler: H, make_notifier: F) -> WatchResult<Self>
    where
        F: FnOnce(EventSink) -> WatchResult<N>,
    {
        let (event_tx, events) = mpsc::channel(config.buffer_size().max(1));
        let notifier = make_notifier(EventSink::new(event_tx))?;
        let (command_tx, commands) = mpsc::channel(CONTROL_QUEUE);
        let (shutdown, shutdown_rx) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WatchState {
                    config: Arc::new(config),
                    notifier,
                }),
                handler: Arc::new(handler),
                shutdown,
            }),
            events,
            commands,
            handle: ControlHandle {
                commands: command_tx,
                shutdown: shutdown_rx,
            },
        })
    }

    /// Handle for sending commands to this watcher.
    #[must_use]
    pub fn control(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Subscribe every configured tree and serve events and commands until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when a listener task panics.
    pub async fn run(self) -> WatchResult<()> {
        let Self {
            shared,
            events,
            commands,
            handle,
        } = self;
        drop(handle);

        {
            let mut state = shared.state.lock().await;
            let WatchState { config, notifier } = &mut *state;
            let watched = subscribe_all(config, notifier);
            info!(watched, rules = config.paths().len(), "watcher started");
        }

        let event_task = tokio::spawn(event_listener(Arc::clone(&shared), events));
        let control_task = tokio::spawn(control_listener(Arc::clone(&shared), commands));
        let (event_result, control_result) = tokio::join!(event_task, control_task);
        event_result.map_err(|source| WatchError::join("watch.events", source))?;
        control_result.map_err(|source| WatchError::join("watch.control", source))?;

        info!("watcher stopped");
        Ok(())
    }
}

fn subscribe_all<N: ChangeNotifier>(config: &WatchConfig, notifier: &mut N) -> usize {
    let mut watched = 0;
    for rule in config.paths() {
        match notifier.subscribe(&rule.name) {
            Ok(()) => {
                watched += 1;
                debug!(path = %rule.name.display(), "watching");
            }
            Err(error) => warn!(path = %rule.name.display(), error = %error, "failed to watch path"),
        }
    }
    watched
}

async fn event_listener<H: FileHandler, N: ChangeNotifier>(
    shared: Arc<Shared<H, N>>,
    mut events: mpsc::Receiver<PathBuf>,
) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut open = true;
    loop {
        tokio::select! {
            biased;
            _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
            event = events.recv(), if open => match event {
                Some(path) => handle_event(&shared, path).await,
                None => open = false,
            },
        }
    }
    debug!("event listener stopped");
}

async fn handle_event<H: FileHandler, N: ChangeNotifier>(shared: &Shared<H, N>, path: PathBuf) {
    let state = shared.state.lock().await;
    let config = Arc::clone(&state.config);
    let handler = Arc::clone(&shared.handler);
    let task = tokio::task::spawn_blocking(move || {
        let outcome = dispatch(&config, handler.as_ref(), &path);
        outcome.log(&path);
    });
    if let Err(error) = task.await {
        warn!(error = %error, "event handler task failed");
    }
    drop(state);
}

async fn control_listener<H: FileHandler, N: ChangeNotifier>(
    shared: Arc<Shared<H, N>>,
    mut commands: mpsc::Receiver<Control>,
) {
    let mut shutdown = shared.shutdown.subscribe();
    let mut open = true;
    loop {
        tokio::select! {
            biased;
            _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
            command = commands.recv(), if open => match command {
                Some(control) => {
                    debug!(control = control.as_str(), "control received");
                    match control {
                        Control::Rescan => run_rescan(&shared).await,
                        Control::Reload => reload(&shared).await,
                        Control::Shutdown => stop(&shared).await,
                    }
                }
                None => open = false,
            },
        }
    }
    debug!("control listener stopped");
}

async fn run_rescan<H: FileHandler, N: ChangeNotifier>(shared: &Shared<H, N>) {
    let state = shared.state.lock().await;
    let config = Arc::clone(&state.config);
    let handler = Arc::clone(&shared.handler);
    match tokio::task::spawn_blocking(move || rescan(&config, handler.as_ref())).await {
        Ok(report) => info!(
            handled = report.handled,
            skipped = report.skipped,
            failed = report.failed,
            failed_roots = report.failed_roots.len(),
            "rescan finished"
        ),
        Err(error) => warn!(error = %error, "rescan task failed"),
    }
    drop(state);
}

async fn reload<H: FileHandler, N: ChangeNotifier>(shared: &Shared<H, N>) {
    let mut state = shared.state.lock().await;
    let Some(source) = state.config.source().map(Path::to_path_buf) else {
        error!("reload requested but the configuration has no source file");
        return;
    };

    let path = source.clone();
    let loaded = match tokio::task::spawn_blocking(move || WatchConfig::load(&path)).await {
        Ok(result) => result.map_err(|source| WatchError::Config {
            operation: "watch.reload",
            source,
        }),
        Err(source) => Err(WatchError::join("watch.reload", source)),
    };

    match loaded {
        Ok(config) => {
            let WatchState {
                config: current,
                notifier,
            } = &mut *state;
            if config.buffer_size() != current.buffer_size() {
                warn!(
                    current = current.buffer_size(),
                    requested = config.buffer_size(),
                    "buffer size changes apply after restart"
                );
            }
            notifier.unsubscribe_all();
            *current = Arc::new(config);
            let watched = subscribe_all(current, notifier);
            info!(source = %source.display(), watched, "configuration reloaded");
        }
        Err(error) => error!(
            source = %source.display(),
            error = %error_chain(&error),
            "failed to read config"
        ),
    }
}

async fn stop<H: FileHandler, N: ChangeNotifier>(shared: &Shared<H, N>) {
    let mut state = shared.state.lock().await;
    state.notifier.unsubscribe_all();
    drop(state);
    shared.shutdown.send_replace(true);
    info!("watcher stopping");
}

fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        cause = inner.source();
    }
    rendered
}
