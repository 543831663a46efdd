//! OS signal forwarding.
//!
//! `SIGUSR1` requests a rescan, `SIGUSR2` a reload, and `SIGTERM`/`SIGINT`
//! shutdown. Targets without unix signals only map Ctrl-C to shutdown.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{debug, info};

use crate::control::{Control, ControlHandle};
#[cfg(unix)]
use crate::error::WatchError;
use crate::error::WatchResult;

/// A signal the watcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `SIGUSR1`.
    User1,
    /// `SIGUSR2`.
    User2,
    /// `SIGTERM`.
    Terminate,
    /// `SIGINT` or Ctrl-C.
    Interrupt,
}

impl Trigger {
    /// Command sent to the watcher for this signal.
    #[must_use]
    pub const fn control(self) -> Control {
        match self {
            Self::User1 => Control::Rescan,
            Self::User2 => Control::Reload,
            Self::Terminate | Self::Interrupt => Control::Shutdown,
        }
    }

    /// Signal name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
        }
    }
}

#[cfg(unix)]
struct Streams {
    user1: Signal,
    user2: Signal,
    terminate: Signal,
    interrupt: Signal,
}

#[cfg(unix)]
impl Streams {
    fn install() -> WatchResult<Self> {
        Ok(Self {
            user1: listen(SignalKind::user_defined1(), "signal.usr1")?,
            user2: listen(SignalKind::user_defined2(), "signal.usr2")?,
            terminate: listen(SignalKind::terminate(), "signal.term")?,
            interrupt: listen(SignalKind::interrupt(), "signal.int")?,
        })
    }

    async fn next(&mut self) -> Trigger {
        tokio::select! {
            _ = self.user1.recv() => Trigger::User1,
            _ = self.user2.recv() => Trigger::User2,
            _ = self.terminate.recv() => Trigger::Terminate,
            _ = self.interrupt.recv() => Trigger::Interrupt,
        }
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, operation: &'static str) -> WatchResult<Signal> {
    signal(kind).map_err(|source| WatchError::Signal { operation, source })
}

/// Translates OS signals into watcher commands.
pub struct SignalForwarder {
    handle: ControlHandle,
    #[cfg(unix)]
    streams: Streams,
}

impl SignalForwarder {
    /// Register the signal handlers. Must be called inside a tokio runtime.
    ///
    /// Handlers are registered before this returns, so signals raised
    /// afterwards are never lost even if [`SignalForwarder::run`] starts later.
    ///
    /// # Errors
    ///
    /// Returns an error when a handler cannot be registered.
    pub fn install(handle: ControlHandle) -> WatchResult<Self> {
        Ok(Self {
            handle,
            #[cfg(unix)]
            streams: Streams::install()?,
        })
    }

    /// Forward signals until the watcher shuts down.
    #[cfg(unix)]
    pub async fn run(self) {
        let Self {
            handle,
            mut streams,
        } = self;
        loop {
            let trigger = tokio::select! {
                biased;
                () = handle.stopped() => break,
                trigger = streams.next() => trigger,
            };
            let control = trigger.control();
            info!(signal = trigger.as_str(), control = control.as_str(), "signal received");
            if !handle.send(control).await {
                break;
            }
        }
        debug!("signal forwarder stopped");
    }

    /// Forward Ctrl-C until the watcher shuts down.
    #[cfg(not(unix))]
    pub async fn run(self) {
        let Self { handle } = self;
        tokio::select! {
            biased;
            () = handle.stopped() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    let trigger = Trigger::Interrupt;
                    info!(signal = trigger.as_str(), "signal received");
                    handle.send(trigger.control()).await;
                }
            }
        }
        debug!("signal forwarder stopped");
    }
}

impl std::fmt::Debug for SignalForwarder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SignalForwarder")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Install the signal handlers and forward signals until shutdown.
///
/// # Errors
///
/// Returns an error when a handler cannot be registered.
pub async fn forward_signals(handle: ControlHandle) -> WatchResult<()> {
    SignalForwarder::install(handle)?.run().await;
    Ok(())
}
