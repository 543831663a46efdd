//! # Design
//!
//! - Errors carry the operation and path that failed so log lines are self-describing.
//! - Handler failures are not watcher errors; they are reported per event and never stop the loop.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use unpackr_config::ConfigError;

/// Result alias for watcher operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors produced by the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The change-notification backend failed.
    #[error("watch notify failure during {operation} at {}", path.display())]
    Notify {
        /// Operation that failed.
        operation: &'static str,
        /// Path being (un)subscribed.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// A rule pattern does not compile.
    #[error("watch invalid pattern {pattern}")]
    Glob {
        /// Offending pattern.
        pattern: String,
        /// Underlying glob error.
        source: globset::Error,
    },
    /// Loading the configuration failed.
    #[error("watch config failure during {operation}")]
    Config {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying configuration error.
        source: ConfigError,
    },
    /// A background task panicked or was cancelled.
    #[error("watch task failure during {operation}")]
    Join {
        /// Task that failed.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// Installing an OS signal handler failed.
    #[error("watch signal failure during {operation}")]
    Signal {
        /// Signal being installed.
        operation: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl WatchError {
    pub(crate) fn notify(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: notify::Error,
    ) -> Self {
        Self::Notify {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn join(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Join { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn notify_helper_keeps_context() {
        let error = WatchError::notify(
            "notifier.subscribe",
            "/downloads",
            notify::Error::path_not_found(),
        );
        assert_eq!(
            error.to_string(),
            "watch notify failure during notifier.subscribe at /downloads"
        );
        assert!(error.source().is_some());
    }
}
