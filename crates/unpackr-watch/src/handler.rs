//! File-handler seam and the shared dispatch used by live events and rescans.

use std::error::Error as StdError;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};
use unpackr_config::{PathRule, WatchConfig};

use crate::matcher::{self, MatchDecision, RejectReason};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by a [`FileHandler`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The file is not ready yet; a later event or rescan will retry it.
    #[error("deferred: {source}")]
    Deferred {
        /// Why the file was deferred.
        source: BoxError,
    },
    /// Handling failed.
    #[error("failed: {source}")]
    Failed {
        /// Underlying failure.
        source: BoxError,
    },
}

impl HandlerError {
    /// Wrap a transient failure.
    pub fn deferred(source: impl Into<BoxError>) -> Self {
        Self::Deferred {
            source: source.into(),
        }
    }

    /// Wrap a permanent failure.
    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::Failed {
            source: source.into(),
        }
    }
}

/// Work performed for every file that passes its rule.
///
/// Called from a blocking thread while the watcher holds its state lock, so
/// reloads and rescans wait for it to return.
pub trait FileHandler: Send + Sync + 'static {
    /// Handle `path`, which matched `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Deferred`] for transient conditions and
    /// [`HandlerError::Failed`] otherwise.
    fn on_file(&self, path: &Path, rule: &PathRule) -> Result<(), HandlerError>;
}

/// What happened to one dispatched path.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler accepted the file.
    Handled,
    /// No rule covers the path.
    NoRule,
    /// A matcher gate rejected the path.
    Rejected(RejectReason),
    /// The handler deferred the file.
    Deferred(HandlerError),
    /// The handler failed.
    Failed(HandlerError),
}

impl DispatchOutcome {
    /// Emit the log line for this outcome at its severity.
    pub fn log(&self, path: &Path) {
        match self {
            Self::Handled => info!(path = %path.display(), "handled"),
            Self::NoRule => debug!(path = %path.display(), "no rule for path"),
            Self::Rejected(reason) => {
                debug!(path = %path.display(), reason = reason.as_str(), "skipping");
            }
            Self::Deferred(error) => info!(path = %path.display(), error = %error, "skipping event"),
            Self::Failed(error) => warn!(path = %path.display(), error = %error, "handler failed"),
        }
    }
}

/// Resolve the rule for `path`, evaluate it, and call the handler on a match.
pub fn dispatch<H: FileHandler + ?Sized>(
    config: &WatchConfig,
    handler: &H,
    path: &Path,
) -> DispatchOutcome {
    let Some((rule, patterns)) = config.resolve(path) else {
        return DispatchOutcome::NoRule;
    };
    match matcher::evaluate_with(rule, patterns, path) {
        MatchDecision::Matched => match handler.on_file(path, rule) {
            Ok(()) => DispatchOutcome::Handled,
            Err(error @ HandlerError::Deferred { .. }) => DispatchOutcome::Deferred(error),
            Err(error @ HandlerError::Failed { .. }) => DispatchOutcome::Failed(error),
        },
        MatchDecision::Rejected(reason) => DispatchOutcome::Rejected(reason),
    }
}
