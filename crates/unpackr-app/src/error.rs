//! # Design
//!
//! - Centralize application-level errors for bootstrap and the one-shot commands.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: unpackr_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: unpackr_telemetry::TelemetryError,
    },
    /// Watcher operations failed.
    #[error("watcher operation failed")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watcher error.
        source: unpackr_watch::WatchError,
    },
    /// Unpack pipeline operations failed.
    #[error("unpack pipeline failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: unpackr_fsops::FsOpsError,
    },
    /// A background task panicked or was cancelled.
    #[error("background task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: unpackr_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: unpackr_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn watch(operation: &'static str, source: unpackr_watch::WatchError) -> Self {
        Self::Watch { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: unpackr_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
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
    fn app_error_helpers_build_variants() {
        let fsops = AppError::fsops(
            "unpack.run",
            unpackr_fsops::FsOpsError::Incomplete {
                list: "/dl/set.sfv".into(),
                present: 1,
                total: 2,
            },
        );
        assert!(matches!(fsops, AppError::FsOps { .. }));
        assert_eq!(fsops.to_string(), "unpack pipeline failed");
        assert!(fsops.source().is_some());

        let invalid = AppError::InvalidConfig {
            field: "config",
            reason: "home_unset",
            value: None,
        };
        assert!(invalid.source().is_none());

        let io_error = AppError::Io {
            operation: "stdout.write",
            path: None,
            source: io::Error::other("closed"),
        };
        assert!(io_error.source().is_some());
    }
}
