//! Command-line surface.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use unpackr_config::defaults;
use unpackr_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig};

use crate::error::{AppError, AppResult};

/// File name looked up in the home directory when no config is given.
pub const DEFAULT_CONFIG_NAME: &str = ".unpackr.json";

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(
    name = "unpackr",
    version,
    about = "Watch directories and unpack verified multi-part archives"
)]
pub struct Cli {
    /// Configuration file; defaults to `$HOME/.unpackr.json`.
    #[arg(short = 'f', long = "config", global = true, env = "UNPACKR_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log level or `EnvFilter` directive; `RUST_LOG` takes precedence.
    #[arg(
        long,
        global = true,
        env = "UNPACKR_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub log_level: String,
    /// Log output format; defaults to pretty in debug builds and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,
    /// Command to run; `watch` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the directory watcher until SIGTERM or SIGINT.
    Watch,
    /// Load and validate the configuration, then print its rules.
    Check,
    /// Run the unpack pipeline once on a directory.
    Unpack(UnpackArgs),
}

/// Arguments for a one-shot unpack.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct UnpackArgs {
    /// Directory holding the `.sfv` file and the archive volumes.
    pub directory: PathBuf,
    /// Extension of the archive volumes.
    #[arg(long, default_value = defaults::ARCHIVE_EXT)]
    pub archive_ext: String,
    /// Delete the listed files and the `.sfv` after extraction.
    #[arg(long)]
    pub remove: bool,
    /// Command template run after extraction (`{{ name }}`, `{{ base }}`, `{{ dir }}`).
    #[arg(long, default_value = defaults::POST_COMMAND)]
    pub post_command: String,
}

/// Log formats accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    /// Selected command, defaulting to `watch`.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch)
    }

    /// Logging settings derived from the flags.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            level: &self.log_level,
            format: self.log_format.map_or_else(LogFormat::infer, LogFormat::from),
        }
    }

    /// Configuration file to load.
    ///
    /// # Errors
    ///
    /// Returns an error when no path was given and `HOME` is unset.
    pub fn config_path(&self) -> AppResult<PathBuf> {
        if let Some(path) = &self.config {
            return Ok(path.clone());
        }
        default_config_path(std::env::var_os("HOME")).ok_or(AppError::InvalidConfig {
            field: "config",
            reason: "home_unset",
            value: None,
        })
    }
}

fn default_config_path(home: Option<OsString>) -> Option<PathBuf> {
    home.filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn watch_is_the_default_command() -> TestResult<()> {
        let cli = Cli::try_parse_from(["unpackr", "-f", "/etc/unpackr.json"])?;
        assert_eq!(cli.command(), Command::Watch);
        assert_eq!(cli.config_path()?, PathBuf::from("/etc/unpackr.json"));
        Ok(())
    }

    #[test]
    fn unpack_arguments_parse_with_defaults() -> TestResult<()> {
        let cli = Cli::try_parse_from([
            "unpackr",
            "--log-format",
            "json",
            "unpack",
            "/downloads/show",
            "--remove",
        ])?;
        assert_eq!(
            cli.command(),
            Command::Unpack(UnpackArgs {
                directory: PathBuf::from("/downloads/show"),
                archive_ext: "rar".into(),
                remove: true,
                post_command: String::new(),
            })
        );
        assert_eq!(cli.logging().format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn home_supplies_the_default_config() {
        assert_eq!(
            default_config_path(Some(OsString::from("/home/me"))),
            Some(PathBuf::from("/home/me/.unpackr.json"))
        );
        assert_eq!(default_config_path(Some(OsString::new())), None);
        assert_eq!(default_config_path(None), None);
    }
}
