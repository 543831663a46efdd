use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::Path;

use clap::Parser;
use tracing::{info, warn};
use unpackr_config::WatchConfig;
use unpackr_fsops::{DecoderRegistry, UnpackReport, UnpackRequest, UnpackService};
use unpackr_watch::{NotifyWatcher, SignalForwarder, Watcher};

use crate::cli::{Cli, Command, UnpackArgs};
use crate::error::{AppError, AppResult};
use crate::handler::UnpackHandler;

/// Entry point for the unpackr binary: parse arguments and run the command.
///
/// # Errors
///
/// Returns an error if logging, configuration or the selected command fails.
pub async fn run_app() -> AppResult<()> {
    run_app_with(Cli::parse()).await
}

/// Run an already-parsed command line.
///
/// # Errors
///
/// Returns an error if logging, configuration or the selected command fails.
pub async fn run_app_with(cli: Cli) -> AppResult<()> {
    unpackr_telemetry::init_logging(&cli.logging())
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    match cli.command() {
        Command::Watch => {
            let config = load_config(&cli.config_path()?)?;
            watch(config, UnpackService::default()).await
        }
        Command::Check => {
            let config = load_config(&cli.config_path()?)?;
            let summary = render_summary(&config, &DecoderRegistry::with_defaults());
            write_stdout(&summary)
        }
        Command::Unpack(args) => {
            let report = unpack(args).await?;
            write_stdout(&render_report(&report))
        }
    }
}

/// Load and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be read, parsed or validated.
pub fn load_config(path: &Path) -> AppResult<WatchConfig> {
    let config = WatchConfig::load(path).map_err(|err| AppError::config("config.load", err))?;
    info!(
        source = %path.display(),
        rules = config.paths().len(),
        buffer_size = config.buffer_size(),
        "configuration loaded"
    );
    Ok(config)
}

/// Watch every configured tree until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error when the native watcher or the signal handlers cannot be
/// set up, or a watcher task fails.
pub async fn watch(config: WatchConfig, service: UnpackService) -> AppResult<()> {
    for rule in config.paths() {
        if !service.decoders().supports(&rule.archive_ext) {
            warn!(
                path = %rule.name.display(),
                archive_ext = %rule.archive_ext,
                "no decoder for archive extension in this build"
            );
        }
    }

    let watcher = Watcher::new(config, UnpackHandler::new(service), NotifyWatcher::new)
        .map_err(|err| AppError::watch("watcher.new", err))?;
    let forwarder = SignalForwarder::install(watcher.control())
        .map_err(|err| AppError::watch("signals.install", err))?;
    let signals = tokio::spawn(forwarder.run());

    info!(pid = std::process::id(), "unpackr watching");
    if let Err(err) = watcher.run().await {
        signals.abort();
        return Err(AppError::watch("watcher.run", err));
    }
    signals
        .await
        .map_err(|err| AppError::join("signals.run", err))?;
    info!("unpackr stopped");
    Ok(())
}

/// Run the pipeline once for `args.directory`.
///
/// # Errors
///
/// Returns an error when any pipeline stage fails.
pub async fn unpack(args: UnpackArgs) -> AppResult<UnpackReport> {
    let request = UnpackRequest {
        directory: args.directory,
        archive_ext: unpackr_config::loader::normalize_extension(&args.archive_ext),
        remove: args.remove,
        post_command: args.post_command,
    };
    tokio::task::spawn_blocking(move || UnpackService::default().run(&request))
        .await
        .map_err(|err| AppError::join("unpack.run", err))?
        .map_err(|err| AppError::fsops("unpack.run", err))
}

/// Human-readable description of a configuration.
#[must_use]
pub fn render_summary(config: &WatchConfig, decoders: &DecoderRegistry) -> String {
    let mut out = String::new();
    let source = config
        .source()
        .map_or_else(|| "<inline>".to_string(), |path| path.display().to_string());
    let _ = writeln!(
        out,
        "config {source}: {} rule(s), buffer size {}",
        config.paths().len(),
        config.buffer_size()
    );
    for rule in config.paths() {
        let _ = writeln!(
            out,
            "  {} depth {}..={} patterns [{}] ext {}{} remove {} skip_hidden {}",
            rule.name.display(),
            rule.min_depth,
            rule.max_depth,
            rule.patterns.join(", "),
            rule.archive_ext,
            if decoders.supports(&rule.archive_ext) {
                ""
            } else {
                " (unsupported)"
            },
            rule.remove,
            rule.skip_hidden
        );
        if !rule.post_command.is_empty() {
            let _ = writeln!(out, "    post command: {}", rule.post_command);
        }
    }
    out
}

fn render_report(report: &UnpackReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "unpacked {}", report.archive.display());
    for record in &report.steps {
        let _ = writeln!(
            out,
            "  {:<15} {:<9} {}",
            record.step.as_str(),
            record.status.as_str(),
            record.detail.as_deref().unwrap_or("")
        );
    }
    out
}

fn write_stdout(text: &str) -> AppResult<()> {
    io::stdout()
        .lock()
        .write_all(text.as_bytes())
        .map_err(|source| AppError::Io {
            operation: "stdout.write",
            path: None,
            source,
        })
}
