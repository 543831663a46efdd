#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Binary entrypoint: parse the command line and run the watcher or a
//! one-shot command.

use unpackr_app::{AppResult, run_app};

/// Runs the selected command and blocks until it finishes.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
