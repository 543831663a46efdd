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
#![allow(clippy::module_name_repetitions)]

//! unpackr application wiring.
//!
//! Layout: `cli.rs` (arguments), `bootstrap.rs` (command dispatch and watcher
//! startup), `handler.rs` (watcher to pipeline glue), `error.rs`.

/// Command dispatch and watcher startup.
pub mod bootstrap;
/// Command-line arguments.
pub mod cli;
/// Application error type.
pub mod error;
/// File handler running the unpack pipeline.
pub mod handler;

pub use bootstrap::{run_app, run_app_with};
pub use error::{AppError, AppResult};
pub use handler::UnpackHandler;
