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

//! File-backed watch configuration.
//!
//! Layout: `model.rs` (typed path rules and the watch config), `loader.rs`
//! (JSON document parsing and default merging), `validate.rs` (rule checks),
//! `defaults.rs` (built-in fallback values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{PathRule, WatchConfig};
