//! Built-in values applied when neither a path nor the `Default` section sets a field.
//!
//! # Design
//! - Keep every fallback in one place so the loader and docs agree.
//! - Mirror the conventional scene layout: one `.sfv` per release directory.

/// Minimum depth below the watched directory.
pub const MIN_DEPTH: usize = 1;
/// Maximum depth below the watched directory.
pub const MAX_DEPTH: usize = 3;
/// Hidden files and directories are ignored unless disabled.
pub const SKIP_HIDDEN: bool = true;
/// Glob patterns matched against the changed file's base name.
pub const PATTERNS: &[&str] = &["*.sfv"];
/// Originals are kept unless removal is requested.
pub const REMOVE: bool = false;
/// Archive extension used to pick the first volume.
pub const ARCHIVE_EXT: &str = "rar";
/// No post-processing command by default.
pub const POST_COMMAND: &str = "";
/// Capacity of the change-event queue.
pub const BUFFER_SIZE: usize = 100;
