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

//! Verification and extraction pipeline for release directories.
//!
//! Layout: `checksum.rs` (SFV lists and CRC32), `volume.rs` (first-volume
//! selection), `decoder/` (archive formats), `extract.rs` (recursive
//! extraction), `command.rs` (post-process hook), `service.rs` (the staged
//! pipeline), `model.rs` (requests and reports), `error.rs`.

pub mod checksum;
pub mod command;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod model;
pub mod service;
pub mod volume;

pub use checksum::{ChecksumEntry, ChecksumSet};
pub use decoder::{ArchiveDecoder, ArchiveEntry, DecoderRegistry, EntryContent, StreamContent};
pub use error::{FsOpsError, FsOpsResult};
pub use extract::{ExtractStats, MAX_NESTED_ARCHIVES};
pub use model::{StepKind, StepRecord, StepStatus, UnpackReport, UnpackRequest};
pub use service::UnpackService;
pub use volume::ArchiveHandle;
