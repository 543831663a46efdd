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

//! Directory watching: rule matching, change notification, rescans and the
//! control loop that ties them together.
//!
//! Layout: `matcher.rs` (path-rule gates), `handler.rs` (file-handler seam and
//! dispatch), `notifier.rs` (change-notification seam, notify backend),
//! `rescan.rs` (full tree walks), `control.rs` (watcher lifecycle),
//! `signals.rs` (OS signal forwarding), `fakes.rs` (test doubles).

pub mod control;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod fakes;
pub mod handler;
pub mod matcher;
pub mod notifier;
pub mod rescan;
pub mod signals;

pub use control::{Control, ControlHandle, Watcher};
pub use error::{WatchError, WatchResult};
pub use handler::{DispatchOutcome, FileHandler, HandlerError, dispatch};
pub use matcher::{MatchDecision, RejectReason, compile_patterns, evaluate, evaluate_with};
pub use notifier::{ChangeNotifier, EventSink, NotifyWatcher};
pub use rescan::{RescanReport, rescan};
pub use signals::{SignalForwarder, Trigger, forward_signals};
