//! # patchit-session
//!
//! Session driver for patchit: watches a patch working copy, serializes
//! auto-commits and runs the rollback path when the user cancels.

pub mod keys;
pub mod scheduler;
pub mod session;
pub mod ui;
pub mod watcher;

pub use keys::{Key, KeySource};
pub use scheduler::{CommitScheduler, WatchState};
pub use session::{SessionOptions, SessionOutcome, SessionRunner};
pub use watcher::{ChangeKind, ChangeWatcher, WatchEvent};
