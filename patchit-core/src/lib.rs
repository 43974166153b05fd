//! # patchit-core
//!
//! Core library for patchit - editing installed dependencies and recording
//! the result as package-manager patches.
//!
//! This crate provides the data model, the pnpm and yarn adapters, the
//! `package.json` mutator and version resolution used by the session driver.

pub mod backend;
pub mod config;
pub mod detect;
pub mod editor;
pub mod error;
pub mod manifest;
pub mod models;
pub mod process;
pub mod version;

pub use backend::PackageManager;
pub use config::{Config, WatchSettings};
pub use detect::{detect_backend, Detection};
pub use editor::{EditorLauncher, SystemEditor};
pub use error::{Error, Result};
pub use manifest::{DependencyGroup, Manifest, ManifestEdit, ManifestEntry};
pub use models::{BackendKind, Mode, PackageReference, PatchSession, SessionState};
pub use process::ProcessRunner;
pub use version::{normalize_version, resolve_version};
