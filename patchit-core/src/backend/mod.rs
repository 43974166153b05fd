//! Package-manager adapters.
//!
//! Each backend maps the patch lifecycle (install, create, commit, remove,
//! version lookup) onto its own commands. The session only sees
//! [`PackageManager`].

mod pnpm;
mod yarn;

pub use pnpm::{generate_patch_dir_name, generate_patch_dir_name_at, Pnpm};
pub use yarn::Yarn;

use crate::config::Config;
use crate::editor::EditorLauncher;
use crate::error::{Error, Result};
use crate::models::{BackendKind, PackageReference};
use crate::process::ProcessRunner;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::warn;

#[async_trait]
pub trait PackageManager: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human-readable form of the commit command, for manual use.
    fn commit_command(&self, patch_dir: &Path) -> String;

    async fn update_dependencies(&self) -> Result<()>;

    /// Version reported by the installed dependency tree, if any.
    async fn installed_version(&self, name: &str) -> Result<Option<String>>;

    async fn create_patch(&self, package: &PackageReference) -> Result<PathBuf>;

    async fn commit_patch(&self, patch_dir: &Path) -> Result<String>;

    async fn remove_patch(&self, package: &PackageReference, patch_dir: Option<&Path>) -> Result<()>;
}

/// Opens the patch directory in the user's editor; failures are only logged.
pub fn open_patch(editor: &dyn EditorLauncher, patch_dir: &Path) -> Result<()> {
    editor.launch(patch_dir).map_err(|e| {
        warn!("Editor launch failed for {:?}: {}", patch_dir, e);
        e
    })
}

impl BackendKind {
    pub fn adapter(&self, project_root: &Path, config: &Config, runner: ProcessRunner) -> Arc<dyn PackageManager> {
        match self {
            BackendKind::Pnpm => Arc::new(Pnpm::new(project_root, &config.scratch_dir, runner)),
            BackendKind::Yarn => Arc::new(Yarn::new(project_root, runner)),
        }
    }
}

/// Maps an install failure onto [`Error::DependencyInstallFailed`].
fn install_failed(err: Error) -> Error {
    match err {
        Error::SubprocessFailed { command, stderr, .. } => Error::DependencyInstallFailed { command, stderr },
        other => other,
    }
}

fn patch_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)edit the (?:package at|following folder):\s*([^\s(][^(\r\n]*)")
            .expect("patch directory pattern is valid")
    })
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi pattern is valid"))
}

/// Recovers the working directory from `patch` command output.
///
/// Accepts both "You can now edit the package at:" and "You can now edit
/// the following folder:" followed by the path, possibly after blank lines.
pub fn parse_patch_dir(output: &str) -> Result<PathBuf> {
    let plain = ansi_pattern().replace_all(output, "");
    patch_dir_pattern()
        .captures(&plain)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| Error::PatchDirectoryNotFound {
            output: output.to_string(),
        })
}
