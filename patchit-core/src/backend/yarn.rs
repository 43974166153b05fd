use super::{install_failed, parse_patch_dir, PackageManager};
use crate::error::{Error, Result};
use crate::models::{BackendKind, PackageReference};
use crate::process::{display_command, ProcessRunner};
use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PROGRAM: &str = "yarn";

/// yarn berry. `yarn patch` has no output-directory flag, so the working
/// copy is recovered from its output.
pub struct Yarn {
    root: PathBuf,
    runner: ProcessRunner,
}

impl Yarn {
    pub fn new(project_root: &Path, runner: ProcessRunner) -> Self {
        Self {
            root: project_root.to_path_buf(),
            runner,
        }
    }

    async fn yarn<S: AsRef<std::ffi::OsStr>>(&self, args: &[S]) -> Result<String> {
        self.runner.run(PROGRAM, args, &self.root).await
    }
}

/// Reads `children.Version` from `yarn info --json` (one JSON object per line).
fn version_from_info(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
        .find_map(|record| {
            record
                .get("children")?
                .get("Version")?
                .as_str()
                .map(str::to_string)
        })
}

#[async_trait]
impl PackageManager for Yarn {
    fn kind(&self) -> BackendKind {
        BackendKind::Yarn
    }

    fn commit_command(&self, patch_dir: &Path) -> String {
        display_command(
            PROGRAM,
            &[OsString::from("patch-commit"), "-s".into(), patch_dir.into()],
        )
    }

    async fn update_dependencies(&self) -> Result<()> {
        self.yarn(&["install"]).await.map_err(install_failed)?;
        Ok(())
    }

    async fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = self.yarn(&["info", name, "--json"]).await?;
        let version = version_from_info(&output);
        if version.is_none() {
            debug!("yarn info reported no version for {}", name);
        }
        Ok(version)
    }

    async fn create_patch(&self, package: &PackageReference) -> Result<PathBuf> {
        let output = self.yarn(&["patch", package.name.as_str()]).await?;
        let patch_dir = parse_patch_dir(&output)?;
        info!("yarn patch working copy at {:?}", patch_dir);
        Ok(patch_dir)
    }

    async fn commit_patch(&self, patch_dir: &Path) -> Result<String> {
        let args: [OsString; 3] = ["patch-commit".into(), "-s".into(), patch_dir.as_os_str().into()];
        self.yarn(&args).await
    }

    async fn remove_patch(&self, package: &PackageReference, patch_dir: Option<&Path>) -> Result<()> {
        // Editing .yarn/patches and the resolutions field is yarn's own storage format.
        warn!("yarn has no patch removal command; {} stays registered", package);

        if let Some(dir) = patch_dir {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => debug!("Removed working copy {:?}", dir),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::CleanupFailed(format!(
                        "could not delete {}: {}",
                        dir.display(),
                        e
                    )))
                }
            }
        }

        Ok(())
    }
}
