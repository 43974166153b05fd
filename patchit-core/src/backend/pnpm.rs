use super::{install_failed, PackageManager};
use crate::error::{Error, Result};
use crate::models::{BackendKind, PackageReference};
use crate::process::{display_command, ProcessRunner};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROGRAM: &str = "pnpm";

pub struct Pnpm {
    program: String,
    root: PathBuf,
    scratch_dir: PathBuf,
    runner: ProcessRunner,
}

impl Pnpm {
    pub fn new(project_root: &Path, scratch_dir: &str, runner: ProcessRunner) -> Self {
        Self {
            program: PROGRAM.to_string(),
            root: project_root.to_path_buf(),
            scratch_dir: project_root.join("node_modules").join(scratch_dir),
            runner,
        }
    }

    /// Runs a different `pnpm` executable, such as a pinned install.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    async fn pnpm<S: AsRef<std::ffi::OsStr>>(&self, args: &[S]) -> Result<String> {
        self.runner.run(&self.program, args, &self.root).await
    }
}

/// Directory name for a patch working copy: the package name made
/// filesystem-safe plus a minute-resolution local timestamp.
///
/// Two calls within the same minute return the same name.
pub fn generate_patch_dir_name(name: &str) -> String {
    generate_patch_dir_name_at(name, &Local::now())
}

pub fn generate_patch_dir_name_at<Tz: TimeZone>(name: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let safe_name = name.replace(['@', '/'], "-");
    let safe_name = safe_name.trim_start_matches('-');
    format!("{}-{}", safe_name, at.format("%Y-%m-%d-%H%M"))
}

/// Reads `[0].dependencies[name].version` (or `devDependencies`) from
/// `pnpm list --json` output.
fn version_from_list(output: &str, name: &str) -> Option<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return None;
    }

    let listing: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            debug!("Unparseable pnpm list output: {}", e);
            return None;
        }
    };

    let project = listing.get(0)?;
    ["dependencies", "devDependencies"]
        .iter()
        .find_map(|group| project.get(group)?.get(name)?.get("version")?.as_str())
        .filter(|version| version.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::to_string)
}

#[async_trait]
impl PackageManager for Pnpm {
    fn kind(&self) -> BackendKind {
        BackendKind::Pnpm
    }

    fn commit_command(&self, patch_dir: &Path) -> String {
        display_command(&self.program, &[OsString::from("patch-commit"), patch_dir.into()])
    }

    async fn update_dependencies(&self) -> Result<()> {
        self.pnpm(&["install"]).await.map_err(install_failed)?;
        Ok(())
    }

    async fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = self.pnpm(&["list", name, "--json", "--depth=0"]).await?;
        Ok(version_from_list(&output, name))
    }

    async fn create_patch(&self, package: &PackageReference) -> Result<PathBuf> {
        let patch_dir = self.scratch_dir.join(generate_patch_dir_name(&package.name));
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let args: [OsString; 4] = [
            "patch".into(),
            package.name.as_str().into(),
            "--edit-dir".into(),
            patch_dir.as_os_str().into(),
        ];
        self.pnpm(&args).await?;

        info!("pnpm patch working copy at {:?}", patch_dir);
        Ok(patch_dir)
    }

    async fn commit_patch(&self, patch_dir: &Path) -> Result<String> {
        let args: [OsString; 2] = ["patch-commit".into(), patch_dir.as_os_str().into()];
        self.pnpm(&args).await
    }

    async fn remove_patch(&self, package: &PackageReference, patch_dir: Option<&Path>) -> Result<()> {
        let spec = package.spec()?;
        let removed = self.pnpm(&["patch-remove", spec.as_str()]).await;

        // The working copy goes even when pnpm had no committed patch to drop.
        let deleted = match patch_dir {
            Some(dir) => match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {
                    debug!("Removed working copy {:?}", dir);
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(format!("could not delete {}: {}", dir.display(), e)),
            },
            None => Ok(()),
        };

        let removed = removed.map_err(|e| match e.stderr() {
            Some(stderr) => format!("{e}: {stderr}"),
            None => e.to_string(),
        });

        match (removed, deleted) {
            (Ok(_), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(Error::CleanupFailed(e)),
            (Err(removal), Err(deletion)) => {
                Err(Error::CleanupFailed(format!("{removal}; {deletion}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_dir_name_is_filesystem_safe() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 42).unwrap();
        let name = generate_patch_dir_name_at("@scope/pkg", &at);

        assert_eq!(name, "scope-pkg-2026-03-07-0905");
        assert!(!name.contains('@'));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_dir_name_is_stable_within_a_minute() {
        let first = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 7, 9, 6, 0).unwrap();

        assert_eq!(
            generate_patch_dir_name_at("lodash", &first),
            generate_patch_dir_name_at("lodash", &second)
        );
        assert_ne!(
            generate_patch_dir_name_at("lodash", &first),
            generate_patch_dir_name_at("lodash", &later)
        );
    }

    #[test]
    fn test_dir_name_with_local_clock() {
        let name = generate_patch_dir_name("@types/node");
        assert!(name.starts_with("types-node-"));
        assert!(!name.contains('@'));
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_version_from_list() {
        let output = r#"[
          {
            "name": "app",
            "dependencies": {
              "lodash": { "from": "lodash", "version": "4.17.21" }
            },
            "devDependencies": {
              "vitest": { "from": "vitest", "version": "1.6.0" }
            }
          }
        ]"#;

        assert_eq!(version_from_list(output, "lodash").as_deref(), Some("4.17.21"));
        assert_eq!(version_from_list(output, "vitest").as_deref(), Some("1.6.0"));
        assert_eq!(version_from_list(output, "zod"), None);
    }

    #[test]
    fn test_version_from_list_tolerates_noise() {
        assert_eq!(version_from_list("", "lodash"), None);
        assert_eq!(version_from_list("[]", "lodash"), None);
        assert_eq!(version_from_list("not json", "lodash"), None);

        let linked = r#"[{"dependencies":{"lodash":{"version":"link:../lodash"}}}]"#;
        assert_eq!(version_from_list(linked, "lodash"), None);
    }

    #[test]
    fn test_scratch_dir_lives_under_node_modules() {
        let pnpm = Pnpm::new(Path::new("/work/app"), ".patchit", ProcessRunner::new());
        assert_eq!(pnpm.scratch_dir(), Path::new("/work/app/node_modules/.patchit"));
        assert_eq!(
            pnpm.commit_command(Path::new("/work/app/node_modules/.patchit/lodash-x")),
            "pnpm patch-commit /work/app/node_modules/.patchit/lodash-x"
        );
    }

    #[tokio::test]
    async fn test_remove_requires_concrete_version() {
        let pnpm = Pnpm::new(Path::new("/work/app"), ".patchit", ProcessRunner::new());
        let err = pnpm
            .remove_patch(&PackageReference::new("lodash"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionUnresolved(_)));
    }

    /// A `pnpm` stand-in: `sh patch-remove <spec>` runs the `patch-remove`
    /// script in the project root, which fails the way pnpm does when no
    /// patch was committed.
    #[cfg(unix)]
    fn failing_pnpm(root: &Path) -> Pnpm {
        std::fs::write(
            root.join("patch-remove"),
            "echo 'ERR_PNPM_NO_PATCHES_TO_REMOVE No patch found' >&2\nexit 1\n",
        )
        .unwrap();
        Pnpm::new(root, ".patchit", ProcessRunner::new()).with_program("sh")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_deletes_working_copy_when_pnpm_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let patch_dir = temp_dir.path().join("node_modules/.patchit/lodash-2026-03-07-0905");
        std::fs::create_dir_all(patch_dir.join("lib")).unwrap();
        std::fs::write(patch_dir.join("lib/index.js"), "edited").unwrap();

        let pnpm = failing_pnpm(temp_dir.path());

        let err = pnpm
            .remove_patch(
                &PackageReference::new("lodash").with_version("4.17.21"),
                Some(&patch_dir),
            )
            .await
            .unwrap_err();

        match err {
            Error::CleanupFailed(message) => {
                assert!(message.contains("ERR_PNPM_NO_PATCHES_TO_REMOVE"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!patch_dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remove_tolerates_missing_working_copy() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pnpm = failing_pnpm(temp_dir.path());

        let err = pnpm
            .remove_patch(
                &PackageReference::new("lodash").with_version("4.17.21"),
                Some(&temp_dir.path().join("gone")),
            )
            .await
            .unwrap_err();

        // Only the pnpm failure is reported.
        match err {
            Error::CleanupFailed(message) => assert!(!message.contains("could not delete")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
