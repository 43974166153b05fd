use crate::backend::PackageManager;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::models::PackageReference;
use tracing::{debug, warn};

/// Strips leading range operators: `^2.3.1`, `~2.3.1`, `>=2.3.1` and
/// `workspace:^2.3.1` all become `2.3.1`.
pub fn normalize_version(range: &str) -> Option<String> {
    let version = range.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    (!version.is_empty()).then(|| version.to_string())
}

/// Resolves a concrete version for `name`.
///
/// The installed tree wins because it reflects lockfile resolution; the
/// manifest's declared range is the fallback for packages not yet installed.
pub async fn resolve_version(
    backend: &dyn PackageManager,
    manifest: &Manifest,
    name: &str,
) -> Result<PackageReference> {
    match backend.installed_version(name).await {
        Ok(Some(version)) => {
            debug!("{} resolved from installed tree: {}", name, version);
            return Ok(PackageReference::new(name).with_version(version));
        }
        Ok(None) => {}
        Err(e) => warn!("Installed version lookup for {} failed: {}", name, e),
    }

    let declared = manifest.declared_range(name)?;
    declared
        .and_then(|(_, range)| normalize_version(&range))
        .map(|version| {
            debug!("{} resolved from manifest range: {}", name, version);
            PackageReference::new(name).with_version(version)
        })
        .ok_or_else(|| Error::VersionUnresolved(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct ListOnly(Result<Option<String>>);

    #[async_trait]
    impl PackageManager for ListOnly {
        fn kind(&self) -> BackendKind {
            BackendKind::Pnpm
        }

        fn commit_command(&self, _patch_dir: &Path) -> String {
            String::new()
        }

        async fn update_dependencies(&self) -> Result<()> {
            Ok(())
        }

        async fn installed_version(&self, _name: &str) -> Result<Option<String>> {
            match &self.0 {
                Ok(version) => Ok(version.clone()),
                Err(e) => Err(Error::Usage(e.to_string())),
            }
        }

        async fn create_patch(&self, _package: &PackageReference) -> Result<PathBuf> {
            unreachable!()
        }

        async fn commit_patch(&self, _patch_dir: &Path) -> Result<String> {
            unreachable!()
        }

        async fn remove_patch(&self, _package: &PackageReference, _patch_dir: Option<&Path>) -> Result<()> {
            unreachable!()
        }
    }

    fn project() -> (TempDir, Manifest) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("package.json"),
            r#"{"dependencies":{"lodash":"^4.17.0"},"devDependencies":{"vitest":"workspace:~1.6.0"}}"#,
        )
        .unwrap();
        let manifest = Manifest::new(temp_dir.path());
        (temp_dir, manifest)
    }

    #[test]
    fn test_normalize_strips_operators() {
        for range in ["^2.3.1", "~2.3.1", "2.3.1", ">=2.3.1", " workspace:^2.3.1 "] {
            assert_eq!(normalize_version(range).as_deref(), Some("2.3.1"), "{range}");
        }
        assert_eq!(normalize_version("latest"), None);
        assert_eq!(normalize_version(""), None);
    }

    #[tokio::test]
    async fn test_installed_version_wins() {
        let (_dir, manifest) = project();
        let backend = ListOnly(Ok(Some("4.17.21".to_string())));

        let package = resolve_version(&backend, &manifest, "lodash").await.unwrap();
        assert_eq!(package.version.as_deref(), Some("4.17.21"));
    }

    #[tokio::test]
    async fn test_falls_back_to_manifest_range() {
        let (_dir, manifest) = project();

        let package = resolve_version(&ListOnly(Ok(None)), &manifest, "vitest")
            .await
            .unwrap();
        assert_eq!(package.spec().unwrap(), "vitest@1.6.0");

        let failing = ListOnly(Err(Error::Usage("pnpm missing".to_string())));
        let package = resolve_version(&failing, &manifest, "lodash").await.unwrap();
        assert_eq!(package.version.as_deref(), Some("4.17.0"));
    }

    #[tokio::test]
    async fn test_unresolved_when_neither_source_knows() {
        let (_dir, manifest) = project();

        let err = resolve_version(&ListOnly(Ok(None)), &manifest, "left-pad")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionUnresolved(name) if name == "left-pad"));
    }
}
