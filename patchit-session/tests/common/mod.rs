#![allow(dead_code)]

use async_trait::async_trait;
use patchit_core::{BackendKind, EditorLauncher, Error, PackageManager, PackageReference, Result};
use patchit_session::{Key, KeySource};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

/// Records every lifecycle call in order.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub version: Option<String>,
    pub patch_dir: PathBuf,
    pub create_output: Option<String>,
    pub fail_remove: bool,
    /// When set, each commit waits for a permit before returning.
    pub gate: Option<Arc<Semaphore>>,
    /// Notified when a commit starts.
    pub commit_started: Option<mpsc::UnboundedSender<()>>,
}

impl FakeBackend {
    pub fn new(patch_dir: &Path) -> Self {
        Self {
            version: Some("4.17.21".to_string()),
            patch_dir: patch_dir.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PackageManager for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Pnpm
    }

    fn commit_command(&self, patch_dir: &Path) -> String {
        format!("fake patch-commit {}", patch_dir.display())
    }

    async fn update_dependencies(&self) -> Result<()> {
        self.record("install".to_string());
        Ok(())
    }

    async fn installed_version(&self, name: &str) -> Result<Option<String>> {
        self.record(format!("list {name}"));
        Ok(self.version.clone())
    }

    async fn create_patch(&self, package: &PackageReference) -> Result<PathBuf> {
        self.record(format!("create {}", package.name));
        match &self.create_output {
            Some(output) => patchit_core::backend::parse_patch_dir(output),
            None => Ok(self.patch_dir.clone()),
        }
    }

    async fn commit_patch(&self, patch_dir: &Path) -> Result<String> {
        self.record(format!("commit {}", patch_dir.display()));
        if let Some(started) = &self.commit_started {
            let _ = started.send(());
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        Ok("committed".to_string())
    }

    async fn remove_patch(&self, package: &PackageReference, _patch_dir: Option<&Path>) -> Result<()> {
        self.record(format!("remove {}", package.spec()?));
        if self.fail_remove {
            return Err(Error::CleanupFailed("patch-remove exploded".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEditor {
    pub opened: Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

impl EditorLauncher for FakeEditor {
    fn launch(&self, dir: &Path) -> Result<()> {
        self.opened.lock().unwrap().push(dir.to_path_buf());
        if self.fail {
            return Err(Error::EditorLaunch("no editor".to_string()));
        }
        Ok(())
    }
}

/// Replays a fixed key sequence.
pub struct ScriptedKeys(pub VecDeque<Key>);

impl ScriptedKeys {
    pub fn new(keys: &[Key]) -> Self {
        Self(keys.iter().copied().collect())
    }
}

#[async_trait]
impl KeySource for ScriptedKeys {
    async fn next_key(&mut self) -> Result<Key> {
        self.0
            .pop_front()
            .ok_or_else(|| Error::Usage("key script exhausted".to_string()))
    }
}

/// Keys fed from a channel; blocks until the test sends one.
pub struct ChannelKeys(pub mpsc::UnboundedReceiver<Key>);

#[async_trait]
impl KeySource for ChannelKeys {
    async fn next_key(&mut self) -> Result<Key> {
        self.0
            .recv()
            .await
            .ok_or_else(|| Error::Usage("key channel closed".to_string()))
    }
}

pub fn write_manifest(root: &Path, content: &str) {
    std::fs::write(root.join("package.json"), content).unwrap();
}
