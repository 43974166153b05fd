//! Drives one [`PatchSession`] from pre-flight to teardown.
//!
//! Patch modes: install, resolve version, create the working copy, open it,
//! then either commit on Enter or auto-commit on file changes until Esc.
//! Local-link mode pins `package.json` to a directory and restores it on Esc.

use crate::keys::{Key, KeySource};
use crate::ui;
use crate::watcher::{ChangeKind, ChangeWatcher, WatchEvent};
use patchit_core::backend::open_patch;
use patchit_core::{
    resolve_version, EditorLauncher, Error, Manifest, Mode, PackageManager, PackageReference,
    PatchSession, Result, SessionState, WatchSettings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const MANUAL_PROMPT: &str = "Press Enter⏎ to commit changes (Esc to remove patch and exit)...";
const WATCH_PROMPT: &str = "Press Esc to stop watching and exit...";
const LINK_PROMPT: &str =
    "Press Enter⏎ to reinstall from the local directory (Esc to restore package.json and exit)...";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub project_root: PathBuf,
    pub package: String,
    pub mode: Mode,
    /// Target of local-directory-link mode, as written into `package.json`.
    pub local_dir: Option<String>,
    pub no_update: bool,
    pub debug: bool,
    pub watch: WatchSettings,
}

impl SessionOptions {
    pub fn new(project_root: impl Into<PathBuf>, package: impl Into<String>, mode: Mode) -> Self {
        Self {
            project_root: project_root.into(),
            package: package.into(),
            mode,
            local_dir: None,
            no_update: false,
            debug: false,
            watch: WatchSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub commit_count: u32,
    /// True when the teardown undid the patch or the manifest pin.
    pub rolled_back: bool,
}

pub struct SessionRunner<K> {
    session: PatchSession,
    options: SessionOptions,
    backend: Arc<dyn PackageManager>,
    manifest: Manifest,
    editor: Arc<dyn EditorLauncher>,
    keys: K,
}

impl<K: KeySource> SessionRunner<K> {
    pub fn new(
        options: SessionOptions,
        backend: Arc<dyn PackageManager>,
        editor: Arc<dyn EditorLauncher>,
        keys: K,
    ) -> Self {
        let session = PatchSession::new(
            PackageReference::new(options.package.clone()),
            backend.kind(),
            options.mode,
        );
        let manifest = Manifest::new(&options.project_root);

        Self {
            session,
            options,
            backend,
            manifest,
            editor,
            keys,
        }
    }

    pub fn session(&self) -> &PatchSession {
        &self.session
    }

    pub async fn run(mut self) -> Result<SessionOutcome> {
        info!(
            "Starting {} session for {} with {}",
            self.session.mode.as_str(),
            self.session.package,
            self.session.backend
        );

        match self.session.mode {
            Mode::LocalDirectoryLink => self.run_local_link().await,
            Mode::ManualCommitLoop | Mode::AutoCommitWatch => self.run_patch().await,
        }
    }

    async fn run_patch(&mut self) -> Result<SessionOutcome> {
        if !self.options.no_update {
            self.update_dependencies().await?;
        }

        self.session.package =
            resolve_version(self.backend.as_ref(), &self.manifest, &self.options.package).await?;

        self.session.transition(SessionState::PatchCreating)?;
        ui::step(&format!(
            "Creating patch directory for {}...",
            self.session.package.name
        ));
        let patch_dir = self.backend.create_patch(&self.session.package).await?;
        ui::success(&format!("Patch created at: {}", patch_dir.display()));
        self.session.patch_dir = Some(patch_dir.clone());

        self.session.transition(SessionState::PatchOpen)?;
        self.open(&patch_dir);

        ui::step("commit command:");
        println!("  {}", self.backend.commit_command(&patch_dir));

        match self.session.mode {
            Mode::AutoCommitWatch => self.watch_loop(&patch_dir).await,
            _ => self.manual_loop(&patch_dir).await,
        }
    }

    async fn manual_loop(&mut self, patch_dir: &Path) -> Result<SessionOutcome> {
        self.session.transition(SessionState::ManualLoop)?;
        let commit_command = self.backend.commit_command(patch_dir);

        loop {
            ui::prompt(MANUAL_PROMPT);
            match self.keys.next_key().await? {
                Key::Confirm => {
                    ui::step(&format!("Running: {}", commit_command));
                    let output = self.backend.commit_patch(patch_dir).await?;
                    if self.options.debug {
                        println!("{}", output);
                    }
                    let count = self.session.record_commit();
                    ui::success(&format!("Patch #{} committed", count));
                    if count == 1 {
                        ui::hint(
                            "\nYou can continue editing and press Enter again to commit more changes.",
                        );
                    }
                }
                Key::Cancel => break,
            }
        }

        // A committed patch is already recorded; only the working copy is abandoned.
        let rolled_back = if self.session.commit_count > 0 {
            ui::hint(&format!(
                "\nKeeping {} committed patch(es) for {}",
                self.session.commit_count, self.session.package
            ));
            false
        } else {
            self.remove_patch(Some(patch_dir)).await;
            if !self.options.no_update {
                self.update_dependencies().await?;
            }
            true
        };

        self.finish(rolled_back)
    }

    async fn watch_loop(&mut self, patch_dir: &Path) -> Result<SessionOutcome> {
        self.session.transition(SessionState::WatchLoop)?;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let watcher = ChangeWatcher::start(
            patch_dir,
            Arc::clone(&self.backend),
            self.options.watch,
            events_tx,
        )?;

        ui::step("Hot reload enabled - changes will be auto-committed");
        ui::prompt(WATCH_PROMPT);

        let cancelled = loop {
            tokio::select! {
                key = self.keys.next_key() => match key {
                    Ok(Key::Cancel) => break Ok(()),
                    Ok(Key::Confirm) => {}
                    Err(e) => break Err(e),
                },
                Some(event) = events_rx.recv() => self.report(event),
            }
        };

        // Stop the watcher before any rollback so no commit can race it.
        self.session.commit_count = watcher.close().await;
        while let Ok(event) = events_rx.try_recv() {
            self.report(event);
        }
        cancelled?;

        if self.session.commit_count > 0 {
            warn!(
                "Watch session rolls back {} auto-commit(s) of {} on exit",
                self.session.commit_count, self.session.package
            );
        }
        self.remove_patch(Some(patch_dir)).await;
        if !self.options.no_update {
            self.update_dependencies().await?;
        }

        self.finish(true)
    }

    async fn run_local_link(&mut self) -> Result<SessionOutcome> {
        let dir = self.options.local_dir.clone().ok_or_else(|| {
            Error::Usage("local-directory-link mode needs a directory".to_string())
        })?;

        self.session.transition(SessionState::LocalLinkOpen)?;

        ui::step("Updating package.json to use local dir...");
        let edit = self
            .manifest
            .pin_local_directory(&self.options.package, &dir)?;
        ui::success(&format!("Updated {} to use: {}", self.options.package, dir));

        let linked = self.local_link_loop(&dir).await;

        ui::step("Restoring package.json...");
        match (self.manifest.revert(&edit), linked) {
            (Ok(()), linked) => {
                ui::success(&format!("Restored {}", self.options.package));
                linked?;
            }
            (Err(revert), Ok(())) => return Err(revert),
            (Err(revert), Err(linked)) => {
                warn!("Local link session failed before restore: {}", linked);
                return Err(Error::CleanupFailed(format!(
                    "could not restore package.json ({revert}) after: {linked}"
                )));
            }
        }

        self.update_dependencies().await?;
        self.finish(true)
    }

    async fn local_link_loop(&mut self, dir: &str) -> Result<()> {
        self.update_dependencies().await?;
        self.open(&self.options.project_root.join(dir));

        loop {
            ui::prompt(LINK_PROMPT);
            match self.keys.next_key().await? {
                Key::Confirm => self.update_dependencies().await?,
                Key::Cancel => return Ok(()),
            }
        }
    }

    fn finish(&mut self, rolled_back: bool) -> Result<SessionOutcome> {
        self.session.transition(SessionState::Terminated)?;
        Ok(SessionOutcome {
            commit_count: self.session.commit_count,
            rolled_back,
        })
    }

    fn report(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Detected { kind, path } => {
                let label = match kind {
                    ChangeKind::Added => "Detected new file",
                    ChangeKind::Changed => "Detected change",
                    ChangeKind::Removed => "Detected deletion",
                };
                ui::step(&format!("{}: {}", label, path.display()));
            }
            WatchEvent::Committed { count, output } => {
                if self.options.debug {
                    println!("{}", output);
                }
                self.session.commit_count = count;
                ui::success(&format!("Patch #{} auto-committed", count));
                ui::prompt(WATCH_PROMPT);
            }
            WatchEvent::CommitFailed { message, stderr } => {
                ui::failure(&format!("Failed to commit: {}", message));
                if let Some(stderr) = stderr {
                    eprintln!("{}", stderr);
                }
            }
            WatchEvent::Error(message) => ui::failure(&format!("Watcher error: {}", message)),
        }
    }

    async fn update_dependencies(&self) -> Result<()> {
        ui::step("Installing latest dependencies...");
        let spinner = ui::spinner(&format!("{} install", self.backend.kind()));
        let result = self.backend.update_dependencies().await;
        spinner.finish_and_clear();
        result?;
        ui::success("Dependencies updated");
        Ok(())
    }

    /// Best-effort: a failed cleanup is reported and the session still exits.
    async fn remove_patch(&self, patch_dir: Option<&Path>) {
        ui::step("Removing patch...");
        match self
            .backend
            .remove_patch(&self.session.package, patch_dir)
            .await
        {
            Ok(()) => ui::success("Patch removed"),
            Err(e) => {
                warn!("Patch removal for {} failed: {}", self.session.package, e);
                ui::failure(&format!("Failed to remove patch: {}", e));
            }
        }
    }

    fn open(&self, dir: &Path) {
        ui::step("Opening patch dir...");
        match open_patch(self.editor.as_ref(), dir) {
            Ok(()) => ui::success("Opened"),
            Err(e) => ui::failure(&format!(
                "Failed to open patch directory automatically: {}. Please open it manually: {}",
                e,
                dir.display()
            )),
        }
    }
}
