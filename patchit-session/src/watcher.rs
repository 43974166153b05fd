use crate::scheduler::CommitScheduler;
use notify::{EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use patchit_core::{Error, PackageManager, Result, WatchSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// What the watcher reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Detected { kind: ChangeKind, path: PathBuf },
    Committed { count: u32, output: String },
    CommitFailed { message: String, stderr: Option<String> },
    Error(String),
}

/// Watches a patch directory and auto-commits settled changes.
pub struct ChangeWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
    scheduler: CommitScheduler,
}

impl ChangeWatcher {
    pub fn start(
        patch_dir: &Path,
        backend: Arc<dyn PackageManager>,
        settings: WatchSettings,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let scheduler = CommitScheduler::spawn(
            backend,
            patch_dir.to_path_buf(),
            settings.retry_delay(),
            events.clone(),
        );
        let triggers = scheduler.trigger_handle();

        let mut debouncer = new_debouncer(
            settings.stability_threshold(),
            Some(settings.poll_interval()),
            move |result: DebounceEventResult| match result {
                Ok(batch) => {
                    let mut settled = false;
                    for event in batch {
                        let Some(kind) = Self::classify(&event.event.kind) else {
                            continue;
                        };
                        for path in &event.event.paths {
                            let _ = events.send(WatchEvent::Detected {
                                kind,
                                path: path.clone(),
                            });
                        }
                        settled = true;
                    }
                    if settled {
                        let _ = triggers.send(());
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watch error: {:?}", e);
                        let _ = events.send(WatchEvent::Error(e.to_string()));
                    }
                }
            },
        )
        .map_err(|e| Error::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(patch_dir, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(e.to_string()))?;

        info!("File watcher started for {:?}", patch_dir);

        Ok(Self {
            debouncer,
            scheduler,
        })
    }

    fn classify(kind: &EventKind) -> Option<ChangeKind> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Added),
            EventKind::Modify(_) => Some(ChangeKind::Changed),
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            _ => None,
        }
    }

    /// Ends the subscription, then drains the scheduler. Returns the number
    /// of successful auto-commits.
    pub async fn close(self) -> u32 {
        self.scheduler.stop();
        self.debouncer.stop();
        let commits = self.scheduler.close().await;
        info!("File watcher stopped after {} commit(s)", commits);
        commits
    }
}
