use patchit_core::{PackageManager, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::watcher::WatchEvent;

/// Single-flight bookkeeping for auto-commits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchState {
    in_flight: bool,
    pending: bool,
    commits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Start,
    Deferred,
}

impl WatchState {
    pub fn commits(&self) -> u32 {
        self.commits
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    /// A commit was asked for. Only one runs at a time; the rest collapse
    /// into a single pending flag.
    pub fn request(&mut self) -> Request {
        if self.in_flight {
            self.pending = true;
            Request::Deferred
        } else {
            self.in_flight = true;
            self.pending = false;
            Request::Start
        }
    }

    /// The running commit finished. Returns true when exactly one follow-up
    /// commit must run; the slot then stays taken until it completes.
    pub fn complete(&mut self, success: bool) -> bool {
        if success {
            self.commits += 1;
        }
        if self.pending {
            self.pending = false;
            true
        } else {
            self.in_flight = false;
            false
        }
    }
}

/// Serializes commit attempts for one patch directory.
pub struct CommitScheduler {
    trigger_tx: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    handle: JoinHandle<u32>,
}

impl CommitScheduler {
    pub fn spawn(
        backend: Arc<dyn PackageManager>,
        patch_dir: PathBuf,
        retry_delay: Duration,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = Driver {
            backend,
            patch_dir,
            retry_delay,
            events,
            state: WatchState::default(),
        };
        let handle = tokio::spawn(driver.run(trigger_rx, cancel.clone()));

        Self {
            trigger_tx,
            cancel,
            handle,
        }
    }

    /// Sender that requests a commit; usable from non-async threads.
    pub fn trigger_handle(&self) -> mpsc::UnboundedSender<()> {
        self.trigger_tx.clone()
    }

    pub fn trigger(&self) {
        let _ = self.trigger_tx.send(());
    }

    /// Stops accepting triggers and cancels any scheduled follow-up.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the scheduler and waits for an in-flight commit to finish.
    /// No commit starts after this returns. Returns the commit count.
    pub async fn close(self) -> u32 {
        self.stop();
        match self.handle.await {
            Ok(commits) => commits,
            Err(e) => {
                warn!("Commit scheduler task failed: {}", e);
                0
            }
        }
    }
}

struct Driver {
    backend: Arc<dyn PackageManager>,
    patch_dir: PathBuf,
    retry_delay: Duration,
    events: mpsc::UnboundedSender<WatchEvent>,
    state: WatchState,
}

impl Driver {
    async fn run(mut self, mut triggers: mpsc::UnboundedReceiver<()>, cancel: CancellationToken) -> u32 {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Result<String>>();
        let mut follow_up_at: Option<Instant> = None;

        loop {
            let deadline = follow_up_at.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(result) = done_rx.recv() => {
                    if self.finish(result) {
                        follow_up_at = Some(Instant::now() + self.retry_delay);
                    }
                }

                _ = tokio::time::sleep_until(deadline), if follow_up_at.is_some() => {
                    follow_up_at = None;
                    debug!("Running follow-up commit");
                    self.start(&done_tx);
                }

                trigger = triggers.recv() => match trigger {
                    Some(()) => {
                        if self.state.request() == Request::Start {
                            self.start(&done_tx);
                        } else {
                            debug!("Commit in flight; follow-up requested");
                        }
                    }
                    None => break,
                },
            }
        }

        // A scheduled follow-up is dropped; a running commit is awaited so
        // teardown never overlaps it.
        if self.state.in_flight() && follow_up_at.is_none() {
            if let Some(result) = done_rx.recv().await {
                self.state.pending = false;
                self.finish(result);
            }
        }

        self.state.commits()
    }

    fn start(&self, done_tx: &mpsc::UnboundedSender<Result<String>>) {
        let backend = Arc::clone(&self.backend);
        let patch_dir = self.patch_dir.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = backend.commit_patch(&patch_dir).await;
            let _ = done_tx.send(result);
        });
    }

    fn finish(&mut self, result: Result<String>) -> bool {
        let success = result.is_ok();
        let follow_up = self.state.complete(success);
        let event = match result {
            Ok(output) => WatchEvent::Committed {
                count: self.state.commits(),
                output,
            },
            Err(e) => WatchEvent::CommitFailed {
                message: e.to_string(),
                stderr: e.stderr().map(str::to_string),
            },
        };
        let _ = self.events.send(event);
        follow_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_starts_when_idle() {
        let mut state = WatchState::default();
        assert_eq!(state.request(), Request::Start);
        assert!(state.in_flight());
        assert!(!state.pending());
    }

    #[test]
    fn test_any_number_of_requests_collapse_to_one_follow_up() {
        for n in 1..=50 {
            let mut state = WatchState::default();
            assert_eq!(state.request(), Request::Start);

            for _ in 0..n {
                assert_eq!(state.request(), Request::Deferred);
            }

            assert!(state.complete(true), "n = {n}");
            assert!(state.in_flight());
            assert!(!state.complete(true), "n = {n}");
            assert!(!state.in_flight());
            assert_eq!(state.commits(), 2);
        }
    }

    #[test]
    fn test_no_follow_up_without_requests() {
        let mut state = WatchState::default();
        state.request();
        assert!(!state.complete(true));
        assert_eq!(state.request(), Request::Start);
    }

    #[test]
    fn test_failed_commit_is_not_counted() {
        let mut state = WatchState::default();
        state.request();
        state.request();
        assert!(state.complete(false));
        assert!(!state.complete(true));
        assert_eq!(state.commits(), 1);
    }
}
