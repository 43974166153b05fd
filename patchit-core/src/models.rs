use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identity of the dependency under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub name: String,
    pub version: Option<String>,
}

impl PackageReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// `name@version`, as accepted by the backends' removal commands.
    pub fn spec(&self) -> Result<String> {
        match &self.version {
            Some(version) => Ok(format!("{}@{}", self.name, version)),
            None => Err(Error::VersionUnresolved(self.name.clone())),
        }
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Pnpm,
    Yarn,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Pnpm, BackendKind::Yarn];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Pnpm => "pnpm",
            BackendKind::Yarn => "yarn",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pnpm" => Ok(BackendKind::Pnpm),
            "yarn" => Ok(BackendKind::Yarn),
            other => Err(Error::UnsupportedBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ManualCommitLoop,
    AutoCommitWatch,
    LocalDirectoryLink,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ManualCommitLoop => "manual-commit-loop",
            Mode::AutoCommitWatch => "auto-commit-watch",
            Mode::LocalDirectoryLink => "local-directory-link",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PatchCreating,
    PatchOpen,
    ManualLoop,
    WatchLoop,
    LocalLinkOpen,
    Terminated,
}

impl SessionState {
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, PatchCreating)
                | (Idle, LocalLinkOpen)
                | (PatchCreating, PatchOpen)
                | (PatchOpen, ManualLoop)
                | (PatchOpen, WatchLoop)
                | (ManualLoop, Terminated)
                | (WatchLoop, Terminated)
                | (LocalLinkOpen, Terminated)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The unit of work for one invocation.
#[derive(Debug, Clone)]
pub struct PatchSession {
    pub package: PackageReference,
    pub patch_dir: Option<PathBuf>,
    pub backend: BackendKind,
    pub mode: Mode,
    pub commit_count: u32,
    state: SessionState,
}

impl PatchSession {
    pub fn new(package: PackageReference, backend: BackendKind, mode: Mode) -> Self {
        Self {
            package,
            patch_dir: None,
            backend,
            mode,
            commit_count: 0,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("session {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn record_commit(&mut self) -> u32 {
        self.commit_count += 1;
        self.commit_count
    }
}
