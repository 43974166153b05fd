use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Unsupported package manager: {0}")]
    UnsupportedBackend(String),

    #[error("Could not determine version of {0}")]
    VersionUnresolved(String),

    #[error("Could not find {0} in package.json dependencies")]
    DependencyNotDeclared(String),

    #[error("Could not find patch directory in package manager output")]
    PatchDirectoryNotFound { output: String },

    #[error("Dependency install failed: {command}")]
    DependencyInstallFailed { command: String, stderr: String },

    #[error("Command failed ({}): {command}", .code.map_or_else(|| "signal".to_string(), |c| format!("exit {c}")))]
    SubprocessFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command timed out after {}s: {command}", .timeout.as_secs())]
    SubprocessTimeout { command: String, timeout: Duration },

    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("Failed to launch editor: {0}")]
    EditorLaunch(String),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Invalid package.json: {0}")]
    InvalidManifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Captured standard error of the failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::SubprocessFailed { stderr, .. } | Error::DependencyInstallFailed { stderr, .. } => {
                let trimmed = stderr.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Raw command output kept for manual recovery.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Error::PatchDirectoryNotFound { output } => Some(output),
            _ => None,
        }
    }
}
