use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const FALLBACK_EDITOR: &str = "code";

/// Opens a directory in an external program without waiting for it.
pub trait EditorLauncher: Send + Sync {
    fn launch(&self, dir: &Path) -> Result<()>;
}

/// `$VISUAL`/`$EDITOR`-style launcher; the command may carry arguments
/// (`"code --new-window"`).
#[derive(Debug, Clone)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Config value, then `$VISUAL`, then `$EDITOR`, then `code`.
    pub fn resolve(configured: Option<&str>) -> Self {
        let non_blank = |c: &String| !c.trim().is_empty();
        let command = configured
            .map(str::to_string)
            .filter(non_blank)
            .or_else(|| std::env::var("VISUAL").ok().filter(non_blank))
            .or_else(|| std::env::var("EDITOR").ok().filter(non_blank))
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
        Self::new(command)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn program_and_args(&self) -> Result<(PathBuf, Vec<&str>)> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::EditorLaunch("no editor configured".to_string()))?;
        let resolved = which::which(program)
            .map_err(|e| Error::EditorLaunch(format!("{program}: {e}")))?;
        Ok((resolved, parts.collect()))
    }
}

impl EditorLauncher for SystemEditor {
    fn launch(&self, dir: &Path) -> Result<()> {
        let (program, args) = self.program_and_args()?;
        Command::new(&program)
            .args(args)
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::EditorLaunch(format!("{}: {}", program.display(), e)))?;
        tracing::info!("Launched {} for {:?}", self.command, dir);
        Ok(())
    }
}
