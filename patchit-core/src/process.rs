use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs external commands in an explicit working directory.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `program args...` in `cwd` and returns its stdout.
    ///
    /// A non-zero exit becomes [`Error::SubprocessFailed`] carrying the
    /// captured stderr. The child is killed if the timeout elapses.
    pub async fn run<S: AsRef<OsStr>>(&self, program: &str, args: &[S], cwd: &Path) -> Result<String> {
        let command_line = display_command(program, args);
        debug!("Running `{}` in {:?}", command_line, cwd);

        let mut command = Command::new(resolve_program(program));
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child).await.map_err(|_| {
                Error::SubprocessTimeout {
                    command: command_line.clone(),
                    timeout,
                }
            })?,
            None => child.await,
        }
        .map_err(|source| Error::Spawn {
            command: command_line.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(Error::SubprocessFailed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Resolves through `PATH` so shims such as `pnpm.cmd` are found on Windows.
fn resolve_program(program: &str) -> PathBuf {
    which::which(program).unwrap_or_else(|_| PathBuf::from(program))
}

pub fn display_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        let arg = arg.as_ref().to_string_lossy();
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(&arg);
            line.push('\'');
        } else {
            line.push_str(&arg);
        }
    }
    line
}
