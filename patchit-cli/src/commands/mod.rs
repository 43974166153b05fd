pub mod link;
pub mod patch;

use crate::Cli;
use anyhow::{Context, Result};
use patchit_core::{
    detect_backend, BackendKind, Config, Detection, Error, PackageManager, ProcessRunner,
    SystemEditor,
};
use patchit_session::SessionOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a session needs that is resolved once per invocation.
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub backend: Arc<dyn PackageManager>,
    pub editor: Arc<SystemEditor>,
}

impl Project {
    pub fn open(root: &Path, pm: Option<BackendKind>, timeout: Option<u64>) -> Result<Self> {
        let config = Config::load(root).context("Failed to read .patchit.toml")?;
        let kind = select_backend(pm, &detect_backend(root), &config)?;

        let timeout = timeout.map(Duration::from_secs).or(config.command_timeout());
        let runner = ProcessRunner::new().with_timeout(timeout);
        let backend = kind.adapter(root, &config, runner);
        let editor = Arc::new(SystemEditor::resolve(config.editor.as_deref()));
        debug!("Using {} with editor {:?}", kind, editor.command());

        Ok(Self {
            root: root.to_path_buf(),
            config,
            backend,
            editor,
        })
    }

    pub fn options(&self, cli: &Cli, mode: patchit_core::Mode) -> SessionOptions {
        let mut options = SessionOptions::new(&self.root, &cli.package, mode);
        options.local_dir = cli.dir.clone();
        options.no_update = cli.no_update;
        options.debug = cli.debug;
        options.watch = self.config.watch;
        options
    }
}

/// `--pm` wins, then the nearest lockfile, then the config file.
pub fn select_backend(
    pm: Option<BackendKind>,
    detection: &Detection,
    config: &Config,
) -> patchit_core::Result<BackendKind> {
    pm.or_else(|| detection.kind())
        .or(config.package_manager)
        .ok_or_else(|| {
            Error::UnsupportedBackend(
                "no pnpm or yarn lockfile found; pass --pm to choose one".to_string(),
            )
        })
}

pub async fn run(cli: Cli) -> Result<()> {
    let root = std::env::current_dir().context("Failed to read the working directory")?;

    if let Some(dir) = &cli.dir {
        if !root.join(dir).exists() {
            return Err(Error::Usage(format!("local directory does not exist: {}", dir)).into());
        }
    }

    let project = Project::open(&root, cli.pm, cli.timeout)?;

    match cli.dir {
        Some(_) => link::run(&cli, &project).await,
        None => patch::run(&cli, &project).await,
    }
}
