use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use patchit_core::BackendKind;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod keys;

#[derive(Parser, Debug)]
#[command(name = "patchit")]
#[command(version, about = "Edit, commit and roll back patches to installed dependencies", long_about = None)]
pub struct Cli {
    /// Package to patch, as declared in package.json
    pub package: String,

    /// Link the package to a local directory instead of patching it
    #[arg(long, value_name = "PATH")]
    pub dir: Option<String>,

    /// Skip the dependency install before and after the session
    #[arg(long)]
    pub no_update: bool,

    /// Commit on Enter instead of watching for changes
    #[arg(long)]
    pub manual: bool,

    /// Print raw package manager output and debug logs
    #[arg(long)]
    pub debug: bool,

    /// Package manager to use instead of auto-detection
    #[arg(long, value_name = "pnpm|yarn", value_parser = clap::value_parser!(BackendKind))]
    pub pm: Option<BackendKind>,

    /// Kill package manager commands that run longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.debug);

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("patchit=debug,patchit_core=debug,patchit_session=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {}", "✗".red(), err.to_string().red());
    for cause in err.chain().skip(1) {
        eprintln!("  {}: {}", "caused by".bold(), cause);
    }

    if let Some(core) = err.downcast_ref::<patchit_core::Error>() {
        if let Some(stderr) = core.stderr() {
            eprintln!("{}", stderr);
        }
        if let Some(output) = core.raw_output() {
            eprintln!("{}", "Package manager output:".bold());
            eprintln!("{}", output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_flags() {
        let cli = Cli::try_parse_from([
            "patchit",
            "lodash",
            "--manual",
            "--no-update",
            "--pm",
            "yarn",
            "--timeout",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.package, "lodash");
        assert!(cli.manual);
        assert!(cli.no_update);
        assert!(!cli.debug);
        assert_eq!(cli.pm, Some(BackendKind::Yarn));
        assert_eq!(cli.timeout, Some(30));
        assert!(cli.dir.is_none());
    }

    #[test]
    fn test_rejects_unknown_package_manager() {
        let err = Cli::try_parse_from(["patchit", "lodash", "--pm", "npm"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_package_is_required() {
        let err = Cli::try_parse_from(["patchit"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
