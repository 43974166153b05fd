use super::Project;
use crate::keys::KeyListener;
use crate::Cli;
use anyhow::Result;
use colored::Colorize;
use patchit_core::Mode;
use patchit_session::SessionRunner;

pub async fn run(cli: &Cli, project: &Project) -> Result<()> {
    let mode = if cli.manual {
        Mode::ManualCommitLoop
    } else {
        Mode::AutoCommitWatch
    };

    println!(
        "{} {} {}",
        "Patching".bold().cyan(),
        cli.package.bold(),
        format!("with {}", project.backend.kind()).dimmed()
    );

    let runner = SessionRunner::new(
        project.options(cli, mode),
        project.backend.clone(),
        project.editor.clone(),
        KeyListener::new(),
    );
    let outcome = runner.run().await?;

    println!();
    if outcome.rolled_back {
        println!("{}", "Patch removed, dependencies restored".green());
    } else {
        println!(
            "{} {}",
            "Done.".green().bold(),
            format!("{} patch commit(s) kept", outcome.commit_count).dimmed()
        );
    }
    Ok(())
}
