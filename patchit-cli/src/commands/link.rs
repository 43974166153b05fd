use super::Project;
use crate::keys::KeyListener;
use crate::Cli;
use anyhow::Result;
use colored::Colorize;
use patchit_core::Mode;
use patchit_session::SessionRunner;

pub async fn run(cli: &Cli, project: &Project) -> Result<()> {
    let dir = cli.dir.as_deref().unwrap_or_default();
    println!(
        "{} {} {} {}",
        "Linking".bold().cyan(),
        cli.package.bold(),
        "to".dimmed(),
        dir
    );

    let runner = SessionRunner::new(
        project.options(cli, Mode::LocalDirectoryLink),
        project.backend.clone(),
        project.editor.clone(),
        KeyListener::new(),
    );
    runner.run().await?;

    println!();
    println!("{}", "package.json restored".green());
    Ok(())
}
