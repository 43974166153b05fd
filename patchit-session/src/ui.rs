//! User-facing progress lines.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

pub fn step(message: &str) {
    println!("\n{}", message);
}

pub fn success(message: &str) {
    println!("{}", format!("✓ {}", message).green());
}

pub fn failure(message: &str) {
    println!("{}", format!("✗ {}", message).red());
}

/// Prints without a newline; the cursor stays on the prompt line.
pub fn prompt(message: &str) {
    print!("\n{}", message);
    let _ = std::io::stdout().flush();
}

pub fn hint(message: &str) {
    println!("{}", message.dimmed());
}

/// Spinner for long-running commands such as installs.
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
