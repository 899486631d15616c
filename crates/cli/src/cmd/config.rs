//! Configuration inspection commands

use crate::config::{self, Config};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// Print the effective configuration as TOML
pub fn run_show(config: &Config, source: Option<&std::path::Path>) -> Result<()> {
    let location = match source {
        Some(path) => path.display().to_string(),
        None => match config::config_file_path() {
            Some(path) if path.exists() => path.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };
    println!("{}", "Effective Configuration".bold());
    println!("{}: {}\n", "Source".dimmed(), location.dimmed());

    let text = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{}", text);
    Ok(())
}

/// Show the default config file path
pub fn run_path() -> Result<()> {
    let path = config::config_file_path().context("Could not determine config file path")?;
    println!("{}", path.display());
    if !path.exists() {
        println!(
            "{}",
            "File does not exist. Use 'libdiff config example' for a template.".yellow()
        );
    }
    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}
