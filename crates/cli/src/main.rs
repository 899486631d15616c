//! libdiff CLI - classifies library versions by content

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cmd;
mod config;
mod locks;
mod util;

/// libdiff - exclusive, modified and copied files across library versions
#[derive(Parser)]
#[command(name = "libdiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/libdiff/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sweep worker threads (overrides the config file)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the whitelist, then watch it for new versions
    Run {
        /// Whitelist root directory
        root: PathBuf,
    },
    /// Sweep the whitelist once and exit
    Sweep {
        /// Whitelist root directory
        root: PathBuf,
    },
    /// Show per-library report status
    Status {
        /// Whitelist root directory
        root: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the default config file path
    Path,
    /// Print an example configuration
    Example,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(threads) = cli.threads {
        config.sweep.threads = threads;
        config.validate().context("Invalid --threads")?;
    }

    match cli.command {
        Commands::Run { root } => cmd::run::run(&root, &config),
        Commands::Sweep { root } => cmd::sweep::run(&root, &config),
        Commands::Status { root, json } => cmd::status::run(&root, &config, json),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::run_show(&config, cli.config.as_deref()),
            ConfigCommands::Path => cmd::config::run_path(),
            ConfigCommands::Example => cmd::config::run_example(),
        },
    }
}

/// Install the tracing subscriber
///
/// Console output goes to stderr. `RUST_LOG` applies unless `-v` is given.
/// The returned guard flushes the log file on drop.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
