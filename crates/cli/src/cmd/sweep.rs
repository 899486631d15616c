//! One-shot sweep of a whitelist

use crate::config::Config;
use crate::locks::RunLock;
use crate::util::{self, Pipeline};
use anyhow::{Context, Result};
use libdiff_core::Whitelist;
use libdiff_sweep::SweepSummary;
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Instant;

pub fn run(root: &Path, config: &Config) -> Result<()> {
    let whitelist = util::open_whitelist(root)?;
    let lock = RunLock::acquire(whitelist.root())?;

    let pipeline = Pipeline::from_config(config);
    let summary = sweep_whitelist(&whitelist, config, &pipeline)?;

    lock.release()?;
    if !summary.failed.is_empty() {
        println!(
            "{}",
            "Failed libraries are retried on the next sweep.".dimmed()
        );
    }
    Ok(())
}

/// Sweep every library of the whitelist and print the outcome
pub fn sweep_whitelist(
    whitelist: &Whitelist,
    config: &Config,
    pipeline: &Pipeline,
) -> Result<SweepSummary> {
    let libraries = whitelist
        .libraries()
        .context("Failed to list libraries")?;

    println!(
        "Sweeping {} in {}...",
        util::plural(libraries.len(), "library", "libraries"),
        whitelist.root().display().to_string().cyan()
    );

    let started = Instant::now();
    let summary = util::sweep_from_config(config).run(
        libraries,
        pipeline.reconciler.clone(),
        Some(pipeline.toolchain.clone()),
    );
    print_summary(&summary, started);
    Ok(summary)
}

fn print_summary(summary: &SweepSummary, started: Instant) {
    println!(
        "{} Sweep finished in {}",
        "✓".green(),
        util::format_elapsed(started.elapsed())
    );
    println!("  Reconciled:  {}", summary.reconciled);
    println!("  Up to date:  {}", summary.up_to_date);
    println!("  Prepared:    {}", util::plural(summary.prepared, "artifact", "artifacts"));

    if !summary.failed.is_empty() {
        println!("  Failed:      {}", summary.failed.len().to_string().red());
        for (library, reason) in &summary.failed {
            println!("    - {}: {}", library.display(), reason.dimmed());
        }
    }
    if summary.timed_out {
        println!(
            "{}",
            "Warning: sweep wait ceiling reached before all libraries finished".yellow()
        );
    }
}
