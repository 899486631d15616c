//! Sweep, then watch the whitelist until interrupted

use crate::config::Config;
use crate::locks::RunLock;
use crate::util::{self, Pipeline};
use anyhow::{bail, Context, Result};
use libdiff_sweep::SweepSummary;
use libdiff_watcher::{native_backend, WatchEngine};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, config: &Config) -> Result<()> {
    // 1. Exclusive access to the whitelist
    let whitelist = util::open_whitelist(root)?;
    let lock = RunLock::acquire(whitelist.root())?;

    // 2. Bring every library up to date before watching
    let pipeline = Pipeline::from_config(config);
    let summary = super::sweep::sweep_whitelist(&whitelist, config, &pipeline)?;
    ensure_sweep_finished(&summary, config.sweep.wait_ceiling())?;

    // 3. Register the whole tree; failure here is fatal
    let (backend, events) = native_backend().context("Failed to start file watcher")?;
    let mut engine = WatchEngine::start(
        whitelist,
        backend,
        pipeline.reconciler.clone(),
        pipeline.toolchain.clone(),
        util::settler_from_config(config),
    )
    .context("Failed to register whitelist directories")?;

    println!(
        "{} Watching {} directories {}",
        "✓".green(),
        engine.state().len(),
        "(Ctrl-C to stop)".dimmed()
    );

    // 4. Blocks until every watched directory is gone
    engine.run(events);

    println!("{}", "All watched directories are gone, exiting.".yellow());
    lock.release()?;
    Ok(())
}

/// Watching starts only once no sweep worker can still write reports
fn ensure_sweep_finished(summary: &SweepSummary, ceiling: Duration) -> Result<()> {
    if summary.timed_out {
        bail!(
            "Sweep did not finish within {}s; not watching while libraries are still \
             being reconciled (raise sweep.wait_ceiling_secs)",
            ceiling.as_secs()
        );
    }
    Ok(())
}
