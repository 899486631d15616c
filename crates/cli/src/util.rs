//! Shared utilities for CLI commands

use crate::config::Config;
use anyhow::{Context, Result};
use libdiff_core::{Reconciler, Whitelist};
use libdiff_sweep::StartupSweep;
use libdiff_toolchain::Toolchain;
use libdiff_watcher::Settler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Open an existing whitelist root
pub fn open_whitelist(root: &Path) -> Result<Whitelist> {
    Whitelist::open(root)
        .with_context(|| format!("Whitelist root {} is not an accessible directory", root.display()))
}

/// Components shared by the sweep and the watch loop
pub struct Pipeline {
    pub reconciler: Arc<Reconciler>,
    pub toolchain: Arc<Toolchain>,
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(config.layout.clone())),
            toolchain: Arc::new(Toolchain::with_command(
                config.layout.clone(),
                config.toolchain.decompiler.clone(),
            )),
        }
    }
}

pub fn sweep_from_config(config: &Config) -> StartupSweep {
    StartupSweep::new(config.sweep.threads, config.sweep.wait_ceiling())
}

pub fn settler_from_config(config: &Config) -> Settler {
    Settler::new(config.watch.settle_delay(), config.watch.settle_checks)
}

/// Format an elapsed time ("850ms", "12.3s", "4m 05s")
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// "1 library", "3 libraries"
pub fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}
