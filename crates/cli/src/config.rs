//! User configuration
//!
//! Loaded from `--config <path>` or `<config_dir>/libdiff/config.toml`. A
//! missing default file means defaults; an explicitly named file must exist.

use anyhow::{bail, Context, Result};
use libdiff_core::Layout;
use libdiff_toolchain::decompile::{ARTIFACT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sweep: SweepConfig,
    pub watch: WatchConfig,
    pub layout: Layout,
    pub toolchain: ToolchainConfig,
}

/// Startup sweep settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Worker threads (1-256)
    pub threads: usize,
    /// Upper bound on waiting for the pool, in seconds (1-31536000)
    pub wait_ceiling_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            wait_ceiling_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl SweepConfig {
    pub fn wait_ceiling(&self) -> Duration {
        Duration::from_secs(self.wait_ceiling_secs)
    }
}

/// Watch loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Fixed delay before acting on a new file, in milliseconds (0-60000)
    pub settle_ms: u64,
    /// Size stability checks after the delay (1-100)
    pub settle_checks: u8,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            settle_checks: 5,
        }
    }
}

impl WatchConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// External tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Decompiler command line; `{artifact}` and `{output}` are substituted
    pub decompiler: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            decompiler: ["java", "-jar", "procyon-decompiler.jar", "{artifact}", "-o", "{output}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Check every value is within its documented range
    pub fn validate(&self) -> Result<()> {
        if !(1..=256).contains(&self.sweep.threads) {
            bail!("sweep.threads must be between 1 and 256 (got {})", self.sweep.threads);
        }
        if !(1..=31_536_000).contains(&self.sweep.wait_ceiling_secs) {
            bail!(
                "sweep.wait_ceiling_secs must be between 1 and 31536000 (got {})",
                self.sweep.wait_ceiling_secs
            );
        }
        if self.watch.settle_ms > 60_000 {
            bail!("watch.settle_ms must be at most 60000 (got {})", self.watch.settle_ms);
        }
        if !(1..=100).contains(&self.watch.settle_checks) {
            bail!(
                "watch.settle_checks must be between 1 and 100 (got {})",
                self.watch.settle_checks
            );
        }

        let layout = &self.layout;
        if layout.package_ext.is_empty() || layout.build_ext.is_empty() {
            bail!("layout extensions must not be empty");
        }
        if layout.package_ext.eq_ignore_ascii_case(&layout.build_ext) {
            bail!("layout.package_ext and layout.build_ext must differ");
        }
        if layout.report_name.is_empty() || layout.report_name.contains(['/', '\\']) {
            bail!("layout.report_name must be a plain file name");
        }

        let decompiler = &self.toolchain.decompiler;
        if decompiler.is_empty() {
            bail!("toolchain.decompiler must not be empty");
        }
        for placeholder in [ARTIFACT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
            if !decompiler.iter().any(|arg| arg.contains(placeholder)) {
                bail!("toolchain.decompiler must contain {}", placeholder);
            }
        }
        Ok(())
    }
}

/// Default config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("libdiff").join("config.toml"))
}

/// Load and validate the configuration
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse(&text).with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Parse and validate TOML text
pub fn parse(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).context("Failed to parse TOML")?;
    config.validate()?;
    Ok(config)
}

/// Commented example configuration
pub fn example_config() -> &'static str {
    r#"# libdiff configuration

[sweep]
# Worker threads used by the startup sweep (1-256)
threads = 4
# Maximum time to wait for the sweep, in seconds (1-31536000)
wait_ceiling_secs = 604800

[watch]
# Delay before acting on a newly created file, in milliseconds (0-60000)
settle_ms = 1000
# Size stability checks after the delay (1-100)
settle_checks = 5

[layout]
package_ext = "aar"
build_ext = "jar"
report_name = "diff.txt"

[toolchain]
# {artifact} and {output} are replaced with the build artifact and output directory
decompiler = ["java", "-jar", "procyon-decompiler.jar", "{artifact}", "-o", "{output}"]
"#
}
