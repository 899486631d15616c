//! Decompilation of build artifacts through an external command

use libdiff_core::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Placeholder replaced with the build artifact path
pub const ARTIFACT_PLACEHOLDER: &str = "{artifact}";
/// Placeholder replaced with the output directory path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Turns a build artifact into a directory of text files
///
/// Implementations are treated as a black box: given the same artifact they
/// must produce the same tree under `output`.
pub trait Decompiler: Send + Sync {
    fn decompile(&self, artifact: &Path, output: &Path) -> Result<()>;
}

/// Runs a configured command line, e.g.
/// `java -jar procyon-decompiler.jar {artifact} -o {output}`
#[derive(Debug, Clone)]
pub struct CommandDecompiler {
    argv: Vec<String>,
}

impl CommandDecompiler {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Command line with placeholders substituted
    pub fn command_line(&self, artifact: &Path, output: &Path) -> Vec<String> {
        let artifact = artifact.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(ARTIFACT_PLACEHOLDER, &artifact)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Decompiler for CommandDecompiler {
    fn decompile(&self, artifact: &Path, output: &Path) -> Result<()> {
        let argv = self.command_line(artifact, output);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::tool(artifact, "no decompiler command configured"));
        };

        debug!(artifact = %artifact.display(), command = ?argv, "running decompiler");
        let result = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::tool(artifact, format!("failed to launch {}: {}", program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(Error::tool(
                artifact,
                format!("{} exited with {}: {}", program, result.status, detail.trim()),
            ));
        }

        if !output.is_dir() {
            return Err(Error::tool(artifact, "decompiler produced no output directory"));
        }
        Ok(())
    }
}
