//! Artifact preparation for libdiff
//!
//! This crate provides:
//! - Unpacking of distribution archives into build artifacts
//! - Decompilation of build artifacts into content directories
//! - A per-library preparation pass used before reconciliation

pub mod decompile;
pub mod extract;

pub use decompile::{CommandDecompiler, Decompiler};
pub use extract::{ArchiveExtractor, ZipArchiveExtractor};

use libdiff_core::error::{Error, IoResultExt, Result};
use libdiff_core::layout::{ArtifactKind, Layout};
use libdiff_core::store::sync_dir;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a decompilation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decompiled {
    /// The content directory already existed, nothing was run
    AlreadyPresent(PathBuf),
    /// The decompiler ran and the content directory was created
    Produced(PathBuf),
}

impl Decompiled {
    pub fn content_dir(&self) -> &Path {
        match self {
            Self::AlreadyPresent(dir) | Self::Produced(dir) => dir,
        }
    }
}

/// Outcome of preparing one library
#[derive(Debug, Default)]
pub struct PrepareOutcome {
    /// Build artifacts unpacked from distribution archives
    pub extracted: usize,
    /// Content directories produced by the decompiler
    pub decompiled: usize,
    /// Per-artifact failures; the affected artifacts are skipped
    pub failures: Vec<Error>,
}

/// External tooling bound to a layout
pub struct Toolchain {
    layout: Layout,
    extractor: Box<dyn ArchiveExtractor>,
    decompiler: Box<dyn Decompiler>,
}

impl Toolchain {
    pub fn new(
        layout: Layout,
        extractor: Box<dyn ArchiveExtractor>,
        decompiler: Box<dyn Decompiler>,
    ) -> Self {
        Self {
            layout,
            extractor,
            decompiler,
        }
    }

    /// Zip extraction plus a command-line decompiler
    pub fn with_command(layout: Layout, argv: Vec<String>) -> Self {
        Self::new(
            layout,
            Box::new(ZipArchiveExtractor),
            Box::new(CommandDecompiler::new(argv)),
        )
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Unpack a distribution archive next to itself and delete it
    ///
    /// Returns the path of the build artifact. The archive is only removed
    /// once the artifact is in place.
    pub fn extract_package(&self, package: &Path) -> Result<PathBuf> {
        let target = self.layout.build_artifact_for(package);
        self.extractor.extract(package, &target)?;
        fs::remove_file(package).at(package)?;
        info!(package = %package.display(), artifact = %target.display(), "unpacked archive");
        Ok(target)
    }

    /// Decompile a build artifact into its content directory
    ///
    /// The decompiler writes into a hidden staging directory that is renamed
    /// into place on success, so a content directory is never half-written.
    pub fn decompile_artifact(&self, artifact: &Path) -> Result<Decompiled> {
        let output = self.layout.content_dir(artifact);
        if output.is_dir() {
            debug!(artifact = %artifact.display(), "content directory already present");
            return Ok(Decompiled::AlreadyPresent(output));
        }

        let staging = self.layout.decompile_staging_dir(artifact);
        if staging.exists() {
            fs::remove_dir_all(&staging).at(&staging)?;
        }

        let started = Instant::now();
        if let Err(e) = self.decompiler.decompile(artifact, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        fs::rename(&staging, &output).at(&output)?;
        if let Some(parent) = output.parent() {
            sync_dir(parent)?;
        }
        info!(
            artifact = %artifact.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "decompiled"
        );
        Ok(Decompiled::Produced(output))
    }

    /// Unpack pending archives and decompile pending artifacts of a library
    ///
    /// Failures are collected per artifact and never stop the pass.
    pub fn prepare_library(&self, library_root: &Path) -> Result<PrepareOutcome> {
        let mut outcome = PrepareOutcome::default();

        for package in self.layout.artifacts(library_root, ArtifactKind::Package)? {
            match self.extract_package(&package) {
                Ok(_) => outcome.extracted += 1,
                Err(e) => {
                    warn!(library = %library_root.display(), error = %e, "skipping archive");
                    outcome.failures.push(e);
                }
            }
        }

        for artifact in self.layout.artifacts(library_root, ArtifactKind::Build)? {
            match self.decompile_artifact(&artifact) {
                Ok(Decompiled::Produced(_)) => outcome.decompiled += 1,
                Ok(Decompiled::AlreadyPresent(_)) => {}
                Err(e) => {
                    warn!(library = %library_root.display(), error = %e, "skipping artifact");
                    outcome.failures.push(e);
                }
            }
        }

        Ok(outcome)
    }
}
