//! Per-library reconciliation
//!
//! Brings one library's reports in line with the versions on disk. The whole
//! library is recomputed on every pass: a single new version can change the
//! classification of every existing one.

use crate::classify::DiffClassifier;
use crate::error::Result;
use crate::layout::{ArtifactKind, Layout};
use crate::mapper::ContentMapper;
use crate::order::{ReleaseClock, VersionOrderResolver};
use crate::report::ReportCodec;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub versions: usize,
    pub files: usize,
    pub exclusive: usize,
    pub modified: usize,
    pub copied: usize,
}

/// On-disk state of one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStatus {
    pub library: PathBuf,
    /// Build artifacts with a content directory
    pub eligible: usize,
    /// Eligible versions whose report is complete
    pub valid_reports: usize,
    /// Distribution archives not yet unpacked
    pub pending_packages: usize,
    /// Build artifacts not yet decompiled
    pub undecompiled: usize,
}

impl LibraryStatus {
    pub fn needs_work(&self) -> bool {
        self.valid_reports != self.eligible
    }
}

/// Drives mapping, classification and report writing for a library
pub struct Reconciler {
    resolver: VersionOrderResolver,
    mapper: ContentMapper,
    classifier: DiffClassifier,
    codec: ReportCodec,
}

impl Reconciler {
    /// Reconciler ordering versions by archive entry timestamps
    pub fn new(layout: Layout) -> Self {
        Self::from_resolver(VersionOrderResolver::with_zip_clock(layout))
    }

    /// Reconciler with a custom release-time signal
    pub fn with_clock(layout: Layout, clock: Box<dyn ReleaseClock>) -> Self {
        Self::from_resolver(VersionOrderResolver::new(layout, clock))
    }

    fn from_resolver(resolver: VersionOrderResolver) -> Self {
        let layout = resolver.layout().clone();
        Self {
            mapper: ContentMapper::new(layout.clone()),
            classifier: DiffClassifier,
            codec: ReportCodec::new(layout),
            resolver,
        }
    }

    pub fn layout(&self) -> &Layout {
        self.resolver.layout()
    }

    pub fn codec(&self) -> &ReportCodec {
        &self.codec
    }

    /// True when the number of valid reports differs from the number of
    /// eligible versions
    pub fn needs_work(&self, library_root: &Path) -> Result<bool> {
        let eligible = self.resolver.eligible(library_root)?;
        let valid = eligible
            .iter()
            .filter(|v| self.codec.is_valid(&self.codec.report_path(v)))
            .count();
        Ok(valid != eligible.len())
    }

    /// Recompute and rewrite every report of the library
    pub fn reconcile(&self, library_root: &Path) -> Result<ReconcileSummary> {
        let started = Instant::now();
        let mut registry = self.resolver.order(library_root)?;

        let mut summary = ReconcileSummary {
            versions: registry.len(),
            ..ReconcileSummary::default()
        };

        for version in registry.versions_mut() {
            version.file_map = self.mapper.map(&version.path)?;
            summary.files += version.file_map.len();
            debug!(
                library = %library_root.display(),
                version = %version.name,
                age = version.age,
                files = version.file_map.len(),
                "mapped version"
            );
        }

        self.classifier.classify(registry.versions_mut());

        // Versions lacking a valid report are written last: until the pass
        // completes at least one report stays missing and the library still
        // counts as needing work.
        let library_size = registry.len();
        let (stale, missing): (Vec<_>, Vec<_>) = registry
            .versions()
            .iter()
            .partition(|v| self.codec.is_valid(&self.codec.report_path(v)));
        for version in stale.into_iter().chain(missing) {
            summary.exclusive += version.exclusive.len();
            summary.modified += version.modified.len();
            summary.copied += version.copied.len();
            self.codec.write(version, library_size)?;
        }

        info!(
            library = %library_root.display(),
            versions = summary.versions,
            files = summary.files,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reports up to date"
        );
        Ok(summary)
    }

    /// Reconcile only if some eligible version lacks a valid report
    ///
    /// Returns `None` when the library was already up to date.
    pub fn reconcile_if_needed(&self, library_root: &Path) -> Result<Option<ReconcileSummary>> {
        if self.needs_work(library_root)? {
            info!(library = %library_root.display(), "reports out of date, recomputing");
            self.reconcile(library_root).map(Some)
        } else {
            debug!(library = %library_root.display(), "reports up to date");
            Ok(None)
        }
    }

    /// Describe the library's processing state without changing it
    pub fn inspect(&self, library_root: &Path) -> Result<LibraryStatus> {
        let layout = self.layout();
        let eligible = self.resolver.eligible(library_root)?;
        let valid_reports = eligible
            .iter()
            .filter(|v| self.codec.is_valid(&self.codec.report_path(v)))
            .count();
        let pending_packages = layout.artifacts(library_root, ArtifactKind::Package)?.len();
        // Separate listing: a jar removed in between must not underflow
        let undecompiled = layout
            .artifacts(library_root, ArtifactKind::Build)?
            .iter()
            .filter(|artifact| !layout.content_dir(artifact).is_dir())
            .count();

        Ok(LibraryStatus {
            library: library_root.to_path_buf(),
            eligible: eligible.len(),
            valid_reports,
            pending_packages,
            undecompiled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn add_version(lib: &Path, name: &str, files: &[(&str, &str)]) {
        fs::write(lib.join(format!("{name}.jar")), b"").unwrap();
        let root = lib.join(name);
        for (path, content) in files {
            let file = root.join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        fs::create_dir_all(&root).unwrap();
    }

    #[test]
    fn test_reconcile_writes_every_report() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("A.txt", "h1"), ("B.txt", "h2")]);
        add_version(lib, "v2", &[("A.txt", "h1"), ("C.txt", "h3")]);
        let reconciler = Reconciler::new(Layout::default());

        assert!(reconciler.needs_work(lib)?);
        let summary = reconciler.reconcile(lib)?;
        assert_eq!(summary.versions, 2);
        assert_eq!(summary.files, 4);
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.exclusive, 2);
        assert!(!reconciler.needs_work(lib)?);

        let v1 = reconciler.codec().read(&lib.join("v1/diff.txt"))?.unwrap();
        assert_eq!(v1.copied, vec!["A.txt"]);
        assert_eq!(v1.exclusive, vec!["B.txt"]);
        let v2 = reconciler.codec().read(&lib.join("v2/diff.txt"))?.unwrap();
        assert_eq!(v2.copied, vec!["A.txt"]);
        assert_eq!(v2.exclusive, vec!["C.txt"]);
        Ok(())
    }

    #[test]
    fn test_reconcile_is_idempotent() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("com/A.java", "a"), ("com/B.java", "b")]);
        add_version(lib, "v2", &[("com/A.java", "a2"), ("com/C.java", "c")]);
        add_version(lib, "v3", &[("com/A.java", "a2")]);
        let reconciler = Reconciler::new(Layout::default());

        reconciler.reconcile(lib)?;
        let first: Vec<_> = ["v1", "v2", "v3"]
            .iter()
            .map(|v| fs::read(lib.join(v).join("diff.txt")).unwrap())
            .collect();
        reconciler.reconcile(lib)?;
        let second: Vec<_> = ["v1", "v2", "v3"]
            .iter()
            .map(|v| fs::read(lib.join(v).join("diff.txt")).unwrap())
            .collect();

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_truncated_report_triggers_work() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("A.txt", "h1")]);
        add_version(lib, "v2", &[("A.txt", "h2")]);
        let reconciler = Reconciler::new(Layout::default());
        reconciler.reconcile(lib)?;

        let report = lib.join("v2/diff.txt");
        let full = fs::read_to_string(&report).unwrap();
        fs::write(&report, &full[..full.find("Exclusive").unwrap()]).unwrap();

        assert!(reconciler.needs_work(lib)?);
        assert!(reconciler.reconcile_if_needed(lib)?.is_some());
        assert!(reconciler.codec().is_valid(&report));
        assert!(reconciler.reconcile_if_needed(lib)?.is_none());
        Ok(())
    }

    #[test]
    fn test_new_version_counts_as_work() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("A.txt", "h1")]);
        let reconciler = Reconciler::new(Layout::default());
        reconciler.reconcile(lib)?;
        let single = reconciler.codec().read(&lib.join("v1/diff.txt"))?.unwrap();
        assert_eq!(single.exclusive, vec!["A.txt"]);

        add_version(lib, "v2", &[("A.txt", "h1")]);
        assert!(reconciler.needs_work(lib)?);
        reconciler.reconcile(lib)?;

        let v1 = reconciler.codec().read(&lib.join("v1/diff.txt"))?.unwrap();
        assert!(v1.exclusive.is_empty());
        assert_eq!(v1.copied, vec!["A.txt"]);
        Ok(())
    }

    #[test]
    fn test_inspect_counts() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("A.txt", "h1")]);
        fs::write(lib.join("v2.jar"), b"").unwrap();
        fs::write(lib.join("v3.aar"), b"").unwrap();
        let reconciler = Reconciler::new(Layout::default());

        let before = reconciler.inspect(lib)?;
        assert_eq!(before.eligible, 1);
        assert_eq!(before.valid_reports, 0);
        assert_eq!(before.pending_packages, 1);
        assert_eq!(before.undecompiled, 1);
        assert!(before.needs_work());

        reconciler.reconcile(lib)?;
        assert!(!reconciler.inspect(lib)?.needs_work());
        Ok(())
    }

    #[test]
    fn test_interrupted_pass_keeps_library_dirty() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "b", &[("A.txt", "h1")]);
        add_version(lib, "c", &[("A.txt", "h1")]);
        let reconciler = Reconciler::new(Layout::default());
        reconciler.reconcile(lib)?;

        // "a" sorts first, so it is the newest version
        add_version(lib, "a", &[("A.txt", "h2")]);
        let blocker = lib.join("c/.diff.txt.partial");
        fs::create_dir(&blocker).unwrap();

        assert!(reconciler.reconcile(lib).is_err());
        assert!(!lib.join("a/diff.txt").exists());
        assert!(reconciler.needs_work(lib)?);

        fs::remove_dir(&blocker).unwrap();
        assert!(reconciler.reconcile_if_needed(lib)?.is_some());
        for name in ["a", "b", "c"] {
            let report = reconciler.codec().read(&lib.join(name).join("diff.txt"))?.unwrap();
            assert_eq!(report.compared_against, 2, "{} is stale", name);
        }
        Ok(())
    }

    #[test]
    fn test_inspect_ignores_orphan_content_dirs() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        add_version(lib, "v1", &[("A.txt", "h1")]);
        fs::create_dir(lib.join("leftover")).unwrap();
        let reconciler = Reconciler::new(Layout::default());

        let status = reconciler.inspect(lib)?;
        assert_eq!(status.eligible, 1);
        assert_eq!(status.undecompiled, 0);

        fs::remove_file(lib.join("v1.jar")).unwrap();
        let status = reconciler.inspect(lib)?;
        assert_eq!(status.eligible, 0);
        assert_eq!(status.undecompiled, 0);
        Ok(())
    }

    #[test]
    fn test_empty_library_needs_no_work() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let reconciler = Reconciler::new(Layout::default());
        assert!(!reconciler.needs_work(temp_dir.path())?);
        assert_eq!(reconciler.reconcile(temp_dir.path())?, ReconcileSummary::default());
        Ok(())
    }
}
