//! On-disk layout of a whitelist of libraries
//!
//! ```text
//! <whitelist root>/
//!   <library>/
//!     widget-1.0.aar        distribution archive, unpacked into widget-1.0.jar
//!     widget-1.1.jar        build artifact
//!     widget-1.1/           decompiled content of widget-1.1.jar
//!       diff.txt            report for widget-1.1
//!       com/acme/...
//! ```

use crate::error::{IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of artifact found in a library root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Distribution archive wrapping a build artifact
    Package,
    /// Compiled build artifact, decompiled into a content directory
    Build,
}

/// File naming conventions of a library root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Extension of distribution archives (without the dot)
    pub package_ext: String,
    /// Extension of build artifacts (without the dot)
    pub build_ext: String,
    /// File name of the report at the root of each content directory
    pub report_name: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            package_ext: "aar".to_string(),
            build_ext: "jar".to_string(),
            report_name: "diff.txt".to_string(),
        }
    }
}

impl Layout {
    /// Classify a path by its extension
    pub fn kind_of(&self, path: &Path) -> Option<ArtifactKind> {
        let ext = path.extension().and_then(OsStr::to_str)?;
        if is_hidden(path) {
            return None;
        }
        if ext.eq_ignore_ascii_case(&self.build_ext) {
            Some(ArtifactKind::Build)
        } else if ext.eq_ignore_ascii_case(&self.package_ext) {
            Some(ArtifactKind::Package)
        } else {
            None
        }
    }

    /// Content directory of an artifact: same base name, extension stripped
    pub fn content_dir(&self, artifact: &Path) -> PathBuf {
        artifact.with_extension("")
    }

    /// Build artifact a distribution archive unpacks into
    pub fn build_artifact_for(&self, package: &Path) -> PathBuf {
        package.with_extension(&self.build_ext)
    }

    /// Report location inside a content directory
    pub fn report_path(&self, content_dir: &Path) -> PathBuf {
        content_dir.join(&self.report_name)
    }

    /// Staging file a report is written to before being renamed into place
    pub fn report_staging_path(&self, content_dir: &Path) -> PathBuf {
        content_dir.join(self.report_staging_name())
    }

    fn report_staging_name(&self) -> String {
        format!(".{}.partial", self.report_name)
    }

    /// Whether a path relative to a content directory is a generated report
    pub fn is_report_file(&self, relative: &Path) -> bool {
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(first), None) => {
                let name = first.as_os_str();
                name == OsStr::new(&self.report_name)
                    || name == OsStr::new(&self.report_staging_name())
            }
            _ => false,
        }
    }

    /// Hidden sibling directory a decompiler writes into before the rename
    pub fn decompile_staging_dir(&self, artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = artifact.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!(".{}.decompiling", stem))
    }

    /// Artifacts of one kind directly inside a library root, sorted by name
    pub fn artifacts(&self, library_root: &Path, kind: ArtifactKind) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(library_root).at(library_root)? {
            let entry = entry.at(library_root)?;
            let path = entry.path();
            if !entry.file_type().at(&path)?.is_file() {
                continue;
            }
            if self.kind_of(&path) == Some(kind) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .map_or(false, |name| name.starts_with('.'))
}

/// Directory whose immediate subdirectories are tracked libraries
#[derive(Debug, Clone)]
pub struct Whitelist {
    root: PathBuf,
}

impl Whitelist {
    /// Wrap a root path as given
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an existing root, canonicalizing it so it matches watcher paths
    pub fn open(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root).at(root)?;
        if !root.is_dir() {
            return Err(crate::Error::Io {
                path: root,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All library roots, sorted by name; hidden directories are skipped
    pub fn libraries(&self) -> Result<Vec<PathBuf>> {
        let mut libraries = Vec::new();
        for entry in fs::read_dir(&self.root).at(&self.root)? {
            let entry = entry.at(&self.root)?;
            let path = entry.path();
            if entry.file_type().at(&path)?.is_dir() && !is_hidden(&path) {
                libraries.push(path);
            }
        }
        libraries.sort();
        Ok(libraries)
    }

    /// Library owning an artifact path, if the path sits directly in a library
    pub fn library_of(&self, artifact: &Path) -> Option<PathBuf> {
        let library = artifact.parent()?;
        if library.parent()? == self.root && !is_hidden(library) {
            Some(library.to_path_buf())
        } else {
            None
        }
    }

    /// Whether a directory is a library root
    pub fn is_library(&self, dir: &Path) -> bool {
        dir.parent() == Some(self.root.as_path()) && !is_hidden(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of() {
        let layout = Layout::default();
        assert_eq!(layout.kind_of(Path::new("lib/a-1.0.jar")), Some(ArtifactKind::Build));
        assert_eq!(layout.kind_of(Path::new("lib/a-1.0.JAR")), Some(ArtifactKind::Build));
        assert_eq!(layout.kind_of(Path::new("lib/a-1.0.aar")), Some(ArtifactKind::Package));
        assert_eq!(layout.kind_of(Path::new("lib/a-1.0")), None);
        assert_eq!(layout.kind_of(Path::new("lib/notes.txt")), None);
        assert_eq!(layout.kind_of(Path::new("lib/.a-1.0.jar")), None);
    }

    #[test]
    fn test_derived_paths() {
        let layout = Layout::default();
        let jar = Path::new("/w/okhttp/okhttp-3.12.1.jar");
        assert_eq!(layout.content_dir(jar), PathBuf::from("/w/okhttp/okhttp-3.12.1"));
        assert_eq!(
            layout.report_path(&layout.content_dir(jar)),
            PathBuf::from("/w/okhttp/okhttp-3.12.1/diff.txt")
        );
        assert_eq!(
            layout.build_artifact_for(Path::new("/w/okhttp/okhttp-3.12.1.aar")),
            PathBuf::from("/w/okhttp/okhttp-3.12.1.jar")
        );
        assert_eq!(
            layout.decompile_staging_dir(jar),
            PathBuf::from("/w/okhttp/.okhttp-3.12.1.decompiling")
        );
    }

    #[test]
    fn test_is_report_file_only_at_root() {
        let layout = Layout::default();
        assert!(layout.is_report_file(Path::new("diff.txt")));
        assert!(layout.is_report_file(Path::new(".diff.txt.partial")));
        assert!(!layout.is_report_file(Path::new("docs/diff.txt")));
        assert!(!layout.is_report_file(Path::new("Diff.java")));
    }

    #[test]
    fn test_artifacts_sorted_and_filtered() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let lib = temp_dir.path();
        fs::write(lib.join("b.jar"), b"").unwrap();
        fs::write(lib.join("a.jar"), b"").unwrap();
        fs::write(lib.join("c.aar"), b"").unwrap();
        fs::create_dir(lib.join("d.jar")).unwrap();

        let layout = Layout::default();
        assert_eq!(
            layout.artifacts(lib, ArtifactKind::Build)?,
            vec![lib.join("a.jar"), lib.join("b.jar")]
        );
        assert_eq!(layout.artifacts(lib, ArtifactKind::Package)?, vec![lib.join("c.aar")]);
        Ok(())
    }

    #[test]
    fn test_whitelist_libraries() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let whitelist = Whitelist::open(temp_dir.path())?;
        fs::create_dir(whitelist.root().join("retrofit")).unwrap();
        fs::create_dir(whitelist.root().join("gson")).unwrap();
        fs::create_dir(whitelist.root().join(".cache")).unwrap();
        fs::write(whitelist.root().join(".libdiff.lock"), b"").unwrap();

        let libraries = whitelist.libraries()?;
        assert_eq!(
            libraries,
            vec![whitelist.root().join("gson"), whitelist.root().join("retrofit")]
        );
        Ok(())
    }

    #[test]
    fn test_library_of() {
        let whitelist = Whitelist::new("/w");
        assert_eq!(
            whitelist.library_of(Path::new("/w/gson/gson-2.8.jar")),
            Some(PathBuf::from("/w/gson"))
        );
        assert_eq!(whitelist.library_of(Path::new("/w/gson-2.8.jar")), None);
        assert_eq!(whitelist.library_of(Path::new("/w/gson/gson-2.8/inner.jar")), None);
        assert!(whitelist.is_library(Path::new("/w/gson")));
        assert!(!whitelist.is_library(Path::new("/w/gson/gson-2.8")));
    }
}
