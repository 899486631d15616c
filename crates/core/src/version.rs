//! In-memory model of a library's versions

use crate::mapper::FileMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One version of a library: a build artifact plus its content directory
#[derive(Debug, Clone)]
pub struct Version {
    /// Display name (content directory name)
    pub name: String,
    /// Build artifact this version was decompiled from
    pub artifact: PathBuf,
    /// Root of the decompiled content
    pub path: PathBuf,
    /// Rank by release time, 0 = newest
    pub age: usize,
    /// Release-time signal (Unix ms) the age was derived from, if available
    pub released_at_ms: Option<i64>,
    /// Files still awaiting classification
    pub file_map: FileMap,
    /// Paths found in no other version
    pub exclusive: BTreeSet<String>,
    /// Paths found elsewhere with different content
    pub modified: BTreeSet<String>,
    /// Paths found elsewhere with identical content
    pub copied: BTreeSet<String>,
}

impl Version {
    pub fn new(artifact: PathBuf, path: PathBuf, released_at_ms: Option<i64>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            artifact,
            path,
            age: 0,
            released_at_ms,
            file_map: FileMap::new(),
            exclusive: BTreeSet::new(),
            modified: BTreeSet::new(),
            copied: BTreeSet::new(),
        }
    }

    /// Total number of classified paths across the three sets
    pub fn classified_len(&self) -> usize {
        self.exclusive.len() + self.modified.len() + self.copied.len()
    }

    /// Union of the three classification sets
    pub fn classified_paths(&self) -> BTreeSet<&str> {
        self.exclusive
            .iter()
            .chain(&self.modified)
            .chain(&self.copied)
            .map(String::as_str)
            .collect()
    }

    /// Clear results so the version can be classified again
    pub fn reset(&mut self) {
        self.exclusive.clear();
        self.modified.clear();
        self.copied.clear();
    }
}

/// The ordered versions of one library for a single reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    library: PathBuf,
    versions: Vec<Version>,
}

impl VersionRegistry {
    /// Build a registry from versions already sorted newest first
    ///
    /// Ages are assigned from the position in `versions`.
    pub fn from_ordered(library: impl Into<PathBuf>, mut versions: Vec<Version>) -> Self {
        for (age, version) in versions.iter_mut().enumerate() {
            version.age = age;
        }
        Self {
            library: library.into(),
            versions,
        }
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn versions_mut(&mut self) -> &mut [Version] {
        &mut self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Look up a version by name
    pub fn get(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name == name)
    }

    pub fn into_versions(self) -> Vec<Version> {
        self.versions
    }
}
