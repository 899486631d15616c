//! Release ordering of a library's versions
//!
//! Filesystem mtimes are rewritten by copying and extraction tools, so the
//! release time of a version is estimated from the newest entry timestamp
//! recorded inside its build artifact.

use crate::error::Result;
use crate::layout::{ArtifactKind, Layout};
use crate::version::{Version, VersionRegistry};
use chrono::{NaiveDate, TimeZone, Utc};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Source of a per-artifact release-time signal
pub trait ReleaseClock: Send + Sync {
    /// Release time in Unix milliseconds, or `None` if it cannot be determined
    fn release_time(&self, artifact: &Path) -> Option<i64>;
}

/// Reads the newest entry modification time from a zip-format artifact
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipEntryClock;

impl ReleaseClock for ZipEntryClock {
    fn release_time(&self, artifact: &Path) -> Option<i64> {
        let file = match File::open(artifact) {
            Ok(file) => file,
            Err(e) => {
                debug!(artifact = %artifact.display(), "cannot open artifact: {}", e);
                return None;
            }
        };
        let mut archive = match zip::ZipArchive::new(file) {
            Ok(archive) => archive,
            Err(e) => {
                debug!(artifact = %artifact.display(), "not a readable archive: {}", e);
                return None;
            }
        };

        let mut newest: Option<i64> = None;
        for i in 0..archive.len() {
            let Ok(entry) = archive.by_index(i) else {
                continue;
            };
            if let Some(ms) = dos_time_to_unix_ms(entry.last_modified()) {
                newest = Some(newest.map_or(ms, |n| n.max(ms)));
            }
        }
        newest
    }
}

/// Convert an archive's DOS timestamp (no timezone) to Unix milliseconds
fn dos_time_to_unix_ms(time: zip::DateTime) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?;
    let naive = date.and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )?;
    Some(Utc.from_utc_datetime(&naive).timestamp_millis())
}

/// Orders the eligible versions of a library newest first
pub struct VersionOrderResolver {
    layout: Layout,
    clock: Box<dyn ReleaseClock>,
}

impl VersionOrderResolver {
    pub fn new(layout: Layout, clock: Box<dyn ReleaseClock>) -> Self {
        Self { layout, clock }
    }

    /// Resolver reading release times from zip entry timestamps
    pub fn with_zip_clock(layout: Layout) -> Self {
        Self::new(layout, Box::new(ZipEntryClock))
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Eligible versions of `library_root`, in discovery (file name) order
    ///
    /// A version is eligible once both its build artifact and its content
    /// directory exist.
    pub fn eligible(&self, library_root: &Path) -> Result<Vec<Version>> {
        let mut versions = Vec::new();
        for artifact in self.layout.artifacts(library_root, ArtifactKind::Build)? {
            let content = self.layout.content_dir(&artifact);
            if content.is_dir() {
                versions.push(Version::new(artifact, content, None));
            }
        }
        Ok(versions)
    }

    /// Eligible versions sorted by release time, newest first
    ///
    /// Ties keep discovery order. Versions without a release signal sort after
    /// every version that has one.
    pub fn order(&self, library_root: &Path) -> Result<VersionRegistry> {
        let mut versions = self.eligible(library_root)?;
        for version in &mut versions {
            version.released_at_ms = self.clock.release_time(&version.artifact);
        }

        // Stable sort: equal keys keep discovery order
        versions.sort_by(|a, b| b.released_at_ms.cmp(&a.released_at_ms));

        Ok(VersionRegistry::from_ordered(library_root, versions))
    }
}
