//! Unpacking distribution archives into build artifacts

use libdiff_core::error::{Error, IoResultExt, Result};
use libdiff_core::store::sync_dir;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Extracts the build artifact wrapped by a distribution archive
pub trait ArchiveExtractor: Send + Sync {
    /// Write the inner build artifact of `package` to `target`
    ///
    /// Must not leave a partial file at `target` on failure.
    fn extract(&self, package: &Path, target: &Path) -> Result<()>;
}

/// Extractor for zip-based archives (`.aar`)
///
/// The archive may carry several nested `.jar` files; the largest one holds
/// the library code and is the one extracted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveExtractor;

impl ArchiveExtractor for ZipArchiveExtractor {
    fn extract(&self, package: &Path, target: &Path) -> Result<()> {
        let file = File::open(package).at(package)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| Error::tool(package, e.to_string()))?;

        let mut largest: Option<(usize, u64)> = None;
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| Error::tool(package, e.to_string()))?;
            if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".jar") {
                continue;
            }
            if largest.map_or(true, |(_, size)| entry.size() > size) {
                largest = Some((i, entry.size()));
            }
        }
        let Some((index, size)) = largest else {
            return Err(Error::tool(package, "archive contains no build artifact"));
        };

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let staging = parent.join(format!(".{}.partial", file_name));

        let copied = (|| -> Result<()> {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| Error::tool(package, e.to_string()))?;
            let mut out = File::create(&staging).at(&staging)?;
            io::copy(&mut entry, &mut out).at(&staging)?;
            out.sync_all().at(&staging)?;
            Ok(())
        })();
        if let Err(e) = copied {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        fs::rename(&staging, target).at(target)?;
        sync_dir(parent)?;
        debug!(package = %package.display(), target = %target.display(), bytes = size, "extracted build artifact");
        Ok(())
    }
}
