//! Content mapping of a version tree

use crate::error::Result;
use crate::hash::{hash_path, Blake3Hash};
use crate::layout::Layout;
use crate::store::normalize_path;
use ahash::AHashMap;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Relative path (`/`-separated) -> content hash
pub type FileMap = AHashMap<String, Blake3Hash>;

/// Walks a version's content directory and hashes every regular file
#[derive(Debug, Clone, Default)]
pub struct ContentMapper {
    layout: Layout,
}

impl ContentMapper {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Map every regular file under `version_root` to its hash
    ///
    /// The report (and its staging file) at the root are excluded. Symlinks are
    /// not followed. Any unreadable entry fails the whole map with
    /// `Error::Io`; callers retry the library on the next pass.
    pub fn map(&self, version_root: &Path) -> Result<FileMap> {
        let mut files = FileMap::new();

        for entry in WalkDir::new(version_root).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(version_root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            if self.layout.is_report_file(relative) {
                continue;
            }
            // Relative paths from the walk never hold `..`; names that are
            // not UTF-8 get an escaped key instead of being dropped
            let Some(key) = normalize_path(relative) else {
                debug!(path = %entry.path().display(), "skipping unexpected path");
                continue;
            };

            files.insert(key, hash_path(entry.path())?);
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use std::fs;

    #[test]
    fn test_map_nested_tree() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("com/acme")).unwrap();
        fs::write(root.join("com/acme/Widget.java"), b"class Widget {}").unwrap();
        fs::write(root.join("README"), b"readme").unwrap();

        let map = ContentMapper::default().map(root)?;

        assert_eq!(map.len(), 2);
        assert_eq!(map["com/acme/Widget.java"], hash_bytes(b"class Widget {}"));
        assert_eq!(map["README"], hash_bytes(b"readme"));
        Ok(())
    }

    #[test]
    fn test_map_excludes_root_report_only() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("diff.txt"), b"report").unwrap();
        fs::write(root.join(".diff.txt.partial"), b"half a report").unwrap();
        fs::write(root.join("docs/diff.txt"), b"a source file").unwrap();

        let map = ContentMapper::default().map(root)?;

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["docs/diff.txt"]);
        Ok(())
    }

    #[test]
    fn test_map_is_deterministic() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        for i in 0..20 {
            fs::write(root.join(format!("F{i}.java")), format!("class F{i} {{}}")).unwrap();
        }

        let mapper = ContentMapper::default();
        assert_eq!(mapper.map(root)?, mapper.map(root)?);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_map_keeps_non_utf8_names() -> Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let name = OsStr::from_bytes(b"Caf\xe9.java");
        if fs::write(root.join(name), b"class Cafe {}").is_err() {
            // Filesystem refuses non UTF-8 names
            return Ok(());
        }
        fs::write(root.join("Café.java"), b"class Cafe {}").unwrap();

        let map = ContentMapper::default().map(root)?;

        assert_eq!(map.len(), 2);
        assert_eq!(map["Caf\\xe9.java"], hash_bytes(b"class Cafe {}"));
        assert!(map.contains_key("Café.java"));
        Ok(())
    }

    #[test]
    fn test_map_missing_root_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = ContentMapper::default().map(&temp_dir.path().join("gone"));
        assert!(matches!(result, Err(crate::Error::Io { .. })));
    }
}
