//! Multi-version file classification
//!
//! Every path of every version ends up in one or more of three sets:
//! - exclusive: no other version has the path
//! - copied: another version has the path with identical content
//! - modified: another version has the path with different content
//!
//! For each path the newest version holding it anchors the comparison: every
//! other holder is compared against the anchor once. A holder lands in
//! `copied` or `modified` depending on that comparison, while the anchor
//! collects the outcome of all of them. An anchor can therefore hold the same
//! path in both `copied` and `modified` when its siblings disagree.

use crate::hash::Blake3Hash;
use crate::version::Version;
use ahash::AHashMap;
use std::collections::BTreeSet;

/// Computes exclusive/modified/copied sets over a library's versions
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffClassifier;

impl DiffClassifier {
    /// Classify `versions` (ordered newest first) in place
    ///
    /// Every version's `file_map` is drained. Previous results are discarded,
    /// the whole library is always recomputed.
    pub fn classify(&self, versions: &mut [Version]) {
        for version in versions.iter_mut() {
            version.reset();
        }

        if versions.len() == 1 {
            let only = &mut versions[0];
            only.exclusive.extend(only.file_map.drain().map(|(path, _)| path));
            return;
        }

        let index = PathIndex::build(versions);
        for version in versions.iter_mut() {
            version.file_map.clear();
        }

        for (path, holders) in index.entries {
            let Some((&(anchor, anchor_hash), rest)) = holders.split_first() else {
                continue;
            };

            if rest.is_empty() {
                versions[anchor].exclusive.insert(path);
                continue;
            }

            for &(other, other_hash) in rest {
                let same = other_hash == anchor_hash;
                bucket(&mut versions[anchor], same).insert(path.clone());
                bucket(&mut versions[other], same).insert(path.clone());
            }
        }
    }
}

fn bucket(version: &mut Version, same_content: bool) -> &mut BTreeSet<String> {
    if same_content {
        &mut version.copied
    } else {
        &mut version.modified
    }
}

/// Path -> holders index built in one pass over all versions
///
/// Holders are `(version index, hash)` pairs in version order, so the first
/// holder is always the newest version containing the path. Consuming an
/// entry of the index stands in for removing the path from every map.
struct PathIndex {
    entries: AHashMap<String, Vec<(usize, Blake3Hash)>>,
}

impl PathIndex {
    fn build(versions: &[Version]) -> Self {
        let mut entries: AHashMap<String, Vec<(usize, Blake3Hash)>> = AHashMap::new();
        for (idx, version) in versions.iter().enumerate() {
            for (path, hash) in version.file_map.iter() {
                entries.entry(path.clone()).or_default().push((idx, *hash));
            }
        }
        Self { entries }
    }
}
