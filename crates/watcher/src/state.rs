//! Watch state machine
//!
//! `WatchState::transition` is pure: it maps one filesystem event to the
//! actions the engine must perform, updating only the handle table. All I/O
//! (registering watches, extracting, decompiling, reconciling, logging) is
//! done by the driver.

use ahash::AHashMap;
use libdiff_core::layout::{ArtifactKind, Layout, Whitelist};
use std::path::{Path, PathBuf};

/// Filesystem event as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    /// A file or directory appeared (including renames into a watched dir)
    Created { path: PathBuf, is_dir: bool },
    /// File content changed
    Modified { path: PathBuf },
    /// A file or directory disappeared (including renames out)
    Deleted { path: PathBuf },
    /// The backend dropped events
    Overflow,
}

/// Work the driver must perform after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Watch `dir` and every directory below it
    Register(PathBuf),
    /// Look for artifacts that landed in a library before its watch existed
    ScanLibrary(PathBuf),
    /// Release the backend watch of a directory that went away
    Unwatched(PathBuf),
    /// Wait for the archive to settle, then unpack it
    ExtractPackage(PathBuf),
    /// Wait for the artifact to settle, decompile it, reconcile its library
    DecompileAndReconcile { artifact: PathBuf, library: PathBuf },
    /// A build artifact was removed while running
    WarnArtifactDeleted(PathBuf),
    /// Events may have been lost
    WarnOverflow,
    /// No watched directory remains
    Stop,
}

/// Opaque identifier of one directory watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(u64);

/// Handle table plus the naming rules needed to interpret events
#[derive(Debug)]
pub struct WatchState {
    whitelist: Whitelist,
    layout: Layout,
    handles: AHashMap<WatchHandle, PathBuf>,
    dirs: AHashMap<PathBuf, WatchHandle>,
    next_handle: u64,
}

impl WatchState {
    pub fn new(whitelist: Whitelist, layout: Layout) -> Self {
        Self {
            whitelist,
            layout,
            handles: AHashMap::new(),
            dirs: AHashMap::new(),
            next_handle: 0,
        }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Record a directory the backend now watches
    ///
    /// Tracking the same directory twice returns the existing handle.
    pub fn track(&mut self, dir: PathBuf) -> WatchHandle {
        if let Some(handle) = self.dirs.get(&dir) {
            return *handle;
        }
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle, dir.clone());
        self.dirs.insert(dir, handle);
        handle
    }

    pub fn is_tracked(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    pub fn directory(&self, handle: WatchHandle) -> Option<&Path> {
        self.handles.get(&handle).map(PathBuf::as_path)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drop `dir` and every tracked directory below it, sorted
    fn untrack_subtree(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut removed: Vec<PathBuf> = self
            .dirs
            .keys()
            .filter(|tracked| tracked.starts_with(dir))
            .cloned()
            .collect();
        removed.sort();
        for path in &removed {
            if let Some(handle) = self.dirs.remove(path) {
                self.handles.remove(&handle);
            }
        }
        removed
    }

    /// Map one event to the actions it requires
    pub fn transition(&mut self, event: FsEvent) -> Vec<WatchAction> {
        match event {
            FsEvent::Overflow => vec![WatchAction::WarnOverflow],
            FsEvent::Modified { .. } => Vec::new(),
            FsEvent::Created { path, is_dir: true } => self.on_dir_created(path),
            FsEvent::Created { path, is_dir: false } => self.on_file_created(path),
            FsEvent::Deleted { path } => self.on_deleted(path),
        }
    }

    fn on_dir_created(&mut self, dir: PathBuf) -> Vec<WatchAction> {
        if is_hidden(&dir) || self.is_tracked(&dir) || !dir.starts_with(self.whitelist.root()) {
            return Vec::new();
        }
        let mut actions = vec![WatchAction::Register(dir.clone())];
        if self.whitelist.is_library(&dir) {
            actions.push(WatchAction::ScanLibrary(dir));
        }
        actions
    }

    fn on_file_created(&mut self, path: PathBuf) -> Vec<WatchAction> {
        let Some(library) = self.whitelist.library_of(&path) else {
            return Vec::new();
        };
        match self.layout.kind_of(&path) {
            Some(ArtifactKind::Package) => vec![WatchAction::ExtractPackage(path)],
            Some(ArtifactKind::Build) => vec![WatchAction::DecompileAndReconcile {
                artifact: path,
                library,
            }],
            None => Vec::new(),
        }
    }

    fn on_deleted(&mut self, path: PathBuf) -> Vec<WatchAction> {
        if self.is_tracked(&path) {
            let mut actions: Vec<WatchAction> = self
                .untrack_subtree(&path)
                .into_iter()
                .map(WatchAction::Unwatched)
                .collect();
            if self.is_empty() {
                actions.push(WatchAction::Stop);
            }
            return actions;
        }

        let is_build = self.layout.kind_of(&path) == Some(ArtifactKind::Build);
        if is_build && self.whitelist.library_of(&path).is_some() {
            vec![WatchAction::WarnArtifactDeleted(path)]
        } else {
            Vec::new()
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WatchState {
        let mut state = WatchState::new(Whitelist::new("/w"), Layout::default());
        for dir in ["/w", "/w/gson", "/w/gson/gson-2.8", "/w/gson/gson-2.8/com", "/w/okio"] {
            state.track(PathBuf::from(dir));
        }
        state
    }

    fn created(path: &str) -> FsEvent {
        FsEvent::Created {
            path: PathBuf::from(path),
            is_dir: false,
        }
    }

    fn deleted(path: &str) -> FsEvent {
        FsEvent::Deleted {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_new_build_artifact() {
        let mut state = state();
        assert_eq!(
            state.transition(created("/w/gson/gson-2.9.jar")),
            vec![WatchAction::DecompileAndReconcile {
                artifact: PathBuf::from("/w/gson/gson-2.9.jar"),
                library: PathBuf::from("/w/gson"),
            }]
        );
    }

    #[test]
    fn test_new_package() {
        let mut state = state();
        assert_eq!(
            state.transition(created("/w/okio/okio-1.0.aar")),
            vec![WatchAction::ExtractPackage(PathBuf::from("/w/okio/okio-1.0.aar"))]
        );
    }

    #[test]
    fn test_files_outside_library_level_ignored() {
        let mut state = state();
        assert!(state.transition(created("/w/gson/gson-2.8/libs/inner.jar")).is_empty());
        assert!(state.transition(created("/w/stray.jar")).is_empty());
        assert!(state.transition(created("/w/gson/.gson-2.9.jar.partial")).is_empty());
        assert!(state.transition(created("/w/gson/README.md")).is_empty());
        assert!(state
            .transition(FsEvent::Modified {
                path: PathBuf::from("/w/gson/gson-2.8.jar")
            })
            .is_empty());
    }

    #[test]
    fn test_new_library_directory() {
        let mut state = state();
        let actions = state.transition(FsEvent::Created {
            path: PathBuf::from("/w/moshi"),
            is_dir: true,
        });
        assert_eq!(
            actions,
            vec![
                WatchAction::Register(PathBuf::from("/w/moshi")),
                WatchAction::ScanLibrary(PathBuf::from("/w/moshi")),
            ]
        );
    }

    #[test]
    fn test_new_nested_and_hidden_directories() {
        let mut state = state();
        assert_eq!(
            state.transition(FsEvent::Created {
                path: PathBuf::from("/w/okio/okio-1.0"),
                is_dir: true,
            }),
            vec![WatchAction::Register(PathBuf::from("/w/okio/okio-1.0"))]
        );
        assert!(state
            .transition(FsEvent::Created {
                path: PathBuf::from("/w/okio/.okio-1.0.decompiling"),
                is_dir: true,
            })
            .is_empty());
        assert!(state
            .transition(FsEvent::Created {
                path: PathBuf::from("/w/gson"),
                is_dir: true,
            })
            .is_empty());
    }

    #[test]
    fn test_deleted_build_artifact_warns_once() {
        let mut state = state();
        let actions = state.transition(deleted("/w/gson/gson-2.8.jar"));
        assert_eq!(
            actions,
            vec![WatchAction::WarnArtifactDeleted(PathBuf::from("/w/gson/gson-2.8.jar"))]
        );
        assert!(state.transition(deleted("/w/gson/gson-2.8.aar")).is_empty());
    }

    #[test]
    fn test_deleted_directory_drops_subtree() {
        let mut state = state();
        let actions = state.transition(deleted("/w/gson"));
        assert_eq!(
            actions,
            vec![
                WatchAction::Unwatched(PathBuf::from("/w/gson")),
                WatchAction::Unwatched(PathBuf::from("/w/gson/gson-2.8")),
                WatchAction::Unwatched(PathBuf::from("/w/gson/gson-2.8/com")),
            ]
        );
        assert_eq!(state.len(), 2);
        assert!(!state.is_tracked(Path::new("/w/gson/gson-2.8")));
    }

    #[test]
    fn test_last_handle_stops() {
        let mut state = state();
        let actions = state.transition(deleted("/w"));
        assert_eq!(actions.last(), Some(&WatchAction::Stop));
        assert_eq!(actions.len(), 6);
        assert!(state.is_empty());
    }

    #[test]
    fn test_overflow_warns() {
        let mut state = state();
        assert_eq!(state.transition(FsEvent::Overflow), vec![WatchAction::WarnOverflow]);
    }

    #[test]
    fn test_track_is_idempotent() {
        let mut state = WatchState::new(Whitelist::new("/w"), Layout::default());
        let first = state.track(PathBuf::from("/w/gson"));
        let second = state.track(PathBuf::from("/w/gson"));
        assert_eq!(first, second);
        assert_eq!(state.len(), 1);
        assert_eq!(state.directory(first), Some(Path::new("/w/gson")));
    }
}
