//! Directory watch backends
//!
//! Directories are watched one by one (non-recursively) so the engine's
//! handle table mirrors exactly what the OS is watching.

use crate::state::FsEvent;
use crossbeam_channel::Sender;
use libdiff_core::error::{Error, Result};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Registers and releases single-directory watches
pub trait DirectoryWatch {
    fn watch(&mut self, dir: &Path) -> Result<()>;
    fn unwatch(&mut self, dir: &Path) -> Result<()>;
}

/// Native backend built on `notify`
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    /// Backend forwarding translated events to `events`
    pub fn new(events: Sender<FsEvent>) -> Result<Self> {
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for fs_event in translate(event) {
                        // Receiver gone means the engine stopped
                        if events.send(fs_event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "watch backend emitted error");
                    let _ = events.send(FsEvent::Overflow);
                }
            }
        })
        .map_err(|e| Error::Watch {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        Ok(Self { watcher })
    }
}

impl DirectoryWatch for NotifyBackend {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn unwatch(&mut self, dir: &Path) -> Result<()> {
        self.watcher.unwatch(dir).map_err(|e| Error::Watch {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Translate a backend event into engine events
pub fn translate(event: Event) -> Vec<FsEvent> {
    if event.need_rescan() {
        return vec![FsEvent::Overflow];
    }

    let Event { kind, paths, .. } = event;
    match kind {
        EventKind::Create(CreateKind::Folder) => paths
            .into_iter()
            .map(|path| FsEvent::Created { path, is_dir: true })
            .collect(),
        EventKind::Create(CreateKind::File) => paths
            .into_iter()
            .map(|path| FsEvent::Created {
                path,
                is_dir: false,
            })
            .collect(),
        EventKind::Create(_) => paths.into_iter().map(created).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(paths, mode),
        EventKind::Modify(_) => paths
            .into_iter()
            .map(|path| FsEvent::Modified { path })
            .collect(),
        EventKind::Remove(_) => paths
            .into_iter()
            .map(|path| FsEvent::Deleted { path })
            .collect(),
        _ => Vec::new(),
    }
}

fn translate_rename(paths: Vec<PathBuf>, mode: RenameMode) -> Vec<FsEvent> {
    match mode {
        RenameMode::Both => {
            let mut events = Vec::with_capacity(2);
            if let Some(from) = paths.first() {
                events.push(FsEvent::Deleted { path: from.clone() });
            }
            if let Some(to) = paths.get(1) {
                events.push(created(to.clone()));
            }
            events
        }
        RenameMode::From => paths
            .into_iter()
            .map(|path| FsEvent::Deleted { path })
            .collect(),
        RenameMode::To => paths.into_iter().map(created).collect(),
        RenameMode::Any | RenameMode::Other => paths
            .into_iter()
            .map(|path| {
                if path.symlink_metadata().is_ok() {
                    created(path)
                } else {
                    FsEvent::Deleted { path }
                }
            })
            .collect(),
    }
}

/// Creation event with the directory flag read from disk
fn created(path: PathBuf) -> FsEvent {
    let is_dir = path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false);
    FsEvent::Created { path, is_dir }
}
