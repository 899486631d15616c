//! Live watching of a whitelist for libdiff
//!
//! This crate provides:
//! - A pure state machine mapping filesystem events to actions
//! - A `notify` backend watching directories one by one
//! - Settling of freshly created files
//! - The single-threaded engine executing actions: unpack, decompile,
//!   reconcile, warn

pub mod backend;
pub mod settle;
pub mod state;

pub use backend::{DirectoryWatch, NotifyBackend};
pub use settle::{Settled, Settler};
pub use state::{FsEvent, WatchAction, WatchHandle, WatchState};

use crossbeam_channel::Receiver;
use libdiff_core::error::Result;
use libdiff_core::layout::{ArtifactKind, Whitelist};
use libdiff_core::Reconciler;
use libdiff_toolchain::Toolchain;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Single-threaded watch loop over a whitelist
///
/// Reconciliation runs synchronously on the loop thread; events arriving
/// meanwhile queue up in the channel.
pub struct WatchEngine<B: DirectoryWatch> {
    state: WatchState,
    backend: B,
    reconciler: Arc<Reconciler>,
    toolchain: Arc<Toolchain>,
    settler: Settler,
}

impl<B: DirectoryWatch> WatchEngine<B> {
    /// Register every directory of the whitelist
    ///
    /// Any registration failure here is fatal and returned.
    pub fn start(
        whitelist: Whitelist,
        backend: B,
        reconciler: Arc<Reconciler>,
        toolchain: Arc<Toolchain>,
        settler: Settler,
    ) -> Result<Self> {
        let layout = reconciler.layout().clone();
        let mut engine = Self {
            state: WatchState::new(whitelist, layout),
            backend,
            reconciler,
            toolchain,
            settler,
        };

        let root = engine.state.whitelist().root().to_path_buf();
        info!(root = %root.display(), "starting watch service");
        engine.register_tree(&root, true)?;
        info!(directories = engine.state.len(), "watch service running");
        Ok(engine)
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Process events until the channel closes or no watch remains
    pub fn run(&mut self, events: Receiver<FsEvent>) {
        while let Ok(first) = events.recv() {
            // Drain whatever else is already queued as one batch
            let batch: Vec<FsEvent> = std::iter::once(first).chain(events.try_iter()).collect();
            debug!(events = batch.len(), "processing batch");
            for event in batch {
                if self.handle(event).contains(&WatchAction::Stop) {
                    info!("all watched directories are gone, stopping");
                    return;
                }
            }
        }
        info!("event source closed, stopping");
    }

    /// Apply one event and return every action executed because of it
    ///
    /// Follow-up events (artifacts found by a library scan) are processed
    /// before returning.
    pub fn handle(&mut self, event: FsEvent) -> Vec<WatchAction> {
        let mut executed = Vec::new();
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            debug!(?event, "event");
            for action in self.state.transition(event) {
                pending.extend(self.execute(&action));
                let stop = action == WatchAction::Stop;
                executed.push(action);
                if stop {
                    return executed;
                }
            }
        }
        executed
    }

    /// Perform one action, returning synthesized follow-up events
    fn execute(&mut self, action: &WatchAction) -> Vec<FsEvent> {
        match action {
            WatchAction::Register(dir) => {
                if let Err(e) = self.register_tree(dir, false) {
                    warn!(dir = %dir.display(), error = %e, "cannot watch new directory");
                }
            }
            WatchAction::ScanLibrary(library) => return self.scan_library(library),
            WatchAction::Unwatched(dir) => {
                // The directory is already gone; the backend may have dropped it too
                if let Err(e) = self.backend.unwatch(dir) {
                    debug!(dir = %dir.display(), error = %e, "unwatch after removal");
                }
                debug!(dir = %dir.display(), remaining = self.state.len(), "watch dropped");
            }
            WatchAction::ExtractPackage(package) => self.extract(package),
            WatchAction::DecompileAndReconcile { artifact, library } => {
                self.decompile_and_reconcile(artifact, library)
            }
            WatchAction::WarnArtifactDeleted(artifact) => {
                warn!(
                    artifact = %artifact.display(),
                    "build artifacts cannot be removed while running: remove its content \
                     directory manually and restart to re-sync the library"
                );
            }
            WatchAction::WarnOverflow => {
                warn!("overflow detected, some changes to the whitelist may have been missed");
            }
            WatchAction::Stop => {}
        }
        Vec::new()
    }

    /// Watch `start` and every non-hidden directory below it
    fn register_tree(&mut self, start: &Path, initial: bool) -> Result<()> {
        let walker = WalkDir::new(start)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if initial => return Err(e.into()),
                Err(e) => {
                    debug!(error = %e, "directory vanished during registration");
                    continue;
                }
            };
            if !entry.file_type().is_dir() || self.state.is_tracked(entry.path()) {
                continue;
            }
            self.backend.watch(entry.path())?;
            let handle = self.state.track(entry.path().to_path_buf());
            debug!(dir = %entry.path().display(), ?handle, "watching");
        }
        Ok(())
    }

    /// Creation events for artifacts already sitting in a new library
    fn scan_library(&self, library: &Path) -> Vec<FsEvent> {
        let layout = self.state.layout();
        let mut found = Vec::new();
        for kind in [ArtifactKind::Package, ArtifactKind::Build] {
            match layout.artifacts(library, kind) {
                Ok(paths) => found.extend(paths),
                Err(e) => warn!(library = %library.display(), error = %e, "cannot scan new library"),
            }
        }
        found
            .into_iter()
            .map(|path| FsEvent::Created {
                path,
                is_dir: false,
            })
            .collect()
    }

    /// Settle `path`; false when it vanished meanwhile
    fn settle(&self, path: &Path) -> bool {
        match self.settler.wait(path) {
            Settled::Stable => true,
            Settled::Unstable => {
                warn!(path = %path.display(), "file still changing after settle checks, processing anyway");
                true
            }
            Settled::Gone => {
                debug!(path = %path.display(), "file vanished before processing");
                false
            }
        }
    }

    fn extract(&self, package: &Path) {
        if !self.settle(package) {
            return;
        }
        if let Err(e) = self.toolchain.extract_package(package) {
            warn!(package = %package.display(), error = %e, "failed to unpack archive");
        }
    }

    fn decompile_and_reconcile(&self, artifact: &Path, library: &Path) {
        if !self.settle(artifact) {
            return;
        }
        if let Err(e) = self.toolchain.decompile_artifact(artifact) {
            warn!(artifact = %artifact.display(), error = %e, "failed to decompile, version skipped");
            return;
        }
        match self.reconciler.reconcile_if_needed(library) {
            Ok(Some(summary)) => {
                info!(library = %library.display(), versions = summary.versions, "library re-synced")
            }
            Ok(None) => {}
            Err(e) => warn!(library = %library.display(), error = %e, "reconciliation failed"),
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

/// Convenience: native backend plus its event channel
pub fn native_backend() -> Result<(NotifyBackend, Receiver<FsEvent>)> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let backend = NotifyBackend::new(tx)?;
    Ok((backend, rx))
}
