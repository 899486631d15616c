//! Startup sweep over every library of a whitelist
//!
//! A fixed pool of worker threads drains a shared queue of library roots.
//! Each root is claimed by exactly one worker, so parallelism is across
//! libraries only. Per library a worker:
//! 1. Prepares pending artifacts through the toolchain (optional)
//! 2. Reconciles the library if any eligible version lacks a valid report
//!
//! A failing library is logged and skipped; it never stops the sweep.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use libdiff_core::Reconciler;
use libdiff_toolchain::Toolchain;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Default bound on how long the caller waits for the pool (one week)
pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Libraries whose reports were recomputed
    pub reconciled: usize,
    /// Libraries that already had a valid report for every version
    pub up_to_date: usize,
    /// Libraries skipped because of an error, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Artifacts unpacked or decompiled before reconciliation
    pub prepared: usize,
    /// Whether the wait ceiling elapsed before every worker finished
    pub timed_out: bool,
}

impl SweepSummary {
    pub fn libraries(&self) -> usize {
        self.reconciled + self.up_to_date + self.failed.len()
    }
}

/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct StartupSweep {
    threads: usize,
    wait_ceiling: Duration,
}

impl Default for StartupSweep {
    fn default() -> Self {
        Self::new(DEFAULT_THREADS, DEFAULT_WAIT_CEILING)
    }
}

/// State shared by every worker
struct SweepContext {
    queue: Receiver<PathBuf>,
    reconciler: Arc<Reconciler>,
    toolchain: Option<Arc<Toolchain>>,
    reconciled: AtomicUsize,
    up_to_date: AtomicUsize,
    prepared: AtomicUsize,
    failed: Mutex<Vec<(PathBuf, String)>>,
}

impl StartupSweep {
    /// Pool of `threads` workers (at least one)
    pub fn new(threads: usize, wait_ceiling: Duration) -> Self {
        Self {
            threads: threads.max(1),
            wait_ceiling,
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Sweep `roots`, blocking until the queue is drained or the ceiling hits
    ///
    /// Without a toolchain only already-decompiled versions are considered.
    pub fn run(
        &self,
        roots: Vec<PathBuf>,
        reconciler: Arc<Reconciler>,
        toolchain: Option<Arc<Toolchain>>,
    ) -> SweepSummary {
        let started = Instant::now();
        let total = roots.len();

        // 1. Seed the queue; dropping the sender lets workers exit once empty
        let (queue_tx, queue_rx) = unbounded();
        for root in roots {
            // Receiver is alive, send cannot fail
            let _ = queue_tx.send(root);
        }
        drop(queue_tx);

        let context = Arc::new(SweepContext {
            queue: queue_rx,
            reconciler,
            toolchain,
            reconciled: AtomicUsize::new(0),
            up_to_date: AtomicUsize::new(0),
            prepared: AtomicUsize::new(0),
            failed: Mutex::new(Vec::new()),
        });

        info!(libraries = total, threads = self.threads, "starting sweep");

        // 2. Spawn workers; each reports on `done_tx` when it exits
        let (done_tx, done_rx) = unbounded::<usize>();
        let mut workers = Vec::with_capacity(self.threads);
        for id in 0..self.threads {
            let worker_context = Arc::clone(&context);
            let worker_done = done_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("sweep-{}", id))
                .spawn(move || {
                    worker_loop(id, &worker_context);
                    let _ = worker_done.send(id);
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(worker = id, error = %e, "failed to spawn sweep worker"),
            }
        }
        drop(done_tx);

        // Nothing could be spawned: drain on the caller's thread
        if workers.is_empty() {
            worker_loop(0, &context);
        }

        // 3. Bounded wait for every worker to finish
        let timed_out = wait_for_workers(&done_rx, workers.len(), self.wait_ceiling);
        if timed_out {
            warn!(
                ceiling_secs = self.wait_ceiling.as_secs(),
                "sweep wait ceiling reached, continuing without remaining workers"
            );
        } else {
            for handle in workers {
                if handle.join().is_err() {
                    warn!("sweep worker panicked");
                }
            }
        }

        let summary = SweepSummary {
            reconciled: context.reconciled.load(Ordering::Acquire),
            up_to_date: context.up_to_date.load(Ordering::Acquire),
            failed: context.failed.lock().clone(),
            prepared: context.prepared.load(Ordering::Acquire),
            timed_out,
        };
        info!(
            reconciled = summary.reconciled,
            up_to_date = summary.up_to_date,
            failed = summary.failed.len(),
            prepared = summary.prepared,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sweep complete"
        );
        summary
    }
}

/// Returns true if the ceiling elapsed before `expected` workers reported
fn wait_for_workers(done: &Receiver<usize>, expected: usize, ceiling: Duration) -> bool {
    let deadline = Instant::now() + ceiling;
    let mut finished = 0;
    while finished < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(id) => {
                debug!(worker = id, "sweep worker finished");
                finished += 1;
            }
            Err(RecvTimeoutError::Timeout) => return true,
            // A panicking worker drops its sender without reporting
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
    false
}

fn worker_loop(id: usize, context: &SweepContext) {
    while let Ok(root) = context.queue.recv() {
        debug!(worker = id, library = %root.display(), "claimed library");
        sweep_library(context, root);
    }
}

fn sweep_library(context: &SweepContext, root: PathBuf) {
    if let Some(toolchain) = &context.toolchain {
        match toolchain.prepare_library(&root) {
            Ok(outcome) => {
                context
                    .prepared
                    .fetch_add(outcome.extracted + outcome.decompiled, Ordering::AcqRel);
            }
            Err(e) => {
                warn!(library = %root.display(), error = %e, "cannot prepare library, skipping");
                context.failed.lock().push((root, e.to_string()));
                return;
            }
        }
    }

    match context.reconciler.reconcile_if_needed(&root) {
        Ok(Some(_)) => {
            context.reconciled.fetch_add(1, Ordering::AcqRel);
        }
        Ok(None) => {
            context.up_to_date.fetch_add(1, Ordering::AcqRel);
        }
        Err(e) => {
            warn!(library = %root.display(), error = %e, "reconciliation failed, skipping");
            context.failed.lock().push((root, e.to_string()));
        }
    }
}
