//! Version classification engine for libdiff
//!
//! This crate provides:
//! - BLAKE3 content hashing
//! - Library directory layout (artifacts, content directories, reports)
//! - Content mapping of a version tree
//! - Release ordering of a library's versions
//! - Multi-version exclusive/modified/copied classification
//! - Durable diff reports with truncation detection
//! - The per-library reconciler tying these together

pub mod classify;
pub mod error;
pub mod hash;
pub mod layout;
pub mod mapper;
pub mod order;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod version;

// Re-exports
pub use classify::DiffClassifier;
pub use error::{Error, IoResultExt, Result};
pub use hash::Blake3Hash;
pub use layout::{ArtifactKind, Layout, Whitelist};
pub use mapper::{ContentMapper, FileMap};
pub use order::{ReleaseClock, VersionOrderResolver, ZipEntryClock};
pub use reconcile::{LibraryStatus, ReconcileSummary, Reconciler};
pub use report::{ReportCodec, ReportSummary};
pub use version::{Version, VersionRegistry};
