//! Error taxonomy shared by every libdiff crate

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recoverable failures of the reconciliation pipeline
///
/// None of these abort the process on their own: callers log them with the
/// affected library and move on. The only fatal case is a `Watch` error during
/// the initial registration, decided by the watcher.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory could not be read or written
    #[error("I/O failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Archive extraction or decompilation failed for one artifact
    #[error("external tool failed for {}: {reason}", artifact.display())]
    ExternalTool { artifact: PathBuf, reason: String },

    /// The notification backend refused to watch a directory
    #[error("cannot watch {}: {reason}", path.display())]
    Watch { path: PathBuf, reason: String },
}

impl Error {
    /// Build an `ExternalTool` error
    pub fn tool(artifact: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExternalTool {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Path the failure is about
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } => path,
            Self::ExternalTool { artifact, .. } => artifact,
            Self::Watch { path, .. } => path,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf).unwrap_or_default();
        let source = err
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
        Self::Io { path, source }
    }
}

/// Result type for libdiff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Attach the offending path to an `io::Result`
pub trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
