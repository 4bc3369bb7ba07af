/// Error types for the scanner.
///
/// Only [`ScanError`] ever reaches a caller: it is raised while a session is
/// being constructed. [`ListError`] is produced per directory during a walk
/// and is logged and counted, never propagated.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions that prevent a scan session from being created.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root path was empty.
    #[error("scan root must not be empty")]
    EmptyRoot,

    /// The root path does not exist or cannot be stat'ed.
    #[error("the specified path, \"{}\", could not be accessed", .0.display())]
    RootNotFound(PathBuf),

    /// The root path exists but is not a directory.
    #[error("\"{}\" is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    /// The worker pool could not be created.
    #[error("failed to build scan worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure to list one directory.
///
/// Access denial is kept distinct from everything else because deep trees
/// routinely contain restricted nodes and those are logged more quietly.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("{} is inaccessible: {source}", path.display())]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    /// Classify an I/O error raised while listing `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            ListError::AccessDenied { path, source }
        } else {
            ListError::Io { path, source }
        }
    }

    /// Directory the failure occurred on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ListError::AccessDenied { path, .. } | ListError::Io { path, .. } => path,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ListError::AccessDenied { .. })
    }
}
