/// Parallel directory walker: the traversal half of a scan.
///
/// Every discovered subdirectory becomes an independent task on a bounded
/// rayon pool. Tasks are spawned into a single `rayon::Scope`, whose
/// work-stealing deques act as the queue of pending directories, so sibling
/// subtrees are expanded in parallel while the number of threads stays fixed.
/// The scope only returns once every spawned task has finished, which means
/// the map is fully aggregated when [`Walker::walk`] returns.
///
/// # Failure policy
///
/// A directory that cannot be listed is abandoned on its own: its siblings,
/// and every task already queued, carry on. Access denial is expected on
/// real trees and is logged at `warn` like any other failure but counted
/// separately.
use super::fs::{EntryKind, FileSystem, FsEntry};
use super::progress::{EventBus, ScanEvent};
use crate::error::ListError;
use crate::model::DirSizes;
use rayon::{Scope, ThreadPool};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Counters describing one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Directories whose listing succeeded.
    pub dirs_listed: u64,
    /// Files (including non-directory reparse points) whose size was recorded.
    pub files_counted: u64,
    /// Sum of every recorded file size.
    pub bytes_counted: u64,
    /// Subtrees abandoned because listing was denied.
    pub access_denied: u64,
    /// Subtrees abandoned for any other listing failure.
    pub failed: u64,
    /// Reparse points seen and not followed.
    pub reparse_skipped: u64,
}

impl ScanStats {
    /// Total number of abandoned subtrees.
    pub fn error_count(&self) -> u64 {
        self.access_denied + self.failed
    }
}

/// Atomic backing store for [`ScanStats`], updated from worker threads.
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    dirs_listed: AtomicU64,
    files_counted: AtomicU64,
    bytes_counted: AtomicU64,
    access_denied: AtomicU64,
    failed: AtomicU64,
    reparse_skipped: AtomicU64,
}

impl StatCounters {
    pub(crate) fn reset(&self) {
        for counter in [
            &self.dirs_listed,
            &self.files_counted,
            &self.bytes_counted,
            &self.access_denied,
            &self.failed,
            &self.reparse_skipped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> ScanStats {
        ScanStats {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            files_counted: self.files_counted.load(Ordering::Relaxed),
            bytes_counted: self.bytes_counted.load(Ordering::Relaxed),
            access_denied: self.access_denied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            reparse_skipped: self.reparse_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Borrowed view of everything one walk touches.
pub(crate) struct Walker<'a> {
    fs: &'a dyn FileSystem,
    sizes: &'a DirSizes,
    cancel: &'a AtomicBool,
    stats: &'a StatCounters,
    events: &'a EventBus,
    /// Set by the first task that returns early on a stop request.
    stopped: AtomicBool,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(
        fs: &'a dyn FileSystem,
        sizes: &'a DirSizes,
        cancel: &'a AtomicBool,
        stats: &'a StatCounters,
        events: &'a EventBus,
    ) -> Self {
        Self {
            fs,
            sizes,
            cancel,
            stats,
            events,
            stopped: AtomicBool::new(false),
        }
    }

    /// Walk `root` on `pool`, blocking until every dispatched subtree is done
    /// or cancellation has drained the queue.
    ///
    /// Returns `true` if any directory was left unexpanded or partially
    /// expanded because of a stop request. A request raised after the last
    /// task finished does not count.
    pub(crate) fn walk(&self, pool: &ThreadPool, root: &Path) -> bool {
        self.sizes.ensure(root);
        pool.scope(|scope| self.expand(scope, root.to_path_buf()));
        self.stopped.load(Ordering::Relaxed)
    }

    #[inline]
    fn cancelled(&self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            self.stopped.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Expand one directory: record its files, queue its subdirectories.
    fn expand<'s>(&'s self, scope: &Scope<'s>, dir: PathBuf) {
        // Tasks queued before a stop request still run; make them no-ops.
        if self.cancelled() {
            return;
        }

        let entries = match self.fs.read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                self.abandon(err);
                return;
            }
        };
        self.stats.dirs_listed.fetch_add(1, Ordering::Relaxed);

        for entry in entries {
            if self.cancelled() {
                return;
            }
            let FsEntry { path, kind, len } = entry;
            match kind {
                EntryKind::Reparse { is_dir } => {
                    debug!("{} is a reparse point. Skipping.", path.display());
                    self.stats.reparse_skipped.fetch_add(1, Ordering::Relaxed);
                    if is_dir {
                        // Recorded with 0 bytes, never expanded.
                        self.sizes.ensure(&path);
                    } else {
                        self.record_file(&dir, len);
                    }
                }
                EntryKind::Directory => {
                    // Registered before descent so that an empty or unreadable
                    // directory still shows up with 0 bytes.
                    self.sizes.ensure(&path);
                    debug!("Descending into {}", path.display());
                    scope.spawn(move |scope| self.expand(scope, path));
                }
                EntryKind::File => self.record_file(&dir, len),
            }
        }
    }

    fn record_file(&self, parent: &Path, len: u64) {
        self.sizes.add_size(parent, len);
        self.stats.files_counted.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_counted.fetch_add(len, Ordering::Relaxed);
    }

    fn abandon(&self, err: ListError) {
        let access_denied = err.is_access_denied();
        if access_denied {
            self.stats.access_denied.fetch_add(1, Ordering::Relaxed);
            warn!("{err}. Skipping.");
        } else {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!("{err}. Abandoning subtree.");
        }
        self.events.emit(ScanEvent::Error {
            path: err.path().to_path_buf(),
            message: err.to_string(),
            access_denied,
        });
    }
}
