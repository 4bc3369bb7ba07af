/// Scanner module: orchestrates a disk usage scan.
///
/// A [`DirectoryScanner`] is one scan *session* owner: it holds the root,
/// the per-directory size map, a stopwatch, and a cancellation flag. Each
/// call to [`DirectoryScanner::start_scanning`] clears the map, walks the
/// tree on a bounded worker pool, and returns once the walk has finished or
/// observed a stop request.
///
/// [`start_scan`] runs a session on a background thread and returns a
/// [`ScanHandle`] so a frontend can poll progress and cancel while the walk
/// is in flight.
pub mod fs;
pub mod progress;
pub mod walk;

#[cfg(test)]
pub(crate) mod testing;

pub use fs::{EntryKind, FileSystem, FsEntry, OsFileSystem};
pub use progress::ScanEvent;
pub use walk::ScanStats;

use crate::error::ScanError;
use crate::model::{format_count, format_size, DirSizes};
use crate::report::Report;
use chrono::{DateTime, Local};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use progress::EventBus;
use rayon::ThreadPool;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use walk::{StatCounters, Walker};

/// Settings for a scan session.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory to scan.
    pub root: PathBuf,
    /// Worker threads for the walk. 0 means one per logical CPU.
    pub threads: usize,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            threads: 0,
        }
    }

    /// Set the number of worker threads (0 = auto).
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Worker thread count after resolving "auto".
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

/// Summary of one finished (or cancelled) session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub root: PathBuf,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub stats: ScanStats,
}

/// Monotonic scan timer, started and stopped only by the session thread.
#[derive(Debug, Default)]
struct Stopwatch {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Stopwatch {
    fn restart(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = Duration::ZERO;
    }

    fn stop(&mut self) -> Duration {
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
        self.elapsed
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => started.elapsed(),
            None => self.elapsed,
        }
    }
}

/// Owner of a scan session: root, aggregation map, timer, and stop flag.
pub struct DirectoryScanner {
    root: PathBuf,
    threads: usize,
    fs: Arc<dyn FileSystem>,
    pool: ThreadPool,
    sizes: DirSizes,
    cancel: AtomicBool,
    stats: StatCounters,
    events: EventBus,
    stopwatch: Mutex<Stopwatch>,
    last_outcome: Mutex<Option<ScanOutcome>>,
    /// Serialises sessions: a second `start_scanning` waits for the first.
    session: Mutex<()>,
}

impl DirectoryScanner {
    /// Create a scanner over the real filesystem.
    ///
    /// Fails if the root is empty, missing, or not a directory. This is the
    /// only point at which a scan can fail; per-directory errors during the
    /// walk are logged and skipped.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        Self::with_file_system(config, Arc::new(OsFileSystem))
    }

    /// Create a scanner that lists directories through `fs`.
    pub fn with_file_system(
        config: ScanConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, ScanError> {
        if config.root.as_os_str().is_empty() {
            return Err(ScanError::EmptyRoot);
        }
        let root = fs.normalize(&config.root);
        match fs.kind_of(&root) {
            None => return Err(ScanError::RootNotFound(config.root)),
            Some(EntryKind::Directory) => {}
            Some(_) => return Err(ScanError::RootNotDirectory(config.root)),
        }

        let threads = config.effective_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("diskusage-walker-{i}"))
            .build()?;

        Ok(Self {
            root,
            threads,
            fs,
            pool,
            sizes: DirSizes::new(),
            cancel: AtomicBool::new(false),
            stats: StatCounters::default(),
            events: EventBus::default(),
            stopwatch: Mutex::new(Stopwatch::default()),
            last_outcome: Mutex::new(None),
            session: Mutex::new(()),
        })
    }

    /// Normalised scan root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one full scan session, blocking until it completes or is stopped.
    ///
    /// Never fails: unreadable subtrees are skipped and a stop request just
    /// ends the walk early, leaving the partial totals in place.
    pub fn start_scanning(&self) -> ScanOutcome {
        let _session = self.session.lock();

        self.sizes.clear();
        self.stats.reset();
        let started_at = Local::now();
        self.stopwatch.lock().restart();

        info!(
            "Starting scan of {} with {} worker threads",
            self.root.display(),
            self.threads
        );
        self.events.emit(ScanEvent::Started {
            root: self.root.clone(),
        });

        let walker = Walker::new(
            self.fs.as_ref(),
            &self.sizes,
            &self.cancel,
            &self.stats,
            &self.events,
        );
        let cancelled = walker.walk(&self.pool, &self.root);

        let elapsed = self.stopwatch.lock().stop();
        // A stop request applies to the scan in flight (or the next one, if
        // issued while idle) and is consumed here. One that arrives after
        // every task has finished leaves the scan complete.
        self.cancel.store(false, Ordering::Relaxed);
        let stats = self.stats.snapshot();

        if cancelled {
            info!(
                "Scan cancelled after {elapsed:?}: {} directories recorded",
                self.sizes.len()
            );
            self.events.emit(ScanEvent::Cancelled {
                duration: elapsed,
                stats,
            });
        } else {
            info!(
                "Scan complete: {} directories, {} files, {} in {elapsed:?} ({} skipped)",
                format_count(self.sizes.len() as u64),
                format_count(stats.files_counted),
                format_size(stats.bytes_counted),
                format_count(stats.error_count())
            );
            self.events.emit(ScanEvent::Done {
                duration: elapsed,
                stats,
            });
        }

        let outcome = ScanOutcome {
            root: self.root.clone(),
            started_at,
            elapsed,
            cancelled,
            stats,
        };
        *self.last_outcome.lock() = Some(outcome.clone());
        outcome
    }

    /// Request that the running scan stop as soon as possible. Does not wait.
    pub fn stop_scanning(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Number of directories recorded so far. Safe to poll mid-scan.
    pub fn current_entry_count(&self) -> usize {
        self.sizes.len()
    }

    /// Time spent in the current scan, or in the last one if idle.
    pub fn elapsed(&self) -> Duration {
        self.stopwatch.lock().elapsed()
    }

    /// Outcome of the most recent finished session.
    pub fn last_outcome(&self) -> Option<ScanOutcome> {
        self.last_outcome.lock().clone()
    }

    /// Read-only access to the aggregation map.
    pub fn sizes(&self) -> &DirSizes {
        &self.sizes
    }

    /// Point-in-time copy of the aggregation map, ordered by path.
    pub fn snapshot(&self) -> Vec<(PathBuf, u64)> {
        self.sizes.snapshot()
    }

    /// Top-`count` directories by size plus the scan duration.
    pub fn get_report(&self, count: usize) -> Report {
        let mut report = Report::from_snapshot(&self.sizes.snapshot(), count, self.elapsed());
        if let Some(outcome) = self.last_outcome() {
            report = report
                .with_started_at(outcome.started_at)
                .with_cancelled(outcome.cancelled);
        }
        report
    }

    /// Subscribe to lifecycle events of every subsequent session.
    pub fn subscribe(&self) -> Receiver<ScanEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("root", &self.root)
            .field("threads", &self.threads)
            .field("entries", &self.sizes.len())
            .finish()
    }
}

/// Handle to a scan running on a background thread. Allows cancellation,
/// polling, and waiting for the outcome.
pub struct ScanHandle {
    /// Lifecycle events for this session.
    pub events: Receiver<ScanEvent>,
    scanner: Arc<DirectoryScanner>,
    thread: Option<thread::JoinHandle<ScanOutcome>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible.
    pub fn cancel(&self) {
        self.scanner.stop_scanning();
    }

    /// The scanner driving this session, for polling and reports.
    pub fn scanner(&self) -> &Arc<DirectoryScanner> {
        &self.scanner
    }

    /// `true` once the background thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Block until the session ends and return its outcome.
    ///
    /// Returns `None` if the scan thread panicked.
    pub fn join(mut self) -> Option<ScanOutcome> {
        self.thread.take()?.join().ok()
    }
}

/// Start a scan session of `scanner` on a background thread.
///
/// The event subscription is taken before the thread starts, so the
/// returned handle always sees `Started` and the terminal event.
pub fn start_scan(scanner: Arc<DirectoryScanner>) -> std::io::Result<ScanHandle> {
    let events = scanner.subscribe();
    let worker = Arc::clone(&scanner);
    let thread = thread::Builder::new()
        .name("diskusage-scanner".into())
        .spawn(move || worker.start_scanning())?;

    Ok(ScanHandle {
        events,
        scanner,
        thread: Some(thread),
    })
}
