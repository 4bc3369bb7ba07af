/// diskusage core: traversal, aggregation, and reporting.
///
/// This crate contains all scanning logic with zero CLI dependencies.
/// It is designed to be reusable across different frontends.
///
/// # Modules
///
/// - [`model`]: Concurrent per-directory size map and size formatting.
/// - [`scanner`]: Parallel directory walker, scan session, and lifecycle events.
/// - [`report`]: Top-N directory report with text, JSON, and CSV output.
/// - [`error`]: Construction-time and per-directory error types.
pub mod error;
pub mod model;
pub mod report;
pub mod scanner;

pub use error::{ListError, ScanError};
pub use model::DirSizes;
pub use report::Report;
pub use scanner::{DirectoryScanner, ScanConfig, ScanEvent, ScanHandle, ScanOutcome, ScanStats};
