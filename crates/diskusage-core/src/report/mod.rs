/// Top-N directory report.
///
/// Ranks a snapshot of the aggregation map by size and renders the largest
/// directories followed by a one-line trailer:
///
/// ```text
/// /data/videos: 41.27 GB
/// /data/photos: 3.1 GB
/// 1842 directories scanned in 00:02:13
/// ```
///
/// The same [`Report`] serialises to JSON for machine consumers, and
/// [`export`] writes the full, unranked snapshot as CSV.
pub mod export;

use crate::model::{format_elapsed, format_size};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use export::write_csv;

/// One ranked directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub path: PathBuf,
    pub bytes: u64,
    /// `bytes` formatted for humans, e.g. `"1.5 KB"`.
    pub size: String,
}

/// Ranked top-N directories plus scan totals.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Largest directories, descending by size.
    pub rows: Vec<ReportRow>,
    /// Number of directories in the snapshot, not just the ones shown.
    pub directory_count: usize,
    /// Bytes across every directory in the snapshot.
    pub total_bytes: u64,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Local>>,
    /// The scan was stopped early; totals cover only what was visited.
    pub cancelled: bool,
}

fn serialize_elapsed<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_elapsed(*elapsed))
}

/// Descending by size; equal sizes fall back to ascending path so the
/// ranking is deterministic for a given snapshot.
#[inline]
fn rank(a: &(PathBuf, u64), b: &(PathBuf, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Select the `count` largest entries of `snapshot`, largest first.
///
/// Uses `select_nth_unstable_by` (O(n) average) to bring the top-N
/// entries to the front, then sorts only those N (O(k log k)). `rank` is a
/// total order, so the unstable algorithms still give a deterministic result.
pub fn top_directories(snapshot: &[(PathBuf, u64)], count: usize) -> Vec<(PathBuf, u64)> {
    if count == 0 || snapshot.is_empty() {
        return Vec::new();
    }

    let mut entries = snapshot.to_vec();
    if entries.len() > count {
        entries.select_nth_unstable_by(count - 1, rank);
        entries.truncate(count);
    }
    entries.sort_unstable_by(rank);
    entries
}

impl Report {
    /// Build a report of the `count` largest directories in `snapshot`.
    ///
    /// A `count` above the number of directories shows all of them; 0 shows
    /// only the trailer.
    pub fn from_snapshot(snapshot: &[(PathBuf, u64)], count: usize, elapsed: Duration) -> Self {
        let rows = top_directories(snapshot, count)
            .into_iter()
            .map(|(path, bytes)| ReportRow {
                size: format_size(bytes),
                path,
                bytes,
            })
            .collect();

        Self {
            rows,
            directory_count: snapshot.len(),
            total_bytes: snapshot.iter().map(|(_, bytes)| bytes).sum(),
            elapsed,
            started_at: None,
            cancelled: false,
        }
    }

    pub fn with_started_at(mut self, started_at: DateTime<Local>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// The trailer line, without a newline.
    pub fn trailer(&self) -> String {
        format!(
            "{} directories scanned in {}",
            self.directory_count,
            format_elapsed(self.elapsed)
        )
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One `"{path}: {size}"` line per row, then the trailer. Every line,
/// including the last, ends with a newline.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}: {}", row.path.display(), row.size)?;
        }
        writeln!(f, "{}", self.trailer())
    }
}

/// Render the text report for `snapshot` in one call.
pub fn render(snapshot: &[(PathBuf, u64)], count: usize, elapsed: Duration) -> String {
    Report::from_snapshot(snapshot, count, elapsed).to_string()
}
