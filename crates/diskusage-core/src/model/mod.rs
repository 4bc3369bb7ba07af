/// Data model for a disk usage scan.
///
/// Re-exports the concurrent per-directory size map and formatting helpers.
pub mod dir_sizes;
pub mod size;

pub use dir_sizes::DirSizes;
pub use size::{format_count, format_elapsed, format_size};
