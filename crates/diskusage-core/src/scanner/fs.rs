/// Filesystem metadata provider used by the walker.
///
/// The walker only needs one capability from the filesystem: list the
/// immediate children of a directory with enough metadata to classify each
/// child and size it. Keeping that behind the [`FileSystem`] trait lets the
/// scanner run against an in-memory tree in tests, where permission errors
/// can be produced deterministically regardless of the user running them.
use crate::error::ListError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Classification of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlink, junction, or other reparse point. Never followed.
    /// `is_dir` records whether it points at (or is flagged as) a directory.
    Reparse { is_dir: bool },
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    /// Full path of the entry.
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Byte length. Always 0 for directories.
    pub len: u64,
}

impl FsEntry {
    pub fn file(path: impl Into<PathBuf>, len: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            len,
        }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            len: 0,
        }
    }

    pub fn reparse(path: impl Into<PathBuf>, is_dir: bool, len: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Reparse { is_dir },
            len,
        }
    }
}

/// Source of directory listings for a scan.
///
/// Implementations must be shareable across the walker's worker threads.
pub trait FileSystem: Send + Sync {
    /// List the immediate children of `dir`.
    ///
    /// Permission failures must be reported as [`ListError::AccessDenied`]
    /// so the walker can tell them apart from other I/O failures.
    fn read_dir(&self, dir: &Path) -> Result<Vec<FsEntry>, ListError>;

    /// Classify `path` itself, following links. `None` if it does not exist.
    /// Used once per session to validate the scan root.
    fn kind_of(&self, path: &Path) -> Option<EntryKind>;

    /// Turn a user-supplied root into the form used for map keys.
    fn normalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_dir(&self, dir: &Path) -> Result<Vec<FsEntry>, ListError> {
        let iter = fs::read_dir(dir).map_err(|e| ListError::from_io(dir, e))?;

        let mut entries = Vec::new();
        for entry in iter {
            let entry = entry.map_err(|e| ListError::from_io(dir, e))?;
            let path = entry.path();

            // Stat without following links: a symlink must be classified as
            // itself, not as whatever it points to.
            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("{} vanished during listing", path.display());
                    continue;
                }
                Err(err) => return Err(ListError::from_io(dir, err)),
            };

            let kind = if is_reparse_point(&meta) {
                let is_dir = meta.is_dir()
                    || match fs::metadata(&path) {
                        Ok(target) => target.is_dir(),
                        Err(err) => {
                            debug!(
                                "{} is a reparse point with an unreadable target ({err}). Counting the link itself.",
                                path.display()
                            );
                            false
                        }
                    };
                EntryKind::Reparse { is_dir }
            } else if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            let len = if meta.is_dir() { 0 } else { meta.len() };
            entries.push(FsEntry { path, kind, len });
        }
        Ok(entries)
    }

    fn kind_of(&self, path: &Path) -> Option<EntryKind> {
        let meta = fs::metadata(path).ok()?;
        Some(if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(windows)]
fn is_reparse_point(meta: &fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    meta.file_type().is_symlink() || meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
fn is_reparse_point(meta: &fs::Metadata) -> bool {
    meta.file_type().is_symlink()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, n: usize) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(&vec![0u8; n]).unwrap();
    }

    #[test]
    fn lists_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        write_bytes(&tmp.path().join("a.bin"), 77);

        let mut entries = OsFileSystem.read_dir(tmp.path()).unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            entries,
            vec![
                FsEntry::file(tmp.path().join("a.bin"), 77),
                FsEntry::dir(tmp.path().join("sub")),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_unclassified_error() {
        let tmp = TempDir::new().unwrap();
        let err = OsFileSystem
            .read_dir(&tmp.path().join("missing"))
            .unwrap_err();
        assert!(!err.is_access_denied());
    }

    #[test]
    fn kind_of_reports_root_state() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("f"), 1);

        assert_eq!(OsFileSystem.kind_of(tmp.path()), Some(EntryKind::Directory));
        assert_eq!(OsFileSystem.kind_of(&tmp.path().join("f")), Some(EntryKind::File));
        assert_eq!(OsFileSystem.kind_of(&tmp.path().join("nope")), None);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_reparse_points() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        fs::create_dir(&target).unwrap();
        std::os::unix::fs::symlink(&target, tmp.path().join("link")).unwrap();

        let entries = OsFileSystem.read_dir(tmp.path()).unwrap();
        let link = entries
            .iter()
            .find(|e| e.path.ends_with("link"))
            .expect("link entry listed");
        assert_eq!(link.kind, EntryKind::Reparse { is_dir: true });
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_a_file_reparse_point() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        std::os::unix::fs::symlink(tmp.path().join("gone"), &link).unwrap();

        let entries = OsFileSystem.read_dir(tmp.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Reparse { is_dir: false });
        assert_eq!(entries[0].len, fs::symlink_metadata(&link).unwrap().len());
    }
}
