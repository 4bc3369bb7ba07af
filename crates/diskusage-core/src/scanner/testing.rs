/// In-memory [`FileSystem`] for unit tests.
///
/// Lets tests produce access-denied and mid-walk I/O failures on demand,
/// which a real temporary directory cannot do reliably (tests may run as
/// root, where permission bits are ignored).
use super::fs::{EntryKind, FileSystem, FsEntry};
use crate::error::ListError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

enum Listing {
    Entries(Vec<FsEntry>),
    Denied,
    Failed,
}

type ListHook = Box<dyn Fn(&Path) + Send + Sync>;

#[derive(Default)]
pub(crate) struct MemoryFileSystem {
    listings: HashMap<PathBuf, Listing>,
    list_counts: Mutex<HashMap<PathBuf, usize>>,
    on_list: Option<ListHook>,
}

impl MemoryFileSystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn dir(mut self, path: impl Into<PathBuf>, entries: Vec<FsEntry>) -> Self {
        self.listings.insert(path.into(), Listing::Entries(entries));
        self
    }

    pub(crate) fn access_denied(mut self, path: impl Into<PathBuf>) -> Self {
        self.listings.insert(path.into(), Listing::Denied);
        self
    }

    pub(crate) fn io_error(mut self, path: impl Into<PathBuf>) -> Self {
        self.listings.insert(path.into(), Listing::Failed);
        self
    }

    /// Run `hook` at the start of every `read_dir` call.
    pub(crate) fn on_list(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.on_list = Some(Box::new(hook));
        self
    }

    /// How many times `path` has been listed.
    pub(crate) fn list_count(&self, path: &Path) -> usize {
        self.list_counts.lock().get(path).copied().unwrap_or(0)
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_dir(&self, dir: &Path) -> Result<Vec<FsEntry>, ListError> {
        if let Some(hook) = &self.on_list {
            hook(dir);
        }
        *self.list_counts.lock().entry(dir.to_path_buf()).or_insert(0) += 1;

        match self.listings.get(dir) {
            Some(Listing::Entries(entries)) => Ok(entries.clone()),
            Some(Listing::Denied) => Err(ListError::from_io(
                dir,
                io::Error::new(io::ErrorKind::PermissionDenied, "access is denied"),
            )),
            Some(Listing::Failed) => Err(ListError::from_io(
                dir,
                io::Error::other("the device is not ready"),
            )),
            None => Err(ListError::from_io(
                dir,
                io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            )),
        }
    }

    fn kind_of(&self, path: &Path) -> Option<EntryKind> {
        if self.listings.contains_key(path) {
            return Some(EntryKind::Directory);
        }
        self.listings.values().find_map(|listing| match listing {
            Listing::Entries(entries) => entries
                .iter()
                .find(|entry| entry.path == path)
                .map(|entry| entry.kind),
            _ => None,
        })
    }
}
