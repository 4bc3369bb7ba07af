/// Concurrent per-directory byte totals.
///
/// Each value is the sum of the sizes of files *directly* inside the key
/// directory; files in subdirectories are attributed to those
/// subdirectories instead, never rolled up.
///
/// # Lock layout
///
/// Keys are spread across a fixed set of shards, each a
/// `parking_lot::RwLock<HashMap<PathBuf, AtomicU64>>`. Incrementing an
/// existing key only takes the shard's *read* lock and does a `fetch_add`,
/// so many workers adding file sizes to the same directory never serialise
/// on a write lock. The write lock is taken only the first time a key is
/// seen. Entries are never removed while a scan is running, which keeps a
/// reference obtained under the read lock valid for the `fetch_add`.
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of independent lock shards. Power of two so the shard index is a mask.
const SHARD_COUNT: usize = 32;

type Shard = RwLock<HashMap<PathBuf, AtomicU64>>;

/// The aggregation map: directory path to total bytes of its direct files.
pub struct DirSizes {
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl DirSizes {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard(&self, path: &Path) -> &Shard {
        let hash = self.hasher.hash_one(path);
        &self.shards[(hash as usize) & (SHARD_COUNT - 1)]
    }

    /// Register `path` with a size of 0 if it is not present yet.
    ///
    /// Idempotent: an existing entry keeps its accumulated value.
    pub fn ensure(&self, path: &Path) {
        let shard = self.shard(path);
        if shard.read().contains_key(path) {
            return;
        }
        shard
            .write()
            .entry(path.to_path_buf())
            .or_insert_with(|| AtomicU64::new(0));
    }

    /// Atomically add `delta` bytes to `path`, creating the entry at `delta`
    /// if it is absent.
    pub fn add_size(&self, path: &Path, delta: u64) {
        let shard = self.shard(path);
        {
            let map = shard.read();
            if let Some(total) = map.get(path) {
                total.fetch_add(delta, Ordering::Relaxed);
                return;
            }
        }
        // Another worker may have inserted the key between the two locks;
        // the entry API folds both cases into a single increment.
        shard
            .write()
            .entry(path.to_path_buf())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(delta, Ordering::Relaxed);
    }

    /// Remove every entry. Must only be called while no walk is in flight.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    /// Current total for `path`, if it has been registered.
    pub fn get(&self, path: &Path) -> Option<u64> {
        self.shard(path)
            .read()
            .get(path)
            .map(|total| total.load(Ordering::Relaxed))
    }

    /// Number of directories registered so far. Safe to poll mid-scan.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Sum of every directory total, i.e. all file bytes seen so far.
    pub fn total(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .values()
                    .map(|total| total.load(Ordering::Relaxed))
                    .sum::<u64>()
            })
            .sum()
    }

    /// Point-in-time copy of the map, ordered by path.
    ///
    /// Each value is internally consistent; values of different entries
    /// may come from different instants if a walk is still running.
    pub fn snapshot(&self) -> Vec<(PathBuf, u64)> {
        let mut entries = Vec::with_capacity(self.len());
        for shard in self.shards.iter() {
            let map = shard.read();
            entries.extend(
                map.iter()
                    .map(|(path, total)| (path.clone(), total.load(Ordering::Relaxed))),
            );
        }
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for DirSizes {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DirSizes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirSizes")
            .field("len", &self.len())
            .field("total", &self.total())
            .finish()
    }
}
